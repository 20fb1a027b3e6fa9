//! Server network layer: UDP command handling and the cycle tick scheduler

use crate::registry::SessionRegistry;
use crate::session::GameSession;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Command, GroupId, Packet, PlayerId, MAX_DATAGRAM_SIZE};
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

type Subscribers = Arc<RwLock<HashMap<GroupId, HashSet<SocketAddr>>>>;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    Shutdown,
}

/// Messages sent from the main loop to the sender task
#[derive(Debug)]
pub enum OutgoingMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
    BroadcastPacket { packet: Packet, group: GroupId },
}

/// Cycle lengths used when a `Start` command leaves them out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleDefaults {
    pub day: Duration,
    pub night: Duration,
}

impl Default for CycleDefaults {
    fn default() -> Self {
        Self {
            day: Duration::from_secs(24 * 60 * 60),
            night: Duration::from_secs(12 * 60 * 60),
        }
    }
}

/// Applies one client command to a session and builds the reply packet.
pub fn dispatch_command(
    session: &mut GameSession,
    player: PlayerId,
    command: Command,
    now: Instant,
    defaults: CycleDefaults,
) -> Packet {
    let result = match command {
        Command::OpenSignup => session.open_signup(),
        Command::Signup => session.signup(player),
        Command::Dropout => session.dropout(player),
        Command::Start { day, night } => {
            let day = day.unwrap_or(defaults.day);
            let night = night.unwrap_or(defaults.night);
            return match session.start(now, day, night) {
                Ok(roster) => Packet::Started { roster },
                Err(error) => Packet::Rejected { error },
            };
        }
        Command::End => {
            session.end();
            Ok(())
        }
        Command::LynchVote { target } => session.cast_lynch_vote(player, target),
        Command::NoLynchVote => session.cast_no_lynch_vote(player),
        Command::RetractVote => session.retract_vote(player),
        Command::Status => return Packet::Status(session.session_status()),
        Command::Roster => return Packet::Roster(session.roster_snapshot()),
        Command::Tally => return Packet::Tally(session.tally_snapshot()),
        Command::Remaining => return Packet::Remaining(session.remaining(now)),
    };

    match result {
        Ok(()) => Packet::Ack,
        Err(error) => Packet::Rejected { error },
    }
}

/// UDP front end for the session registry
pub struct Server {
    socket: Arc<UdpSocket>,
    registry: Arc<SessionRegistry>,
    subscribers: Subscribers,
    tick_duration: Duration,
    defaults: CycleDefaults,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    outgoing_tx: mpsc::UnboundedSender<OutgoingMessage>,
    outgoing_rx: mpsc::UnboundedReceiver<OutgoingMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        tick_duration: Duration,
        defaults: CycleDefaults,
    ) -> Result<Self, BoxError> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            registry: Arc::new(SessionRegistry::new()),
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            tick_duration,
            defaults,
            server_tx,
            server_rx,
            outgoing_tx,
            outgoing_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Sender that can stop `run` with `ServerMessage::Shutdown`.
    pub fn control(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let subscribers = Arc::clone(&self.subscribers);
        let mut outgoing_rx =
            std::mem::replace(&mut self.outgoing_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = outgoing_rx.recv().await {
                match message {
                    OutgoingMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    OutgoingMessage::BroadcastPacket { packet, group } => {
                        let addrs: Vec<SocketAddr> = {
                            let subscribers = subscribers.read().await;
                            subscribers
                                .get(&group)
                                .map(|addrs| addrs.iter().copied().collect())
                                .unwrap_or_default()
                        };

                        for addr in addrs {
                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to broadcast to {} in group {}: {}", addr, group, e);
                            }
                        }
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), BoxError> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self
            .outgoing_tx
            .send(OutgoingMessage::SendPacket { packet, addr })
        {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, packet: Packet, group: GroupId) {
        if let Err(e) = self
            .outgoing_tx
            .send(OutgoingMessage::BroadcastPacket { packet, group })
        {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    /// Applies an incoming command and answers the sender
    async fn handle_packet(&self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Command {
                group,
                player,
                command,
            } => {
                debug!(
                    "Group {}: player {} from {} sent {:?}",
                    group, player, addr, command
                );

                let reply = self.handle_command(group, player, command, addr).await;
                if let Packet::Rejected { error } = &reply {
                    debug!("Group {}: rejected command from {}: {}", group, player, error);
                }
                self.send_packet(reply, addr);
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Runs one command against its group and keeps the registry and the
    /// subscriber lists limited to groups with a game in signup or running.
    ///
    /// Only `OpenSignup` creates a session. Any other command for an unknown
    /// group is answered from an idle session that is never stored, and `End`
    /// forgets the group together with its subscribers.
    async fn handle_command(
        &self,
        group: GroupId,
        player: PlayerId,
        command: Command,
        addr: SocketAddr,
    ) -> Packet {
        let now = Instant::now();
        let defaults = self.defaults;
        let is_query = command.is_query();
        let is_end = matches!(command, Command::End);

        let (reply, known) = match self.registry.find(group).await {
            Some(handle) => {
                let mut session = handle.lock().await;
                let reply = dispatch_command(&mut session, player, command, now, defaults);
                (reply, true)
            }
            None if matches!(command, Command::OpenSignup) => {
                let reply = self
                    .registry
                    .with_session(group, |session| {
                        dispatch_command(session, player, command, now, defaults)
                    })
                    .await;
                (reply, true)
            }
            None => {
                let mut idle = GameSession::new(group);
                let reply = dispatch_command(&mut idle, player, command, now, defaults);
                (reply, false)
            }
        };

        if is_end {
            self.registry.leave_group(group).await;
            self.subscribers.write().await.remove(&group);
        } else if known && !is_query {
            self.subscribers
                .write()
                .await
                .entry(group)
                .or_default()
                .insert(addr);
        }

        reply
    }

    /// Resolves expired cycles and announces them to each group
    async fn tick(&self) {
        for (group, transition) in self.registry.tick_all(Instant::now()).await {
            self.broadcast_packet(Packet::CycleChanged { group, transition }, group);
        }
    }

    /// Main server loop
    pub async fn run(&mut self) -> Result<(), BoxError> {
        self.spawn_network_receiver();
        self.spawn_network_sender();

        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    self.tick().await;
                },
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Cycle, SessionError, SessionPhase, Status};

    const DEFAULTS: CycleDefaults = CycleDefaults {
        day: Duration::from_secs(120),
        night: Duration::from_secs(60),
    };

    fn signup_session() -> GameSession {
        let mut session = GameSession::new(GroupId(1));
        let now = Instant::now();
        dispatch_command(&mut session, PlayerId(1), Command::OpenSignup, now, DEFAULTS);
        for id in 1..=3 {
            dispatch_command(&mut session, PlayerId(id), Command::Signup, now, DEFAULTS);
        }
        session
    }

    #[test]
    fn test_dispatch_start_uses_defaults() {
        let mut session = signup_session();
        let now = Instant::now();

        let reply = dispatch_command(
            &mut session,
            PlayerId(1),
            Command::Start {
                day: None,
                night: None,
            },
            now,
            DEFAULTS,
        );

        match reply {
            Packet::Started { roster } => assert_eq!(roster.alive.len(), 3),
            other => panic!("Unexpected reply: {:?}", other),
        }
        match dispatch_command(&mut session, PlayerId(1), Command::Remaining, now, DEFAULTS) {
            Packet::Remaining(remaining) => assert_eq!(remaining.minutes, 2),
            other => panic!("Unexpected reply: {:?}", other),
        }
    }

    #[test]
    fn test_dispatch_explicit_durations() {
        let mut session = signup_session();
        let now = Instant::now();

        dispatch_command(
            &mut session,
            PlayerId(1),
            Command::Start {
                day: Some(Duration::from_secs(30 * 60)),
                night: None,
            },
            now,
            DEFAULTS,
        );

        match dispatch_command(&mut session, PlayerId(1), Command::Remaining, now, DEFAULTS) {
            Packet::Remaining(remaining) => assert_eq!(remaining.minutes, 30),
            other => panic!("Unexpected reply: {:?}", other),
        }
    }

    #[test]
    fn test_dispatch_reports_errors() {
        let mut session = GameSession::new(GroupId(1));

        let reply = dispatch_command(
            &mut session,
            PlayerId(4),
            Command::Dropout,
            Instant::now(),
            DEFAULTS,
        );

        match reply {
            Packet::Rejected { error } => {
                assert_eq!(error, SessionError::InvalidState(SessionPhase::Terminated))
            }
            other => panic!("Unexpected reply: {:?}", other),
        }
    }

    #[test]
    fn test_dispatch_vote_and_tally() {
        let mut session = signup_session();
        let now = Instant::now();
        dispatch_command(
            &mut session,
            PlayerId(1),
            Command::Start {
                day: None,
                night: None,
            },
            now,
            DEFAULTS,
        );

        let reply = dispatch_command(
            &mut session,
            PlayerId(1),
            Command::LynchVote {
                target: PlayerId(2),
            },
            now,
            DEFAULTS,
        );
        assert!(matches!(reply, Packet::Ack));

        match dispatch_command(&mut session, PlayerId(3), Command::Tally, now, DEFAULTS) {
            Packet::Tally(tally) => assert_eq!(tally.votes_for(PlayerId(2)), 1),
            other => panic!("Unexpected reply: {:?}", other),
        }
        match dispatch_command(&mut session, PlayerId(3), Command::Status, now, DEFAULTS) {
            Packet::Status(status) => {
                assert_eq!(status.status, Status::Running);
                assert_eq!(status.cycle, Some(Cycle::Day));
            }
            other => panic!("Unexpected reply: {:?}", other),
        }
    }

    #[test]
    fn test_dispatch_end_always_acks() {
        let mut session = signup_session();

        let reply = dispatch_command(
            &mut session,
            PlayerId(2),
            Command::End,
            Instant::now(),
            DEFAULTS,
        );

        assert!(matches!(reply, Packet::Ack));
        assert_eq!(session.status(), Status::Terminated);
    }

    #[test]
    fn test_dispatch_rejects_unusable_duration() {
        let mut session = signup_session();

        let reply = dispatch_command(
            &mut session,
            PlayerId(1),
            Command::Start {
                day: Some(Duration::MAX),
                night: None,
            },
            Instant::now(),
            DEFAULTS,
        );

        match reply {
            Packet::Rejected { error } => assert_eq!(error, SessionError::InvalidDuration),
            other => panic!("Unexpected reply: {:?}", other),
        }
        assert_eq!(session.status(), Status::Signup);
    }

    async fn test_server() -> Server {
        Server::new("127.0.0.1:0", Duration::from_millis(50), DEFAULTS)
            .await
            .unwrap()
    }

    async fn subscriber_count(server: &Server, group: GroupId) -> usize {
        server
            .subscribers
            .read()
            .await
            .get(&group)
            .map_or(0, |addrs| addrs.len())
    }

    #[tokio::test]
    async fn test_unknown_group_commands_leave_no_state() {
        let server = test_server().await;
        let addr: SocketAddr = "127.0.0.1:40001".parse().unwrap();

        for command in [
            Command::Status,
            Command::Roster,
            Command::Tally,
            Command::Remaining,
            Command::Signup,
            Command::End,
        ] {
            server
                .handle_command(GroupId(9), PlayerId(1), command, addr)
                .await;
        }

        assert_eq!(server.registry.len().await, 0);
        assert!(server.subscribers.read().await.is_empty());

        match server
            .handle_command(GroupId(9), PlayerId(1), Command::Status, addr)
            .await
        {
            Packet::Status(status) => assert_eq!(status.status, Status::Terminated),
            other => panic!("Unexpected reply: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_open_signup_registers_and_end_forgets_group() {
        let server = test_server().await;
        let group = GroupId(3);
        let alice: SocketAddr = "127.0.0.1:40002".parse().unwrap();
        let bob: SocketAddr = "127.0.0.1:40003".parse().unwrap();
        let carol: SocketAddr = "127.0.0.1:40004".parse().unwrap();

        let reply = server
            .handle_command(group, PlayerId(1), Command::OpenSignup, alice)
            .await;
        assert!(matches!(reply, Packet::Ack));
        server
            .handle_command(group, PlayerId(2), Command::Signup, bob)
            .await;
        server
            .handle_command(group, PlayerId(3), Command::Roster, carol)
            .await;

        assert_eq!(server.registry.groups().await, vec![group]);
        assert_eq!(subscriber_count(&server, group).await, 2);

        let reply = server
            .handle_command(group, PlayerId(2), Command::End, bob)
            .await;
        assert!(matches!(reply, Packet::Ack));
        assert!(server.registry.is_empty().await);
        assert_eq!(subscriber_count(&server, group).await, 0);
    }

    #[test]
    fn test_default_cycle_lengths() {
        let defaults = CycleDefaults::default();
        assert_eq!(defaults.day, Duration::from_secs(86_400));
        assert_eq!(defaults.night, Duration::from_secs(43_200));
    }
}
