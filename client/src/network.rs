//! Client network layer: one UDP socket per player, request/reply exchanges
//! and listening for cycle announcements

use bincode::{deserialize, serialize};
use log::{debug, warn};
use shared::{Command, GroupId, Packet, PlayerId, MAX_DATAGRAM_SIZE};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{timeout, Instant};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Sends commands on behalf of one player in one group.
pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    group: GroupId,
    player: PlayerId,
    reply_timeout: Duration,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        group: GroupId,
        player: PlayerId,
        reply_timeout: Duration,
    ) -> Result<Self, BoxError> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            group,
            player,
            reply_timeout,
        })
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), BoxError> {
        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    async fn recv_packet(&self) -> Result<Packet, BoxError> {
        let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            let (len, addr) = self.socket.recv_from(&mut buffer).await?;
            if addr != self.server_addr {
                warn!("Ignoring datagram from unexpected address {}", addr);
                continue;
            }
            return Ok(deserialize(&buffer[..len])?);
        }
    }

    /// Sends `command` and waits for the server's reply.
    ///
    /// Cycle announcements that arrive first are returned in `announcements`
    /// rather than mistaken for the reply.
    pub async fn send_command(&self, command: Command) -> Result<Exchange, BoxError> {
        let packet = Packet::Command {
            group: self.group,
            player: self.player,
            command,
        };
        self.send_packet(&packet).await?;

        let deadline = Instant::now() + self.reply_timeout;
        let mut announcements = Vec::new();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let packet = timeout(remaining, self.recv_packet())
                .await
                .map_err(|_| "timed out waiting for server reply")??;

            match packet {
                Packet::CycleChanged { .. } => announcements.push(packet),
                Packet::Command { .. } => warn!("Unexpected command packet from server"),
                reply => {
                    debug!("Received reply {:?}", reply);
                    return Ok(Exchange {
                        reply,
                        announcements,
                    });
                }
            }
        }
    }

    /// Collects cycle announcements for this client's group until `duration`
    /// has elapsed.
    pub async fn listen(&self, duration: Duration) -> Result<Vec<Packet>, BoxError> {
        let deadline = Instant::now() + duration;
        let mut announcements = Vec::new();

        while let Ok(packet) = timeout(
            deadline.saturating_duration_since(Instant::now()),
            self.recv_packet(),
        )
        .await
        {
            let packet = packet?;
            if matches!(packet, Packet::CycleChanged { group, .. } if group == self.group) {
                announcements.push(packet);
            } else {
                debug!("Ignoring packet while listening: {:?}", packet);
            }
        }

        Ok(announcements)
    }
}

/// A reply plus any announcements received while waiting for it.
#[derive(Debug)]
pub struct Exchange {
    pub reply: Packet,
    pub announcements: Vec<Packet>,
}
