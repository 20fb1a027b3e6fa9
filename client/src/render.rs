//! Turns server packets into chat-style text.

use shared::{
    CycleTransition, Packet, Resolution, RosterSnapshot, SessionStatus, Status, TallySnapshot,
};

fn mention_list(players: &[shared::PlayerId]) -> String {
    if players.is_empty() {
        return "nobody".to_string();
    }
    players
        .iter()
        .map(|player| format!("<@{}>", player))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn render_status(status: &SessionStatus) -> String {
    match (status.status, status.cycle) {
        (Status::Running, Some(cycle)) => format!("Game in group {} is running ({}).", status.group, cycle),
        (Status::Signup, _) => format!("Signups are open in group {}.", status.group),
        _ => format!("No game in group {}.", status.group),
    }
}

pub fn render_roster(roster: &RosterSnapshot) -> String {
    let mut lines = Vec::new();
    if !roster.signed_up.is_empty() {
        lines.push(format!(
            "Signed up ({}): {}",
            roster.signed_up.len(),
            mention_list(&roster.signed_up)
        ));
    }
    if !roster.alive.is_empty() || !roster.dead.is_empty() {
        lines.push(format!(
            "Alive ({}): {}",
            roster.alive.len(),
            mention_list(&roster.alive)
        ));
        lines.push(format!(
            "Dead ({}): {}",
            roster.dead.len(),
            mention_list(&roster.dead)
        ));
    }
    if lines.is_empty() {
        lines.push("Nobody has signed up.".to_string());
    }
    lines.join("\n")
}

pub fn render_tally(tally: &TallySnapshot) -> String {
    let mut lines: Vec<String> = tally
        .entries
        .iter()
        .map(|entry| {
            format!(
                "<@{}>: {} ({})",
                entry.target,
                entry.votes,
                mention_list(&entry.voters)
            )
        })
        .collect();
    lines.push(format!("No lynch: {}", tally.abstentions));
    lines.join("\n")
}

pub fn render_transition(transition: &CycleTransition) -> String {
    let headline = match transition.resolution {
        Some(Resolution::Lynch(player)) => format!("<@{}> was lynched. ", player),
        Some(Resolution::NoLynch) => "Nobody was lynched. ".to_string(),
        None => String::new(),
    };
    format!(
        "{}The {} is over and the {} begins.",
        headline, transition.ended, transition.started
    )
}

pub fn render_packet(packet: &Packet) -> String {
    match packet {
        Packet::Ack => "Done.".to_string(),
        Packet::Rejected { error } => format!("Error: {}.", error),
        Packet::Started { roster } => format!("The game has started!\n{}", render_roster(roster)),
        Packet::Status(status) => render_status(status),
        Packet::Roster(roster) => render_roster(roster),
        Packet::Tally(tally) => render_tally(tally),
        Packet::Remaining(remaining) => format!("Time left in this cycle: {}", remaining),
        Packet::CycleChanged { group, transition } => {
            format!("[group {}] {}", group, render_transition(transition))
        }
        Packet::Command { .. } => "Unexpected command packet.".to_string(),
    }
}
