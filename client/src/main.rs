use client::{network, render};
use clap::{Parser, Subcommand};
use log::info;
use shared::{Command, GroupId, PlayerId, MAX_CYCLE_MINUTES};
use std::time::Duration;

const MAX_TIMEOUT_SECS: u64 = 60 * 60;
const MAX_WAIT_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Group the command applies to
    #[arg(short = 'g', long)]
    group: u64,

    /// Player issuing the command
    #[arg(short = 'p', long)]
    player: u64,

    /// Seconds to wait for the server's reply
    #[arg(long, default_value = "2", value_parser = clap::value_parser!(u64).range(1..=MAX_TIMEOUT_SECS))]
    timeout: u64,

    /// Keep listening for cycle announcements for this many seconds
    #[arg(short = 'w', long, default_value = "0", value_parser = clap::value_parser!(u64).range(0..=MAX_WAIT_SECS))]
    wait: u64,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Open signups for a new game
    OpenSignup,
    /// Sign up for the next game
    Signup,
    /// Withdraw from the next game
    Dropout,
    /// Start the game with everyone signed up
    Start {
        /// Day length in minutes (server default if omitted)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..=MAX_CYCLE_MINUTES))]
        day_minutes: Option<u64>,
        /// Night length in minutes (server default if omitted)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..=MAX_CYCLE_MINUTES))]
        night_minutes: Option<u64>,
    },
    /// End the current game
    End,
    /// Vote to lynch a player
    Vote { target: u64 },
    /// Vote to lynch nobody today
    NoLynch,
    /// Retract your current vote
    Unvote,
    /// Show the session status
    Status,
    /// Show who is playing
    Roster,
    /// Show the current vote count
    Tally,
    /// Show time left in the current cycle
    Remaining,
}

impl From<Action> for Command {
    fn from(action: Action) -> Self {
        let minutes = |m: u64| Duration::from_secs(m * 60);
        match action {
            Action::OpenSignup => Command::OpenSignup,
            Action::Signup => Command::Signup,
            Action::Dropout => Command::Dropout,
            Action::Start {
                day_minutes,
                night_minutes,
            } => Command::Start {
                day: day_minutes.map(minutes),
                night: night_minutes.map(minutes),
            },
            Action::End => Command::End,
            Action::Vote { target } => Command::LynchVote {
                target: PlayerId(target),
            },
            Action::NoLynch => Command::NoLynchVote,
            Action::Unvote => Command::RetractVote,
            Action::Status => Command::Status,
            Action::Roster => Command::Roster,
            Action::Tally => Command::Tally,
            Action::Remaining => Command::Remaining,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), network::BoxError> {
    env_logger::init();

    let args = Args::parse();

    info!(
        "Sending {:?} to {} as player {} in group {}",
        args.action, args.server, args.player, args.group
    );

    let client = network::Client::new(
        &args.server,
        GroupId(args.group),
        PlayerId(args.player),
        Duration::from_secs(args.timeout),
    )
    .await?;

    let exchange = client.send_command(args.action.into()).await?;
    for announcement in &exchange.announcements {
        println!("{}", render::render_packet(announcement));
    }
    println!("{}", render::render_packet(&exchange.reply));

    if args.wait > 0 {
        for announcement in client.listen(Duration::from_secs(args.wait)).await? {
            println!("{}", render::render_packet(&announcement));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Result<Args, clap::Error> {
        let base = ["mafia-client", "--group", "1", "--player", "2"];
        Args::try_parse_from(base.iter().chain(extra).copied())
    }

    #[test]
    fn test_start_minutes_are_bounded() {
        let max = MAX_CYCLE_MINUTES.to_string();
        let args = parse(&["start", "--day-minutes", &max]).unwrap();
        match Command::from(args.action) {
            Command::Start { day, night } => {
                assert_eq!(day, Some(Duration::from_secs(MAX_CYCLE_MINUTES * 60)));
                assert_eq!(night, None);
            }
            other => panic!("Unexpected command: {:?}", other),
        }

        let too_long = (MAX_CYCLE_MINUTES + 1).to_string();
        assert!(parse(&["start", "--day-minutes", &too_long]).is_err());
        assert!(parse(&["start", "--night-minutes", "0"]).is_err());
        assert!(parse(&["start", "--night-minutes", "18446744073709551615"]).is_err());
    }

    #[test]
    fn test_timeout_and_wait_are_bounded() {
        assert!(parse(&["--timeout", "0", "status"]).is_err());
        assert!(parse(&["--timeout", "18446744073709551615", "status"]).is_err());
        assert!(parse(&["--wait", "18446744073709551615", "status"]).is_err());

        let args = parse(&["--timeout", "5", "--wait", "30", "status"]).unwrap();
        assert_eq!(args.timeout, 5);
        assert_eq!(args.wait, 30);
    }
}
