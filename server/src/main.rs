use clap::Parser;
use log::info;
use server::network::{BoxError, CycleDefaults, Server};
use shared::MAX_CYCLE_MINUTES;
use std::time::Duration;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// How often sessions are checked for an expired cycle, in milliseconds
    #[arg(short, long, default_value = "1000", value_parser = clap::value_parser!(u64).range(1..))]
    tick_ms: u64,

    /// Default day length in minutes, used when a start command gives none
    #[arg(long, default_value = "1440", value_parser = clap::value_parser!(u64).range(1..=MAX_CYCLE_MINUTES))]
    day_minutes: u64,

    /// Default night length in minutes, used when a start command gives none
    #[arg(long, default_value = "720", value_parser = clap::value_parser!(u64).range(1..=MAX_CYCLE_MINUTES))]
    night_minutes: u64,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    env_logger::init();

    let args = Args::parse();

    let defaults = CycleDefaults {
        day: Duration::from_secs(args.day_minutes * 60),
        night: Duration::from_secs(args.night_minutes * 60),
    };
    let tick = Duration::from_millis(args.tick_ms);
    if tick >= defaults.day.min(defaults.night) {
        return Err("tick interval must be shorter than the shortest cycle".into());
    }

    let address = format!("{}:{}", args.host, args.port);
    info!(
        "Starting mafia server on {} (day {}m, night {}m, tick {}ms)",
        address, args.day_minutes, args.night_minutes, args.tick_ms
    );

    let mut server = Server::new(&address, tick, defaults).await?;
    let control = server.control();

    let server_handle = tokio::spawn(async move { server.run().await });

    tokio::select! {
        result = server_handle => {
            match result {
                Ok(Err(e)) => return Err(e),
                Err(e) => return Err(format!("Server task panicked: {}", e).into()),
                Ok(Ok(())) => {}
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
            let _ = control.send(server::network::ServerMessage::Shutdown);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_minutes_are_bounded() {
        let max = MAX_CYCLE_MINUTES.to_string();
        let too_long = (MAX_CYCLE_MINUTES + 1).to_string();

        let args = Args::try_parse_from(["mafia-server", "--day-minutes", &max]).unwrap();
        assert_eq!(args.day_minutes, MAX_CYCLE_MINUTES);
        assert!(Args::try_parse_from(["mafia-server", "--day-minutes", &too_long]).is_err());
        assert!(Args::try_parse_from(["mafia-server", "--night-minutes", "0"]).is_err());
        assert!(
            Args::try_parse_from(["mafia-server", "--night-minutes", "18446744073709551615"])
                .is_err()
        );
    }
}
