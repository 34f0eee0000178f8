use clap::{Parser, Subcommand};
use ovpn_bot::managers::health::{render_report, ServerHealthChecker};
use ovpn_bot::services::config::BotConfig;
use ovpn_bot::services::logger::{LogLevel, Logger};

#[derive(Parser)]
#[command(name = "ovpn-bot", version, about = "On-demand OpenVPN client provisioning bot")]
struct Cli {
    /// Overrides OVPN_BOT_LOG_LEVEL (error, warn, info, debug).
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Handle chat events as JSON lines on stdin/stdout (default).
    Serve,
    /// Probe the configured servers once and print the report.
    CheckServers,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let mut logger = Logger::new("ovpn-bot");
    if let Some(raw) = cli.log_level.as_deref() {
        match LogLevel::parse(raw) {
            Some(level) => logger.set_level(level),
            None => {
                eprintln!("ovpn-bot: unknown log level {}", raw);
                std::process::exit(2);
            }
        }
    }

    let config = match BotConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("ovpn-bot: {}", err);
            std::process::exit(1);
        }
    };
    let logger = logger.with_secrets(config.secrets());

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            if let Err(err) = ovpn_bot::gateway::stdio::run_stdio(config, logger).await {
                eprintln!("ovpn-bot: {}", err);
                std::process::exit(1);
            }
        }
        Command::CheckServers => {
            let checker = ServerHealthChecker::new(logger, config.probe_timeout);
            let statuses = checker.check_all(&config.servers).await;
            println!("{}", render_report(&statuses));
            if statuses.iter().any(|status| !status.reachable) {
                std::process::exit(3);
            }
        }
    }
}
