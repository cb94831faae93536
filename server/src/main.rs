use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::time::Duration;

use server::config::ServerConfig;
use server::network::Server;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind the UDP socket to
    #[arg(short = 'b', long, default_value = "127.0.0.1:8080")]
    bind: String,

    /// Maximum number of concurrent clients
    #[arg(short = 'm', long, default_value = "64")]
    max_clients: usize,

    /// Seconds of silence before a client is dropped
    #[arg(short = 't', long, default_value = "10")]
    client_timeout: u64,

    /// Path of the persisted all-time score file
    #[arg(long, default_value = "alltime_scores.json")]
    store: PathBuf,

    /// Minimum milliseconds between persistence writes
    #[arg(long, default_value = "5000")]
    persist_cooldown: u64,

    /// How many ranked rows the score file keeps
    #[arg(long, default_value = "10")]
    persist_top: usize,

    /// Record client-reported finish durations instead of deriving them
    /// from the server clock
    #[arg(long)]
    trust_client_finish_time: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = ServerConfig {
        max_clients: args.max_clients,
        client_timeout: Duration::from_secs(args.client_timeout),
        store_path: args.store,
        persist_cooldown_ms: args.persist_cooldown,
        persist_top_n: args.persist_top,
        trust_client_finish_time: args.trust_client_finish_time,
        ..Default::default()
    };

    info!("Starting round server...");
    info!("Binding to: {}", args.bind);
    info!("Max clients: {}", config.max_clients);
    if config.trust_client_finish_time {
        info!("Trusting client-reported finish times (legacy mode)");
    }

    let mut server = Server::new(&args.bind, config).await?;

    server.run().await?;

    Ok(())
}
