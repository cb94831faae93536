mod network;
mod state;
mod sync;

use clap::Parser;
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Stable player identity (randomly generated when omitted)
    #[arg(short = 'i', long)]
    identity: Option<String>,

    /// Display name shown to other players
    #[arg(short = 'n', long, default_value = "climber")]
    name: String,

    /// Climb speed in height units per second
    #[arg(short = 'c', long, default_value = "6.0")]
    climb_speed: f32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let identity = args
        .identity
        .unwrap_or_else(|| format!("0x{:032x}", rand::random::<u128>()));

    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    info!("Playing as {} ({})", args.name, identity);

    let mut client =
        network::Client::new(&args.server, identity, args.name, args.climb_speed).await?;

    client.run().await?;

    Ok(())
}
