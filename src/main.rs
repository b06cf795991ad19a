use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use mazebot_sim::{config, maze, server};

/// Maze simulator for the classroom robot controller
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:9750")]
    listen: String,

    /// Maze layout file
    #[arg(long)]
    maze: PathBuf,

    /// Vehicle configuration file (JSON); defaults apply when omitted
    #[arg(long)]
    vehicle: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("Simulator error: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let maze = maze::load_layout(&args.maze)?;
    let vehicle_config = match &args.vehicle {
        Some(path) => config::load_vehicle_config(path)?,
        None => config::VehicleConfig::default(),
    };
    server::run(&args.listen, Arc::new(maze), vehicle_config).await?;
    Ok(())
}
