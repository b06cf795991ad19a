// TCP listener: one independent session task per client
//
// A session failing or disconnecting never touches the listener or any
// other session; each client gets a fresh vehicle against the shared
// read-only maze.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::VehicleConfig;
use crate::maze::Maze;
use crate::session;

/// Bind and serve forever.
pub async fn run(
    addr: &str,
    maze: Arc<Maze>,
    vehicle_config: VehicleConfig,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(
        addr = %listener.local_addr()?,
        maze_width = maze.width(),
        maze_height = maze.height(),
        "simulator listening"
    );
    serve(listener, maze, vehicle_config).await
}

/// Accept loop on an already-bound listener (split out so tests can bind
/// port 0 and discover the address).
pub async fn serve(
    listener: TcpListener,
    maze: Arc<Maze>,
    vehicle_config: VehicleConfig,
) -> std::io::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let maze = Arc::clone(&maze);
        let vehicle_config = vehicle_config.clone();
        tokio::spawn(async move {
            if let Err(e) = session::run(stream, maze, vehicle_config).await {
                warn!(%peer, error = %e, "session failed");
            }
        });
    }
}
