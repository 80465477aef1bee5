use clap::Parser;
use log::{error, info, warn};
use server::config::ServerConfig;
use server::grid::{load_map, Grid};
use server::network::Server;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = shared::DEFAULT_PORT)]
    port: u16,

    /// Maximum number of simultaneous players
    #[arg(short, long, default_value_t = shared::MAX_PLAYERS)]
    max_players: usize,

    /// Map file, one row of whitespace-separated tile values per line
    #[arg(long, default_value = "map.txt")]
    map: PathBuf,

    /// Map width in tiles
    #[arg(long, default_value_t = shared::VIEWPORT_WIDTH)]
    width: i32,

    /// Map height in tiles
    #[arg(long, default_value_t = shared::VIEWPORT_HEIGHT)]
    height: i32,

    /// Serve an all-walkable map if the map file cannot be loaded
    #[arg(long)]
    default_map: bool,

    /// Do not send position corrections for rejected moves
    #[arg(long)]
    no_correction: bool,

    /// Remove players that send nothing for this many seconds
    #[arg(long)]
    idle_timeout_secs: Option<u64>,
}

impl Args {
    fn into_config(self) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        let host: IpAddr = self.host.parse()?;
        Ok(ServerConfig {
            bind_addr: SocketAddr::new(host, self.port),
            max_players: self.max_players,
            map_path: self.map,
            map_width: self.width,
            map_height: self.height,
            default_map_fallback: self.default_map,
            correct_rejected_moves: !self.no_correction,
            idle_timeout: self.idle_timeout_secs.map(Duration::from_secs),
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = Args::parse().into_config()?;
    config.validate()?;

    let grid = match load_map(&config.map_path, config.map_width, config.map_height) {
        Ok(grid) => grid,
        Err(e) if config.default_map_fallback => {
            warn!("{}; serving an all-walkable map instead", e);
            Grid::all_walkable(config.map_width, config.map_height)?
        }
        Err(e) => {
            error!("Cannot start without a map: {}", e);
            return Err(e.into());
        }
    };

    info!("Starting server...");
    info!(
        "Max players: {}, map: {}x{}",
        config.max_players, config.map_width, config.map_height
    );
    if let Some(timeout) = config.idle_timeout {
        info!("Idle sessions removed after {:?}", timeout);
    }

    let server = Server::bind(&config, grid).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
