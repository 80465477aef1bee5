use clap::Parser;
use client::bot::choose_step;
use client::network::Connection;
use client::world::ClientWorld;
use log::{info, warn};
use shared::Packet;
use std::time::Duration;
use tokio::time::interval;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:1234")]
    server: String,

    /// Number of moves to send before disconnecting (unlimited if omitted)
    #[arg(short = 'm', long)]
    moves: Option<u32>,

    /// Delay between moves in milliseconds
    #[arg(short = 'i', long, default_value = "250")]
    interval_ms: u64,

    /// Map width the server was started with
    #[arg(short = 'w', long, default_value_t = shared::VIEWPORT_WIDTH)]
    width: i32,

    /// Map height the server was started with
    #[arg(long, default_value_t = shared::VIEWPORT_HEIGHT)]
    height: i32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);

    let mut connection = Connection::connect(&args.server).await?;
    let mut world = ClientWorld::new(args.width, args.height);
    let mut rng = rand::thread_rng();
    let mut step_interval = interval(Duration::from_millis(args.interval_ms.max(1)));
    let mut sent: u32 = 0;

    loop {
        tokio::select! {
            packet = connection.recv() => match packet? {
                Some(packet) => world.apply(&packet),
                None => {
                    warn!("Server closed the connection");
                    break;
                }
            },

            _ = step_interval.tick() => {
                if args.moves.map_or(false, |limit| sent >= limit) {
                    break;
                }
                if let Some((dir_x, dir_y)) = choose_step(&world, &mut rng) {
                    connection.send(&Packet::Move { dir_x, dir_y }).await?;
                    sent += 1;
                }
            },
        }
    }

    info!(
        "Sent {} moves, {} players known, {} tiles known, last position {:?}",
        sent,
        world.players().count(),
        world.known_tiles(),
        world.local_player().and_then(|p| p.position)
    );

    Ok(())
}
