use clap::Parser;
use env_logger::Env;
use log::{error, info};
use server::config::{load_game_version, parse_inventory, GameConfig};
use server::map::MapData;
use server::network::Server;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, env = "SERVER_HOSTNAME", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    port: u16,

    /// Simulation ticks per second
    #[arg(
        short,
        long,
        env = "SERVER_TICK_RATE",
        default_value = "15",
        value_parser = clap::value_parser!(u32).range(1..=1000)
    )]
    tick_rate: u32,

    /// Milliseconds between cleanup sweeps
    #[arg(long, env = "SERVER_CLEANUP_INTERVAL", default_value = "500")]
    cleanup_interval_ms: u64,

    /// Name reported in server info
    #[arg(long, env = "SERVER_NAME", default_value = "my-server")]
    server_name: String,

    /// Map descriptor to load respawn and item points from
    #[arg(long, env = "SERVER_MAP", default_value = "public/maps/deathmatch_1/map.json")]
    map: PathBuf,

    /// JSON file holding the game version clients must match
    #[arg(long, env = "GAME_VERSION_FILE", default_value = "public/gameVersion.json")]
    version_file: PathBuf,

    /// Game version, overrides the version file
    #[arg(long, env = "GAME_VERSION")]
    game_version: Option<String>,

    #[arg(long, env = "GAME_MAX_PLAYERS", default_value = "20")]
    max_players: usize,

    /// Comma-separated item types every new player starts with
    #[arg(long, env = "PLAYER_BASE_INVENTORY", default_value = "1")]
    base_inventory: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let game_version = match args.game_version {
        Some(version) if !version.is_empty() => version,
        _ => load_game_version(&args.version_file).map_err(|e| {
            error!("Cannot determine game version: {}", e);
            e
        })?,
    };

    let config = GameConfig {
        server_name: args.server_name,
        game_version,
        tick_rate: args.tick_rate,
        cleanup_interval: Duration::from_millis(args.cleanup_interval_ms.max(1)),
        max_players: args.max_players,
        base_inventory: parse_inventory(&args.base_inventory)?,
        ..GameConfig::default()
    };
    let map = MapData::load_or_default(&args.map);

    info!(
        "Starting {} (version {}, max {} players)",
        config.server_name, config.game_version, config.max_players
    );

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, config, map).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
