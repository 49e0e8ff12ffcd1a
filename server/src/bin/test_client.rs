use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use shared::{client_frame, ChatMessage, PlayerData, ServerEvent, Vector3};
use std::time::{Duration, Instant};
use tokio::time::interval;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// Headless bot that joins a running server, walks in circles and prints
/// what it hears.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "ws://127.0.0.1:3000")]
    url: String,

    #[arg(short, long, default_value = "4242")]
    id: i64,

    #[arg(short, long, default_value = "bot")]
    name: String,

    /// Must match the server's game version exactly
    #[arg(short = 'v', long)]
    game_version: String,

    /// Seconds to stay connected
    #[arg(short, long, default_value = "10")]
    duration: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    println!("Connecting to {}", args.url);
    let (ws_stream, _) = connect_async(args.url.as_str()).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    println!("Connected as {} ({})", args.name, args.id);

    let mut player = PlayerData::new(args.id, &args.name, &args.game_version);
    let mut anchor: Option<Vector3> = None;

    let hello = ChatMessage {
        id: args.id,
        name: args.name.clone(),
        message: "hello from test_client".to_string(),
    };
    ws_sender
        .send(Message::Text(client_frame("chatMsg", &hello)?))
        .await?;
    ws_sender
        .send(Message::Text(client_frame(
            "chatMsg",
            &ChatMessage {
                message: "/ping".to_string(),
                ..hello
            },
        )?))
        .await?;

    let started = Instant::now();
    let mut update_interval = interval(Duration::from_secs_f64(1.0 / 15.0));
    let mut ping_interval = interval(Duration::from_secs(1));
    let mut ping_sent: Option<Instant> = None;

    while started.elapsed() < Duration::from_secs(args.duration) {
        tokio::select! {
            _ = update_interval.tick() => {
                // Walk a small circle around the spawn once it is known
                if let Some(center) = anchor {
                    if !player.forced {
                        let t = started.elapsed().as_secs_f64();
                        player.position = Vector3::new(
                            center.x + 0.3 * t.cos(),
                            center.y,
                            center.z + 0.3 * t.sin(),
                        );
                    }
                }
                ws_sender
                    .send(Message::Text(client_frame("playerData", &player)?))
                    .await?;
            }

            _ = ping_interval.tick() => {
                ping_sent = Some(Instant::now());
                ws_sender
                    .send(Message::Text(r#"{"event":"latencyTest"}"#.to_string()))
                    .await?;
            }

            frame = ws_receiver.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        println!("Connection error: {}", e);
                        break;
                    }
                    None => {
                        println!("Server closed the connection");
                        break;
                    }
                };

                match serde_json::from_str::<ServerEvent>(&text) {
                    Ok(ServerEvent::RemotePlayerData(players)) => {
                        let Some(me) = players.iter().find(|p| p.id == args.id) else {
                            continue;
                        };
                        player.health = me.health;
                        player.inventory = me.inventory.clone();
                        if me.forced && !player.forced_acknowledged {
                            println!("Forced to {:?}, acknowledging", me.position);
                            player.position = me.position;
                            player.look_quaternion = me.look_quaternion;
                            player.velocity = Vector3::ZERO;
                            player.forced = true;
                            player.forced_acknowledged = true;
                            anchor = Some(me.position);
                        } else if !me.forced && player.forced {
                            player.forced = false;
                            player.forced_acknowledged = false;
                        }
                    }
                    Ok(ServerEvent::WorldItemData(items)) => {
                        println!("{} world items", items.len());
                    }
                    Ok(ServerEvent::ChatMsg(msg)) => {
                        if msg.is_system() {
                            println!("[server] {}", msg.message);
                        } else {
                            println!("[{}] {}", msg.name, msg.message);
                        }
                    }
                    Ok(ServerEvent::LatencyTest(_)) => {
                        if let Some(sent) = ping_sent.take() {
                            player.latency = sent.elapsed().as_secs_f64() * 1000.0;
                            println!("Latency: {:.1} ms", player.latency);
                        }
                    }
                    Ok(ServerEvent::ServerInfo(info)) => {
                        println!(
                            "Server {} on {}: {}/{} players",
                            info.name, info.map_name, info.current_players, info.max_players
                        );
                    }
                    Err(e) => println!("Failed to parse frame: {}", e),
                }
            }
        }
    }

    ws_sender.send(Message::Close(None)).await?;
    println!(
        "Disconnected after {:.1}s with health {:.0} and inventory {:?}",
        started.elapsed().as_secs_f64(),
        player.health,
        player.inventory
    );
    Ok(())
}
