use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::network::{Server, ServerHandle};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "7777")]
    port: u16,
}

/// Admin commands typed on the server console
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Start,
    Kick(u8),
    Players,
    Quit,
}

fn parse_command(line: &str) -> Result<Command, String> {
    let mut words = line.split_whitespace();
    let command = match words.next() {
        Some("start") => Command::Start,
        Some("players") => Command::Players,
        Some("quit") => Command::Quit,
        Some("kick") => {
            let id = words
                .next()
                .ok_or("usage: kick <id>")?
                .parse()
                .map_err(|_| "client id must be a number")?;
            Command::Kick(id)
        }
        Some(other) => return Err(format!("unknown command '{}'", other)),
        None => return Err("commands: start, kick <id>, players, quit".to_string()),
    };
    if words.next().is_some() {
        return Err("too many arguments".to_string());
    }
    Ok(command)
}

/// Reads admin commands from stdin. End of input leaves the server running.
async fn admin_console(handle: ServerHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read admin command: {}", e);
                break;
            }
        };

        match parse_command(&line) {
            Ok(Command::Start) => match handle.start_game().await {
                Ok(()) => println!("Game started"),
                Err(e) => println!("Cannot start game: {}", e),
            },
            Ok(Command::Kick(id)) => {
                if !handle.kick(id).await {
                    println!("No client with id {}", id);
                }
            }
            Ok(Command::Players) => {
                for player in handle.players().await {
                    let state = if player.hello_received {
                        "joined"
                    } else {
                        "handshaking"
                    };
                    let row = format!("{:>3}  {:<16}  {}", player.id, player.name, player.addr);
                    println!("{}  {}", row, state);
                }
            }
            Ok(Command::Quit) => {
                handle.quit().await;
                break;
            }
            Err(message) => println!("{}", message),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let config = ServerConfig::new(&args.host, args.port);

    let server = Server::bind(&config).await?;
    let handle = server.handle();
    info!("Type 'start' once every player has joined");

    tokio::spawn(admin_console(handle.clone()));

    let mut running = tokio::spawn(server.run());
    let result = tokio::select! {
        result = &mut running => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            handle.quit().await;
            running.await?
        }
    };

    // Connection writers still hold the final notices
    tokio::time::sleep(Duration::from_millis(200)).await;
    result
}
