use clap::{Parser, Subcommand};
use client::command::{Command, HELP};
use client::network::TrafficGenerator;
use log::{info, warn};
use shared::{Event, Team, DEFAULT_HOST, DEFAULT_RX_PORT};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Scoring station address
    #[arg(short = 'H', long, default_value = DEFAULT_HOST)]
    host: String,

    /// Port the station listens on
    #[arg(short, long, default_value_t = DEFAULT_RX_PORT)]
    port: u16,

    #[command(subcommand)]
    action: Option<Action>,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Tag a player
    Hit { shooter: u32, target: u32 },
    /// Score a base hit for a team
    Base { team: Team },
    /// Send the start code
    Start,
    /// Send the end code
    End,
    /// Send random tags and base hits among the demo players
    Random {
        #[arg(short, long, default_value_t = 10)]
        count: usize,
        /// Milliseconds between events
        #[arg(short, long, default_value_t = 1000)]
        interval: u64,
        /// Seed for a repeatable sequence
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Read commands from stdin (default)
    Interactive,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let mut generator = TrafficGenerator::new(&args.host, args.port).await?;

    match args.action.unwrap_or(Action::Interactive) {
        Action::Hit { shooter, target } => {
            generator
                .send(&Event::Hit {
                    shooter_id: shooter,
                    target_id: target,
                })
                .await?
        }
        Action::Base { team } => generator.send(&Event::BaseHit { team }).await?,
        Action::Start => generator.send(&Event::GameStart).await?,
        Action::End => generator.send(&Event::GameEnd).await?,
        Action::Random {
            count,
            interval,
            seed,
        } => {
            if let Some(seed) = seed {
                generator = generator.with_seed(seed);
            }
            generator
                .send_random(count, Duration::from_millis(interval))
                .await?;
        }
        Action::Interactive => run_console(&mut generator).await?,
    }

    Ok(())
}

async fn run_console(
    generator: &mut TrafficGenerator,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Sending to {}. Type 'help' for commands.", generator.target());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        let sent = match command {
            Command::Send(event) => generator.send(&event).await,
            Command::Random(count) => generator
                .send_random(count, Duration::ZERO)
                .await
                .map(|events| {
                    for event in events {
                        println!("sent {}", event);
                    }
                }),
            Command::Raw(text) => generator.send_raw(&text).await,
            Command::Help => {
                println!("{}", HELP);
                Ok(())
            }
            Command::Quit => break,
        };
        if let Err(e) = sent {
            warn!("{}", e);
        }
    }

    info!("Console closed");
    Ok(())
}
