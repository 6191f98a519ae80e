use clap::Parser;
use log::{debug, error, info, warn};
use server::clock::MatchClock;
use server::game::{Match, MatchSettings, Winner};
use server::network::{NetworkConfig, NetworkReceiver, Transmitter};
use server::publisher::{AudioCue, Presenter, Snapshot};
use server::roster::{
    JsonRegistry, MemoryRegistry, PlayerRegistry, Roster, RosterBuilder, RosterFile,
};
use server::service::{MatchService, DEFAULT_QUEUE_CAPACITY};
use shared::{Team, DEFAULT_HOST, DEFAULT_RX_PORT, DEFAULT_TX_PORT, START_CODE};
use std::path::PathBuf;
use tokio::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Equipment network address
    #[arg(short = 'H', long, default_value = DEFAULT_HOST)]
    host: String,

    /// Port the equipment reports events on
    #[arg(long, default_value_t = DEFAULT_RX_PORT)]
    rx_port: u16,

    /// Port start/end codes are announced on
    #[arg(long, default_value_t = DEFAULT_TX_PORT)]
    tx_port: u16,

    /// Match length in seconds
    #[arg(short, long, default_value_t = 360)]
    duration: u64,

    /// Seconds remaining when the warning sounds
    #[arg(short, long, default_value_t = 30)]
    warning: u64,

    /// Points gained per tag, or lost for friendly fire
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u16).range(1..))]
    hit_points: u16,

    /// Points for scoring on the opposing base
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u16).range(1..))]
    base_points: u16,

    /// Capacity of the event queue
    #[arg(short, long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    queue: usize,

    /// Roster JSON file; a demo roster is used when omitted
    #[arg(short, long)]
    roster: Option<PathBuf>,

    /// Player registry JSON file used to fill in missing code names
    #[arg(long)]
    registry: Option<PathBuf>,

    /// Drive the match locally without binding any sockets
    #[arg(long)]
    no_network: bool,

    /// Wait for the equipment to send the start code instead of starting now
    #[arg(long)]
    wait_for_start: bool,

    /// Print snapshots as JSON lines
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let roster = load_roster(&args)?;
    let settings = MatchSettings {
        duration: Duration::from_secs(args.duration),
        warning_secs: args.warning,
        points_per_hit: args.hit_points,
        points_per_base: args.base_points,
        ..MatchSettings::default()
    };
    info!(
        "Roster: {} red, {} green",
        roster.team(Team::Red).len(),
        roster.team(Team::Green).len()
    );

    let mut service = MatchService::new(Match::new(roster, settings), args.queue);
    service.subscribe(ConsolePresenter::new(args.json));
    service.subscribe_audio(|cue: AudioCue| info!("Audio cue: {}", cue));
    let handle = service.handle();

    let receiver_handle = if args.no_network {
        info!("Network disabled, match is driven locally");
        None
    } else {
        let config = NetworkConfig {
            host: args.host.clone(),
            rx_port: args.rx_port,
            tx_port: args.tx_port,
            ..NetworkConfig::default()
        };

        match Transmitter::bind(&config).await {
            Ok(transmitter) => service.set_transmitter(transmitter),
            Err(e) => warn!("Transmitter unavailable: {}", e),
        }

        match NetworkReceiver::bind(&config) {
            Ok(receiver) => Some(receiver.spawn(handle.sender(), service.stop_signal())),
            Err(e) => {
                error!("{}; continuing without the equipment network", e);
                None
            }
        }
    };

    let clock_handle =
        MatchClock::default().spawn(handle.sender(), service.stop_signal());
    let service_handle = tokio::spawn(service.run());

    if args.wait_for_start && receiver_handle.is_some() {
        info!("Waiting for start code {} from the equipment", START_CODE);
    } else {
        if args.wait_for_start {
            warn!("Nothing can send a start code, starting locally");
        }
        handle.start().await?;
    }

    tokio::select! {
        _ = handle.wait_until_ended() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, ending match");
            if handle.end().await.is_err() {
                debug!("Match service already stopped");
            }
        }
    }
    if handle.shutdown().await.is_err() {
        debug!("Match service already stopped");
    }

    let report = service_handle.await?;
    clock_handle.await?;
    if let Some(receiver_handle) = receiver_handle {
        receiver_handle.await?;
    }

    let snapshot = &report.snapshot;
    println!(
        "Final Score - Red: {} | Green: {}",
        snapshot.red_score, snapshot.green_score
    );
    match report.winner {
        Some(Winner::Tie) => println!("It's a tie!"),
        Some(winner) => println!("{} team wins!", winner),
        None => println!("Match never started"),
    }

    Ok(())
}

fn load_roster(args: &Args) -> Result<Roster, Box<dyn std::error::Error>> {
    let registry: Box<dyn PlayerRegistry> = match &args.registry {
        Some(path) => Box::new(JsonRegistry::open(path)?),
        None => Box::new(MemoryRegistry::new()),
    };

    match &args.roster {
        Some(path) => Ok(RosterFile::load(path)?.assemble(registry.as_ref())?),
        None => {
            warn!("No roster file given, using the demo roster");
            let mut builder = RosterBuilder::new();
            builder.add_player(1, "Viper", Team::Red, 1)?;
            builder.add_player(2, "Ghost", Team::Red, 2)?;
            builder.add_player(3, "Raven", Team::Green, 3)?;
            builder.add_player(4, "Blaze", Team::Green, 4)?;
            Ok(builder.build()?)
        }
    }
}

/// Prints new log entries and score changes to stdout.
struct ConsolePresenter {
    json: bool,
    printed: usize,
    scores: Option<(i32, i32)>,
}

impl ConsolePresenter {
    fn new(json: bool) -> Self {
        Self {
            json,
            printed: 0,
            scores: None,
        }
    }

    /// Log entries not yet printed. Entries that already slid out of the
    /// snapshot's tail are skipped.
    fn fresh_entries<'a>(&mut self, snapshot: &'a Snapshot) -> &'a [String] {
        let fresh = snapshot.log_len.saturating_sub(self.printed);
        self.printed = snapshot.log_len;

        let tail = &snapshot.recent_events;
        &tail[tail.len().saturating_sub(fresh)..]
    }
}

impl Presenter for ConsolePresenter {
    fn timer(&mut self, remaining: &str) {
        debug!("Time remaining: {}", remaining);
    }

    fn snapshot(&mut self, snapshot: &Snapshot) {
        if self.json {
            match serde_json::to_string(snapshot) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("Failed to serialize snapshot: {}", e),
            }
            return;
        }

        for entry in self.fresh_entries(snapshot) {
            println!("{}", entry);
        }

        let scores = (snapshot.red_score, snapshot.green_score);
        if self.scores != Some(scores) {
            self.scores = Some(scores);
            println!(
                "[{}] Red {} | Green {}",
                snapshot.remaining, snapshot.red_score, snapshot.green_score
            );
        }
    }

    fn match_ended(&mut self, winner: Winner) {
        info!("Game over, result: {}", winner);
    }

    fn warning(&mut self) {
        println!("*** Time is almost up! ***");
    }
}
