//! # Laser Tag Station Library
//!
//! This library is the scoring core of the laser tag base station. It holds
//! the authoritative state of one match, applies events reported by the
//! players' equipment over UDP, runs the match timer, and hands snapshots and
//! sound cues to whatever presentation layer is attached.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Match State
//! Scores, base flags and the match phase live in exactly one place. Team
//! totals are always the sum of their players' scores, and a team's base can
//! only be scored once per match.
//!
//! ### Event Ordering
//! Every state change enters through one bounded channel and is applied by a
//! single consumer task:
//! - Decoded datagrams from the equipment network
//! - Clock ticks that count the match down
//! - Operator start, end and shutdown requests
//!
//! ### Publishing
//! After each applied event or tick the consumer captures a snapshot and
//! pushes it to registered presenters and to any `watch` subscriber. Audio
//! collaborators receive semantic cues only.
//!
//! ## Module Organization
//!
//! ### Roster Module (`roster`)
//! Team rosters and the player registry consulted while building them:
//! - Per-team capacity and duplicate id checks
//! - In-memory and JSON-backed registries
//!
//! ### Game Module (`game`)
//! The match state machine (`Idle -> Running -> Ended`), scoring rules, the
//! event log and the countdown.
//!
//! ### Service Module (`service`)
//! The command channel, the single consumer and its shutdown drain.
//!
//! ### Clock Module (`clock`)
//! Once-per-second tick producer that skips ticks rather than block.
//!
//! ### Network Module (`network`)
//! UDP receiver that decodes datagrams into commands, and the transmitter that
//! announces local start and end to the equipment.
//!
//! ### Publisher Module (`publisher`)
//! Snapshots, presenter and audio traits, and the fan-out between them.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::clock::MatchClock;
//! use server::game::{Match, MatchSettings};
//! use server::network::{NetworkConfig, NetworkReceiver};
//! use server::roster::RosterBuilder;
//! use server::service::MatchService;
//! use shared::Team;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut roster = RosterBuilder::new();
//!     roster.add_player(1, "Viper", Team::Red, 1)?;
//!     roster.add_player(2, "Raven", Team::Green, 2)?;
//!
//!     let game = Match::new(roster.build()?, MatchSettings::default());
//!     let service = MatchService::new(game, 1024);
//!     let handle = service.handle();
//!
//!     // Producers: equipment network and the match clock
//!     let receiver = NetworkReceiver::bind(&NetworkConfig::default())?;
//!     let network = receiver.spawn(handle.sender(), service.stop_signal());
//!     let clock =
//!         MatchClock::default().spawn(handle.sender(), service.stop_signal());
//!
//!     let consumer = tokio::spawn(service.run());
//!     handle.start().await?;
//!     handle.wait_until_ended().await;
//!
//!     let report = consumer.await?;
//!     let _ = tokio::join!(network, clock);
//!     println!("Winner: {:?}", report.winner);
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod game;
pub mod network;
pub mod publisher;
pub mod roster;
pub mod service;
