//! # Laser Tag Traffic Library
//!
//! This library stands in for the players' equipment. It speaks the station's
//! plain-text UDP protocol so a scoring station can be exercised without any
//! hardware on the field.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! Sends encoded events to a station:
//! - Single events, with the end code repeated as the protocol requires
//! - Random tags and base hits among a list of equipment ids
//! - Raw text, for checking that the station drops what it cannot decode
//!
//! ### Command Module (`command`)
//! Parses the lines typed at the interactive console.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::TrafficGenerator;
//! use shared::Event;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut generator = TrafficGenerator::new("127.0.0.1", 7501).await?;
//!
//!     generator.send(&Event::GameStart).await?;
//!     generator.send(&Event::Hit { shooter_id: 1, target_id: 3 }).await?;
//!     generator.send_random(10, Duration::from_millis(500)).await?;
//!     generator.send(&Event::GameEnd).await?;
//!     Ok(())
//! }
//! ```

pub mod command;
pub mod network;
