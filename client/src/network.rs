use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use shared::{Event, Team};
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use tokio::net::UdpSocket;
use tokio::time::{sleep, Duration};

/// Chance that a random event is a base hit rather than a tag.
pub const BASE_HIT_CHANCE: f64 = 0.1;

#[derive(Debug, thiserror::Error)]
pub enum TrafficError {
    #[error("invalid address {0}")]
    Address(String),
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
    #[error("need at least two players to generate hits")]
    NotEnoughPlayers,
}

/// Equipment the generator pretends to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrafficPlayer {
    pub equipment_id: u32,
    pub team: Team,
}

impl TrafficPlayer {
    pub fn new(equipment_id: u32, team: Team) -> Self {
        Self { equipment_id, team }
    }
}

/// Two players per team, matching the station's demo roster.
pub fn demo_players() -> Vec<TrafficPlayer> {
    vec![
        TrafficPlayer::new(1, Team::Red),
        TrafficPlayer::new(2, Team::Red),
        TrafficPlayer::new(3, Team::Green),
        TrafficPlayer::new(4, Team::Green),
    ]
}

/// Picks a random base hit or a random tag between two distinct players.
/// Tags may land on a teammate.
pub fn random_event<R: Rng>(players: &[TrafficPlayer], rng: &mut R) -> Result<Event, TrafficError> {
    if players.len() < 2 {
        return Err(TrafficError::NotEnoughPlayers);
    }

    if rng.gen_bool(BASE_HIT_CHANCE) {
        let team = *Team::ALL.choose(rng).ok_or(TrafficError::NotEnoughPlayers)?;
        return Ok(Event::BaseHit { team });
    }

    let mut pair = players.choose_multiple(rng, 2);
    match (pair.next(), pair.next()) {
        (Some(shooter), Some(target)) => Ok(Event::Hit {
            shooter_id: shooter.equipment_id,
            target_id: target.equipment_id,
        }),
        _ => Err(TrafficError::NotEnoughPlayers),
    }
}

/// Sends protocol datagrams to a scoring station.
pub struct TrafficGenerator {
    socket: UdpSocket,
    target: SocketAddr,
    players: Vec<TrafficPlayer>,
    rng: StdRng,
}

impl TrafficGenerator {
    pub async fn new(host: &str, port: u16) -> Result<Self, TrafficError> {
        let target = (host, port)
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| TrafficError::Address(format!("{}:{}", host, port)))?;
        Self::with_target(target).await
    }

    pub async fn with_target(target: SocketAddr) -> Result<Self, TrafficError> {
        let bind_addr = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr).await?;
        info!("Sending traffic to {}", target);

        Ok(Self {
            socket,
            target,
            players: demo_players(),
            rng: StdRng::from_entropy(),
        })
    }

    pub fn with_players(mut self, players: Vec<TrafficPlayer>) -> Self {
        self.players = players;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    pub fn players(&self) -> &[TrafficPlayer] {
        &self.players
    }

    /// Sends the event, repeating it as the protocol requires.
    pub async fn send(&self, event: &Event) -> Result<(), TrafficError> {
        let payload = shared::encode(event);
        for _ in 0..event.transmissions() {
            self.socket.send_to(&payload, self.target).await?;
        }
        info!("Sent {}", event);
        Ok(())
    }

    /// Sends arbitrary text, valid or not.
    pub async fn send_raw(&self, text: &str) -> Result<(), TrafficError> {
        self.socket.send_to(text.as_bytes(), self.target).await?;
        debug!("Sent raw {:?}", text);
        Ok(())
    }

    /// Sends `count` random events, pausing `interval` between them.
    pub async fn send_random(
        &mut self,
        count: usize,
        interval: Duration,
    ) -> Result<Vec<Event>, TrafficError> {
        let mut sent = Vec::with_capacity(count);
        for i in 0..count {
            if i > 0 && !interval.is_zero() {
                sleep(interval).await;
            }
            let event = random_event(&self.players, &mut self.rng)?;
            self.send(&event).await?;
            sent.push(event);
        }
        Ok(sent)
    }
}
