//! Authoritative match state.
//!
//! [`Match`] owns every piece of mutable match data: per-player scores,
//! base-hit credits, the timer bounds and the `Idle -> Running -> Ended`
//! lifecycle. Exactly one task owns a `Match` (see [`crate::service`]), so
//! nothing in here is synchronised.
//!
//! Time is always passed in as an [`Instant`] so the state machine stays
//! deterministic under test.

use crate::roster::{Player, Roster};
use chrono::Local;
use log::{debug, info, warn};
use serde::Serialize;
use shared::{Event, Team};
use std::collections::HashSet;
use std::fmt;
use tokio::time::{Duration, Instant};

pub const DEFAULT_DURATION_SECS: u64 = 360;
pub const DEFAULT_WARNING_SECS: u64 = 30;
pub const DEFAULT_POINTS_PER_HIT: u16 = 10;
pub const DEFAULT_POINTS_PER_BASE: u16 = 100;
pub const DEFAULT_RECENT_EVENTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSettings {
    pub duration: Duration,
    /// Remaining seconds at which the one-shot warning is raised
    pub warning_secs: u64,
    /// Always awarded as a gain, or as a penalty for friendly fire
    pub points_per_hit: u16,
    pub points_per_base: u16,
    /// How many log entries snapshots carry
    pub recent_events: usize,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(DEFAULT_DURATION_SECS),
            warning_secs: DEFAULT_WARNING_SECS,
            points_per_hit: DEFAULT_POINTS_PER_HIT,
            points_per_base: DEFAULT_POINTS_PER_BASE,
            recent_events: DEFAULT_RECENT_EVENTS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPhase {
    Idle,
    Running,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Winner {
    Red,
    Green,
    Tie,
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Winner::Red => f.write_str("Red"),
            Winner::Green => f.write_str("Green"),
            Winner::Tie => f.write_str("Tie"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    Local,
    Network,
    Expired,
    Shutdown,
}

/// Why a scoring or control event changed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("game not running")]
    NotRunning,
    #[error("invalid player id")]
    InvalidPlayer,
    #[error("cannot hit yourself")]
    SelfHit,
    #[error("already hit a base")]
    AlreadyHitBase,
}

/// What an accepted event did to the match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Started,
    Ended(EndReason),
    Hit { shooter: u32, target: u32, delta: i32 },
    FriendlyFire { shooter: u32, target: u32, delta: i32 },
    BaseHit { team: Team, equipment_id: u32, delta: i32 },
    /// Control message that arrived in a phase where it is a no-op
    Absorbed,
}

impl Outcome {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Outcome::Absorbed)
    }
}

/// Result of one clock tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickOutcome {
    pub remaining_secs: u64,
    pub warning: bool,
    pub expired: bool,
}

/// Running per-player state.
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub player: Player,
    pub score: i32,
    pub base_hit: bool,
}

impl PlayerState {
    fn new(player: Player) -> Self {
        Self {
            player,
            score: 0,
            base_hit: false,
        }
    }
}

#[derive(Debug)]
pub struct Match {
    settings: MatchSettings,
    red: Vec<PlayerState>,
    green: Vec<PlayerState>,
    captains: [Option<u32>; 2],
    phase: MatchPhase,
    started_at: Option<Instant>,
    deadline: Option<Instant>,
    red_score: i32,
    green_score: i32,
    red_base_hit: bool,
    green_base_hit: bool,
    base_credits: HashSet<u32>,
    recently_scored: HashSet<u32>,
    warned: bool,
    log: Vec<String>,
}

impl Match {
    pub fn new(roster: Roster, settings: MatchSettings) -> Self {
        let captains = [
            roster.captain(Team::Red).map(|p| p.equipment_id),
            roster.captain(Team::Green).map(|p| p.equipment_id),
        ];
        let red = roster
            .team(Team::Red)
            .iter()
            .cloned()
            .map(PlayerState::new)
            .collect();
        let green = roster
            .team(Team::Green)
            .iter()
            .cloned()
            .map(PlayerState::new)
            .collect();

        Self {
            settings,
            red,
            green,
            captains,
            phase: MatchPhase::Idle,
            started_at: None,
            deadline: None,
            red_score: 0,
            green_score: 0,
            red_base_hit: false,
            green_base_hit: false,
            base_credits: HashSet::new(),
            recently_scored: HashSet::new(),
            warned: false,
            log: Vec::new(),
        }
    }

    pub fn settings(&self) -> &MatchSettings {
        &self.settings
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == MatchPhase::Running
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    /// `Idle -> Running`. Any other phase absorbs the request.
    pub fn start(&mut self, now: Instant) -> Outcome {
        if self.phase != MatchPhase::Idle {
            debug!("Start ignored, match is {:?}", self.phase);
            return Outcome::Absorbed;
        }

        for state in self.red.iter_mut().chain(self.green.iter_mut()) {
            state.score = 0;
            state.base_hit = false;
        }
        self.base_credits.clear();
        self.recently_scored.clear();
        self.red_base_hit = false;
        self.green_base_hit = false;
        self.warned = false;
        self.update_team_scores();

        self.phase = MatchPhase::Running;
        self.started_at = Some(now);
        self.deadline = Some(now + self.settings.duration);
        self.log
            .push(format!("Game started at {}", Local::now().format("%H:%M:%S")));

        info!(
            "Match started: {} red vs {} green, {}s",
            self.red.len(),
            self.green.len(),
            self.settings.duration.as_secs()
        );
        Outcome::Started
    }

    /// `Running -> Ended`. Any other phase absorbs the request.
    pub fn end(&mut self, reason: EndReason) -> Outcome {
        if self.phase != MatchPhase::Running {
            debug!("End ({:?}) ignored, match is {:?}", reason, self.phase);
            return Outcome::Absorbed;
        }

        self.phase = MatchPhase::Ended;
        self.log
            .push(format!("Game ended at {}", Local::now().format("%H:%M:%S")));
        self.log.push(format!(
            "Final Score - Red: {} | Green: {}",
            self.red_score, self.green_score
        ));

        info!(
            "Match ended ({:?}): Red {} | Green {}",
            reason, self.red_score, self.green_score
        );
        Outcome::Ended(reason)
    }

    /// Applies one decoded network event.
    pub fn apply(&mut self, event: Event, now: Instant) -> Result<Outcome, Rejection> {
        match event {
            Event::GameStart => Ok(self.start(now)),
            Event::GameEnd => Ok(self.end(EndReason::Network)),
            Event::Hit {
                shooter_id,
                target_id,
            } => self.register_hit(shooter_id, target_id),
            Event::BaseHit { team } => self.register_base_hit(team),
        }
    }

    pub fn register_hit(&mut self, shooter_id: u32, target_id: u32) -> Result<Outcome, Rejection> {
        if !self.is_running() {
            return Err(Rejection::NotRunning);
        }

        let (shooter_team, shooter_name) = self
            .player(shooter_id)
            .map(|s| (s.player.team, s.player.code_name.clone()))
            .ok_or(Rejection::InvalidPlayer)?;
        let (target_team, target_name) = self
            .player(target_id)
            .map(|t| (t.player.team, t.player.code_name.clone()))
            .ok_or(Rejection::InvalidPlayer)?;

        if shooter_id == target_id {
            return Err(Rejection::SelfHit);
        }

        let points = i32::from(self.settings.points_per_hit);
        let friendly = shooter_team == target_team;
        let delta = if friendly { -points } else { points };

        if let Some(shooter) = self.player_mut(shooter_id) {
            shooter.score = shooter.score.saturating_add(delta);
        }
        self.recently_scored.insert(target_id);
        self.update_team_scores();

        if friendly {
            self.log.push(format!(
                "Friendly fire! {} hit {} (-{})",
                shooter_name, target_name, points
            ));
            Ok(Outcome::FriendlyFire {
                shooter: shooter_id,
                target: target_id,
                delta,
            })
        } else {
            self.log
                .push(format!("{} hit {} (+{})", shooter_name, target_name, points));
            Ok(Outcome::Hit {
                shooter: shooter_id,
                target: target_id,
                delta,
            })
        }
    }

    /// Credits a base hit to `team`, attributed to that team's captain.
    pub fn register_base_hit(&mut self, team: Team) -> Result<Outcome, Rejection> {
        if !self.is_running() {
            return Err(Rejection::NotRunning);
        }

        let equipment_id = self.captain(team).ok_or(Rejection::InvalidPlayer)?;
        if self.base_credits.contains(&equipment_id) {
            return Err(Rejection::AlreadyHitBase);
        }

        let points = i32::from(self.settings.points_per_base);
        let name = match self.player_mut(equipment_id) {
            Some(state) => {
                state.score = state.score.saturating_add(points);
                state.base_hit = true;
                state.player.code_name.clone()
            }
            None => return Err(Rejection::InvalidPlayer),
        };
        self.base_credits.insert(equipment_id);
        self.recently_scored.insert(equipment_id);
        match team {
            Team::Red => self.red_base_hit = true,
            Team::Green => self.green_base_hit = true,
        }
        self.update_team_scores();

        self.log
            .push(format!("{} scored a base hit! (+{})", name, points));
        Ok(Outcome::BaseHit {
            team,
            equipment_id,
            delta: points,
        })
    }

    /// Advances the timer. Raises the warning once and ends the match at zero.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        if !self.is_running() {
            return TickOutcome::default();
        }

        let remaining_secs = self.remaining_secs(now);
        let warning = !self.warned && remaining_secs <= self.settings.warning_secs;
        if warning {
            self.warned = true;
            warn!("{} seconds remaining", remaining_secs);
        }

        let expired = remaining_secs == 0;
        if expired {
            self.end(EndReason::Expired);
        }

        TickOutcome {
            remaining_secs,
            warning,
            expired,
        }
    }

    /// Whole seconds left, rounded up. Zero outside `Running`.
    pub fn remaining_secs(&self, now: Instant) -> u64 {
        match (self.phase, self.deadline) {
            (MatchPhase::Running, Some(deadline)) => {
                let left = deadline.saturating_duration_since(now);
                left.as_secs() + u64::from(left.subsec_nanos() > 0)
            }
            _ => 0,
        }
    }

    pub fn formatted_remaining(&self, now: Instant) -> String {
        format_time(self.remaining_secs(now))
    }

    pub fn is_warning_time(&self, now: Instant) -> bool {
        self.is_running() && self.remaining_secs(now) <= self.settings.warning_secs
    }

    pub fn team_score(&self, team: Team) -> i32 {
        match team {
            Team::Red => self.red_score,
            Team::Green => self.green_score,
        }
    }

    pub fn base_hit(&self, team: Team) -> bool {
        match team {
            Team::Red => self.red_base_hit,
            Team::Green => self.green_base_hit,
        }
    }

    /// Players in roster order.
    pub fn team_players(&self, team: Team) -> &[PlayerState] {
        match team {
            Team::Red => &self.red,
            Team::Green => &self.green,
        }
    }

    /// Players by score, highest first; ties keep roster order.
    pub fn team_players_sorted(&self, team: Team) -> Vec<&PlayerState> {
        let mut players: Vec<&PlayerState> = self.team_players(team).iter().collect();
        players.sort_by(|a, b| b.score.cmp(&a.score));
        players
    }

    pub fn player(&self, equipment_id: u32) -> Option<&PlayerState> {
        self.red
            .iter()
            .chain(self.green.iter())
            .find(|s| s.player.equipment_id == equipment_id)
    }

    pub fn has_recently_scored(&self, equipment_id: u32) -> bool {
        self.recently_scored.contains(&equipment_id)
    }

    /// Returns and clears the highlighted equipment ids.
    pub fn take_recently_scored(&mut self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.recently_scored.drain().collect();
        ids.sort_unstable();
        ids
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }

    pub fn recent_events(&self, count: usize) -> &[String] {
        let start = self.log.len().saturating_sub(count);
        &self.log[start..]
    }

    /// Team currently ahead, whatever the phase.
    pub fn leader(&self) -> Winner {
        match self.red_score.cmp(&self.green_score) {
            std::cmp::Ordering::Greater => Winner::Red,
            std::cmp::Ordering::Less => Winner::Green,
            std::cmp::Ordering::Equal => Winner::Tie,
        }
    }

    /// Final result, available once the match has ended.
    pub fn winner(&self) -> Option<Winner> {
        (self.phase == MatchPhase::Ended).then(|| self.leader())
    }

    fn captain(&self, team: Team) -> Option<u32> {
        match team {
            Team::Red => self.captains[0],
            Team::Green => self.captains[1],
        }
    }

    fn player_mut(&mut self, equipment_id: u32) -> Option<&mut PlayerState> {
        self.red
            .iter_mut()
            .chain(self.green.iter_mut())
            .find(|s| s.player.equipment_id == equipment_id)
    }

    fn update_team_scores(&mut self) {
        self.red_score = team_total(&self.red);
        self.green_score = team_total(&self.green);
    }
}

fn team_total(players: &[PlayerState]) -> i32 {
    players
        .iter()
        .fold(0i32, |total, state| total.saturating_add(state.score))
}

/// Formats seconds as `MM:SS`.
pub fn format_time(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
