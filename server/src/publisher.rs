//! Snapshots and notifications for the presentation and audio collaborators.
//!
//! Sinks are registered explicitly on the [`Publisher`] before the match
//! service runs. Readers that prefer polling hold a `watch::Receiver` and see
//! the latest [`Snapshot`], which is replaced after every mutation and tick.

use crate::game::{Match, MatchPhase, Outcome, PlayerState, Winner};
use log::debug;
use serde::Serialize;
use shared::Team;
use std::fmt;
use tokio::sync::watch;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerRow {
    pub id: u32,
    pub equipment_id: u32,
    pub name: String,
    pub score: i32,
    pub base_hit: bool,
    pub recently_scored: bool,
}

/// Immutable copy of the match taken right after a mutation or tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub phase: MatchPhase,
    pub remaining_secs: u64,
    pub remaining: String,
    pub red_score: i32,
    pub green_score: i32,
    /// Sorted by score, highest first
    pub red_players: Vec<PlayerRow>,
    pub green_players: Vec<PlayerRow>,
    pub red_base_hit: bool,
    pub green_base_hit: bool,
    pub recent_events: Vec<String>,
    /// Entries ever logged; `recent_events` is the tail of these
    pub log_len: usize,
    pub winner: Option<Winner>,
}

impl Snapshot {
    pub fn capture(game: &Match, now: Instant) -> Self {
        let rows = |team: Team| -> Vec<PlayerRow> {
            game.team_players_sorted(team)
                .into_iter()
                .map(|state| row(game, state))
                .collect()
        };
        let remaining_secs = game.remaining_secs(now);

        Self {
            phase: game.phase(),
            remaining_secs,
            remaining: crate::game::format_time(remaining_secs),
            red_score: game.team_score(Team::Red),
            green_score: game.team_score(Team::Green),
            red_players: rows(Team::Red),
            green_players: rows(Team::Green),
            red_base_hit: game.base_hit(Team::Red),
            green_base_hit: game.base_hit(Team::Green),
            recent_events: game.recent_events(game.settings().recent_events).to_vec(),
            log_len: game.log().len(),
            winner: game.winner(),
        }
    }

    pub fn team_score(&self, team: Team) -> i32 {
        match team {
            Team::Red => self.red_score,
            Team::Green => self.green_score,
        }
    }

    pub fn player(&self, equipment_id: u32) -> Option<&PlayerRow> {
        self.red_players
            .iter()
            .chain(self.green_players.iter())
            .find(|row| row.equipment_id == equipment_id)
    }
}

fn row(game: &Match, state: &PlayerState) -> PlayerRow {
    PlayerRow {
        id: state.player.id,
        equipment_id: state.player.equipment_id,
        name: state.player.code_name.clone(),
        score: state.score,
        base_hit: state.base_hit,
        recently_scored: game.has_recently_scored(state.player.equipment_id),
    }
}

/// Semantic sound cue; the audio collaborator picks the actual sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioCue {
    Hit,
    BaseHit,
    Warning,
    GameOver,
}

impl AudioCue {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioCue::Hit => "hit",
            AudioCue::BaseHit => "base_hit",
            AudioCue::Warning => "warning",
            AudioCue::GameOver => "game_over",
        }
    }
}

impl fmt::Display for AudioCue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a state change to the cue it should trigger, if any.
pub fn cue_for(outcome: &Outcome) -> Option<AudioCue> {
    match outcome {
        Outcome::Hit { .. } | Outcome::FriendlyFire { .. } => Some(AudioCue::Hit),
        Outcome::BaseHit { .. } => Some(AudioCue::BaseHit),
        Outcome::Ended(_) => Some(AudioCue::GameOver),
        Outcome::Started | Outcome::Absorbed => None,
    }
}

/// Push-style presentation callbacks. Every method defaults to a no-op.
pub trait Presenter: Send {
    fn timer(&mut self, _remaining: &str) {}
    fn snapshot(&mut self, _snapshot: &Snapshot) {}
    fn log(&mut self, _entries: &[String]) {}
    fn match_ended(&mut self, _winner: Winner) {}
    fn warning(&mut self) {}
}

/// Fire-and-forget audio collaborator.
pub trait AudioSink: Send {
    fn play(&mut self, cue: AudioCue);
}

impl<F> AudioSink for F
where
    F: FnMut(AudioCue) + Send,
{
    fn play(&mut self, cue: AudioCue) {
        self(cue)
    }
}

pub struct Publisher {
    presenters: Vec<Box<dyn Presenter>>,
    audio: Vec<Box<dyn AudioSink>>,
    snapshots: watch::Sender<Snapshot>,
}

impl Publisher {
    pub fn new(initial: Snapshot) -> Self {
        let (snapshots, _) = watch::channel(initial);
        Self {
            presenters: Vec::new(),
            audio: Vec::new(),
            snapshots,
        }
    }

    pub fn subscribe(&mut self, presenter: impl Presenter + 'static) {
        self.presenters.push(Box::new(presenter));
    }

    pub fn subscribe_audio(&mut self, sink: impl AudioSink + 'static) {
        self.audio.push(Box::new(sink));
    }

    /// Receiver that always holds the latest snapshot.
    pub fn watch(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.subscribe()
    }

    pub fn latest(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    /// Captures and pushes a snapshot to every reader.
    pub fn publish(&mut self, game: &Match, now: Instant) -> Snapshot {
        let snapshot = Snapshot::capture(game, now);

        for presenter in &mut self.presenters {
            presenter.timer(&snapshot.remaining);
            presenter.snapshot(&snapshot);
            presenter.log(&snapshot.recent_events);
        }
        self.snapshots.send_replace(snapshot.clone());

        snapshot
    }

    /// Forwards the cue mapped from `outcome` and the end-of-match signal.
    pub fn announce(&mut self, outcome: &Outcome, winner: Winner) {
        if let Some(cue) = cue_for(outcome) {
            self.play(cue);
        }
        if let Outcome::Ended(reason) = outcome {
            debug!("Announcing match end ({:?}), winner {}", reason, winner);
            for presenter in &mut self.presenters {
                presenter.match_ended(winner);
            }
        }
    }

    pub fn warning(&mut self) {
        for presenter in &mut self.presenters {
            presenter.warning();
        }
        self.play(AudioCue::Warning);
    }

    fn play(&mut self, cue: AudioCue) {
        for sink in &mut self.audio {
            sink.play(cue);
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Presenter that records every call as a short string.
    #[derive(Clone, Default)]
    pub struct Recorder {
        pub calls: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().map(|c| c.clone()).unwrap_or_default()
        }

        fn push(&self, call: String) {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(call);
            }
        }
    }

    impl Presenter for Recorder {
        fn timer(&mut self, remaining: &str) {
            self.push(format!("timer {}", remaining));
        }

        fn snapshot(&mut self, snapshot: &Snapshot) {
            self.push(format!(
                "snapshot {}-{}",
                snapshot.red_score, snapshot.green_score
            ));
        }

        fn match_ended(&mut self, winner: Winner) {
            self.push(format!("ended {}", winner));
        }

        fn warning(&mut self) {
            self.push("warning".to_string());
        }
    }

    pub fn cue_log() -> (Arc<Mutex<Vec<AudioCue>>>, impl AudioSink + 'static) {
        let cues = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let cues = Arc::clone(&cues);
            move |cue: AudioCue| {
                if let Ok(mut cues) = cues.lock() {
                    cues.push(cue);
                }
            }
        };
        (cues, sink)
    }
}
