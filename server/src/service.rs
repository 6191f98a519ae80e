//! The match service: one ordered channel, one owner of match state.
//!
//! Producers (network receiver, match clock, local operator through a
//! [`MatchHandle`]) only ever enqueue [`MatchCommand`]s. [`MatchService::run`]
//! is the single consumer. It applies one command completely, publishes a
//! snapshot, and only then takes the next one, so ticks and network events
//! never interleave mid-mutation.
//!
//! Shutdown drains: once the match ends or a shutdown is requested, the
//! channel is closed to new sends and every command already queued is still
//! applied in order before the final snapshot is published.

use crate::game::{EndReason, Match, MatchPhase, Outcome, Winner};
use crate::network::Transmitter;
use crate::publisher::{AudioSink, Presenter, Publisher, Snapshot};
use log::{debug, info, warn};
use shared::Event;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Messages funnelled into the match service
#[derive(Debug)]
pub enum MatchCommand {
    /// Decoded datagram from the equipment network
    Network(Event),
    /// Periodic nudge from the match clock
    Tick,
    /// Operator start
    Start,
    /// Operator end
    End,
    /// Read-and-clear of the "recently scored" highlights
    TakeHighlights(oneshot::Sender<Vec<u32>>),
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("match service has stopped")]
pub struct ServiceStopped;

/// Cloneable front door to a running [`MatchService`].
#[derive(Clone)]
pub struct MatchHandle {
    commands: mpsc::Sender<MatchCommand>,
    snapshots: watch::Receiver<Snapshot>,
}

impl MatchHandle {
    pub fn sender(&self) -> mpsc::Sender<MatchCommand> {
        self.commands.clone()
    }

    pub async fn send(&self, command: MatchCommand) -> Result<(), ServiceStopped> {
        self.commands.send(command).await.map_err(|_| ServiceStopped)
    }

    pub async fn start(&self) -> Result<(), ServiceStopped> {
        self.send(MatchCommand::Start).await
    }

    pub async fn end(&self) -> Result<(), ServiceStopped> {
        self.send(MatchCommand::End).await
    }

    pub async fn shutdown(&self) -> Result<(), ServiceStopped> {
        self.send(MatchCommand::Shutdown).await
    }

    /// Equipment ids highlighted since the last call.
    pub async fn take_highlights(&self) -> Result<Vec<u32>, ServiceStopped> {
        let (reply, response) = oneshot::channel();
        self.send(MatchCommand::TakeHighlights(reply)).await?;
        response.await.map_err(|_| ServiceStopped)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    /// Final result once the match has ended.
    pub fn winner(&self) -> Option<Winner> {
        self.snapshots.borrow().winner
    }

    /// Resolves when the match reaches `Ended` or the service goes away.
    pub async fn wait_until_ended(&self) {
        let mut snapshots = self.snapshots.clone();
        loop {
            if snapshots.borrow_and_update().phase == MatchPhase::Ended {
                return;
            }
            if snapshots.changed().await.is_err() {
                return;
            }
        }
    }
}

/// What the service leaves behind.
#[derive(Debug, Clone)]
pub struct MatchReport {
    pub snapshot: Snapshot,
    pub winner: Option<Winner>,
    /// Commands applied after the channel was closed
    pub drained: usize,
}

pub struct MatchService {
    consumer: Consumer,
    sender: mpsc::Sender<MatchCommand>,
}

impl MatchService {
    pub fn new(game: Match, capacity: usize) -> Self {
        let (sender, commands) = mpsc::channel(capacity.max(1));
        let (stop, _) = watch::channel(false);
        let publisher = Publisher::new(Snapshot::capture(&game, Instant::now()));

        Self {
            consumer: Consumer {
                game,
                publisher,
                commands,
                stop,
                transmitter: None,
            },
            sender,
        }
    }

    pub fn subscribe(&mut self, presenter: impl Presenter + 'static) {
        self.consumer.publisher.subscribe(presenter);
    }

    pub fn subscribe_audio(&mut self, sink: impl AudioSink + 'static) {
        self.consumer.publisher.subscribe_audio(sink);
    }

    /// Announce operator start/end on the equipment network.
    pub fn set_transmitter(&mut self, transmitter: Transmitter) {
        self.consumer.transmitter = Some(transmitter);
    }

    pub fn handle(&self) -> MatchHandle {
        MatchHandle {
            commands: self.sender.clone(),
            snapshots: self.consumer.publisher.watch(),
        }
    }

    /// Flips to `true` when producers should stop.
    pub fn stop_signal(&self) -> watch::Receiver<bool> {
        self.consumer.stop.subscribe()
    }

    /// Consumes commands until the match ends or a shutdown arrives, then
    /// drains whatever is still queued.
    pub async fn run(self) -> MatchReport {
        let MatchService {
            mut consumer,
            sender,
        } = self;
        // From here on only handles and producers keep the channel open
        drop(sender);
        consumer.run().await
    }
}

struct Consumer {
    game: Match,
    publisher: Publisher,
    commands: mpsc::Receiver<MatchCommand>,
    stop: watch::Sender<bool>,
    transmitter: Option<Transmitter>,
}

impl Consumer {
    async fn run(&mut self) -> MatchReport {
        self.publisher.publish(&self.game, Instant::now());
        info!("Match service running");

        while let Some(command) = self.commands.recv().await {
            if let MatchCommand::Shutdown = command {
                info!("Shutdown requested");
                break;
            }
            self.handle_command(command).await;
            if self.game.phase() == MatchPhase::Ended {
                break;
            }
        }

        self.stop.send_replace(true);
        self.commands.close();

        let mut drained = 0;
        while let Some(command) = self.commands.recv().await {
            drained += 1;
            self.handle_command(command).await;
        }
        if drained > 0 {
            info!("Drained {} queued commands", drained);
        }

        let outcome = self.game.end(EndReason::Shutdown);
        self.after(outcome, Instant::now());

        let snapshot = self.publisher.latest();
        info!(
            "Match service stopped: Red {} | Green {}",
            snapshot.red_score, snapshot.green_score
        );
        MatchReport {
            winner: snapshot.winner,
            snapshot,
            drained,
        }
    }

    async fn handle_command(&mut self, command: MatchCommand) {
        let now = Instant::now();

        match command {
            MatchCommand::Network(event) => match self.game.apply(event, now) {
                Ok(outcome) => self.after(outcome, now),
                Err(rejection) => warn!("Rejected {}: {}", event, rejection),
            },
            MatchCommand::Start => {
                let outcome = self.game.start(now);
                if outcome == Outcome::Started {
                    announce(self.transmitter.as_ref(), Event::GameStart).await;
                }
                self.after(outcome, now);
            }
            MatchCommand::End => {
                let outcome = self.game.end(EndReason::Local);
                if outcome.is_mutation() {
                    announce(self.transmitter.as_ref(), Event::GameEnd).await;
                }
                self.after(outcome, now);
            }
            MatchCommand::Tick => self.tick(now),
            MatchCommand::TakeHighlights(reply) => {
                let _ = reply.send(self.game.take_recently_scored());
            }
            MatchCommand::Shutdown => debug!("Shutdown already in progress"),
        }
    }

    fn tick(&mut self, now: Instant) {
        if !self.game.is_running() {
            return;
        }

        let tick = self.game.tick(now);
        self.publisher.publish(&self.game, now);
        if tick.warning {
            self.publisher.warning();
        }
        if tick.expired {
            self.publisher
                .announce(&Outcome::Ended(EndReason::Expired), self.game.leader());
        }
    }

    fn after(&mut self, outcome: Outcome, now: Instant) {
        if !outcome.is_mutation() {
            return;
        }
        self.publisher.publish(&self.game, now);
        self.publisher.announce(&outcome, self.game.leader());
    }
}

// Borrows only the transmitter; `Consumer` is not `Sync`.
async fn announce(transmitter: Option<&Transmitter>, event: Event) {
    if let Some(transmitter) = transmitter {
        transmitter.announce(&event).await;
    }
}
