use crate::service::MatchCommand;
use log::{debug, info};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_secs(1);

/// Periodic tick producer for the match service.
///
/// Ticks carry no payload; the service reads the time itself when it applies
/// one. A tick that finds the queue full is skipped rather than waited on, so
/// the clock never blocks behind a burst of network events.
#[derive(Debug, Clone, Copy)]
pub struct MatchClock {
    period: Duration,
}

impl Default for MatchClock {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_PERIOD)
    }
}

impl MatchClock {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn spawn(
        self,
        commands: mpsc::Sender<MatchCommand>,
        mut stop: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                if *stop.borrow() {
                    break;
                }

                tokio::select! {
                    _ = ticker.tick() => match commands.try_send(MatchCommand::Tick) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => debug!("Match queue full, skipping tick"),
                        Err(TrySendError::Closed(_)) => break,
                    },

                    changed = stop.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }

            info!("Match clock stopped");
        })
    }
}
