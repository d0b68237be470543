// src/sweeper.rs - Background draft sweeper
use std::sync::{Arc, Weak};

use log::{debug, error, info, trace};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time;

use crate::{NoteStore, Result, StoreConfig, SyncError};

#[derive(Debug, Clone)]
pub struct SweeperStatus {
    /// Whether the sweeper task is running
    pub is_running: bool,
    /// Tick period of the sweeper
    pub interval: std::time::Duration,
}

#[derive(Debug)]
pub enum SweepCommand {
    /// Run a sweep right away and report how many drafts were removed
    SweepNow(oneshot::Sender<usize>),
    /// Stop the sweeper
    Stop,
}

/// Periodically fires due draft sweeps and expires notices on a shared store.
pub struct Sweeper {
    /// Channel to send commands to the sweeper task
    command_tx: Option<mpsc::Sender<SweepCommand>>,

    /// Handle to the sweeper task
    task: Option<JoinHandle<()>>,

    status: SweeperStatus,
}

fn sweep(store: &mut NoteStore) -> usize {
    let removed = store.run_due_sweeps();
    store.expire_notices();
    removed
}

impl Sweeper {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            command_tx: None,
            task: None,
            status: SweeperStatus {
                is_running: false,
                interval: config.sweep_interval(),
            },
        }
    }

    /// Starts the sweeper task. It holds only a weak reference and exits on
    /// its own once the store is dropped.
    pub fn start(&mut self, store: &Arc<Mutex<NoteStore>>) -> Result<()> {
        if self.task.is_some() {
            debug!("Sweeper already running");
            return Ok(());
        }
        info!("Starting draft sweeper every {:?}", self.status.interval);

        let (command_tx, mut command_rx) = mpsc::channel(10);
        self.command_tx = Some(command_tx);

        let weak: Weak<Mutex<NoteStore>> = Arc::downgrade(store);
        let period = self.status.interval;

        let task = tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.tick().await; // Initial tick

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let Some(store) = weak.upgrade() else {
                            debug!("Store dropped, sweeper exiting");
                            break;
                        };
                        let removed = sweep(&mut *store.lock().await);
                        if removed > 0 {
                            debug!("Sweeper removed {} expired drafts", removed);
                        } else {
                            trace!("Sweeper tick, nothing to remove");
                        }
                    }
                    Some(cmd) = command_rx.recv() => match cmd {
                        SweepCommand::SweepNow(reply) => {
                            let removed = match weak.upgrade() {
                                Some(store) => sweep(&mut *store.lock().await),
                                None => 0,
                            };
                            if reply.send(removed).is_err() {
                                trace!("Sweep requester went away");
                            }
                        }
                        SweepCommand::Stop => {
                            info!("Draft sweeper stopping...");
                            break;
                        }
                    }
                }
            }
        });

        self.task = Some(task);
        self.status.is_running = true;
        Ok(())
    }

    /// Stop the sweeper if it's running
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            if let Some(tx) = self.command_tx.take() {
                if let Err(e) = tx.send(SweepCommand::Stop).await {
                    // the task already exited
                    debug!("Sweeper stop command not delivered: {}", e);
                }
            }

            if let Err(e) = task.await {
                let error_msg = format!("Failed to stop sweeper: {}", e);
                error!("{}", error_msg);
                return Err(SyncError::SweeperFailed { message: error_msg });
            }

            self.status.is_running = false;
            info!("Draft sweeper stopped");
        } else {
            debug!("Draft sweeper is not running");
        }

        Ok(())
    }

    /// Sweep immediately, regardless of the schedule.
    pub async fn sweep_now(&self) -> Result<usize> {
        let tx = self.command_tx.as_ref().ok_or_else(|| SyncError::SweeperFailed {
            message: "Draft sweeper is not running".to_string(),
        })?;

        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(SweepCommand::SweepNow(reply_tx))
            .await
            .map_err(|e| SyncError::SweeperFailed {
                message: format!("Failed to send sweep command: {}", e),
            })?;

        reply_rx.await.map_err(|e| SyncError::SweeperFailed {
            message: format!("Sweeper did not answer: {}", e),
        })
    }

    pub fn get_status(&self) -> SweeperStatus {
        self.status.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::store_with_clock;
    use crate::NoteFields;
    use chrono::Duration;

    #[tokio::test]
    async fn sweep_now_removes_expired_drafts() {
        let (store, _api, clock) = store_with_clock();
        let store = Arc::new(Mutex::new(store));
        let draft = store
            .lock()
            .await
            .add_note(NoteFields::default())
            .unwrap();

        let mut sweeper = Sweeper::new(&StoreConfig {
            sweep_interval_ms: 60_000,
            ..StoreConfig::default()
        });
        sweeper.start(&store).unwrap();
        assert!(sweeper.get_status().is_running);

        assert_eq!(sweeper.sweep_now().await.unwrap(), 0);
        clock.advance(Duration::seconds(31));
        assert_eq!(sweeper.sweep_now().await.unwrap(), 1);
        assert!(store.lock().await.find(&draft.id).is_none());

        sweeper.stop().await.unwrap();
        assert!(!sweeper.get_status().is_running);
        assert!(sweeper.sweep_now().await.is_err());
    }

    #[tokio::test]
    async fn ticks_run_sweeps_in_the_background() {
        let (store, _api, clock) = store_with_clock();
        let store = Arc::new(Mutex::new(store));
        store.lock().await.add_note(NoteFields::default()).unwrap();

        let mut sweeper = Sweeper::new(&StoreConfig {
            sweep_interval_ms: 10,
            ..StoreConfig::default()
        });
        sweeper.start(&store).unwrap();

        clock.advance(Duration::seconds(30));
        time::sleep(std::time::Duration::from_millis(100)).await;

        assert!(store.lock().await.notes().is_empty());
        sweeper.stop().await.unwrap();
    }
}
