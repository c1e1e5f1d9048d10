//! Periodic maintenance of the phrase store on the tokio blocking pool

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::PhraseStore;
use crate::config::MaintenanceConfig;

/// Handle to the background maintenance task
pub struct MaintenanceWorker {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MaintenanceWorker {
    /// Run [`PhraseStore::maintain`] every `settings.interval_secs` seconds.
    pub fn spawn(store: Arc<PhraseStore>, settings: MaintenanceConfig) -> Self {
        let interval = Duration::from_secs(settings.interval_secs.max(1));
        Self::spawn_with_interval(store, settings, interval)
    }

    pub fn spawn_with_interval(
        store: Arc<PhraseStore>,
        settings: MaintenanceConfig,
        interval: Duration,
    ) -> Self {
        let (shutdown, mut stop) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // the first tick fires immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let store = store.clone();
                        let settings = settings.clone();
                        let result = tokio::task::spawn_blocking(move || store.maintain(&settings)).await;
                        match result {
                            Ok(Ok(report)) => log::debug!("Maintenance pass finished: {:?}", report),
                            Ok(Err(e)) => log::warn!("Maintenance pass failed: {}", e),
                            Err(e) => log::error!("Maintenance task panicked: {}", e),
                        }
                    }
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }
            log::info!("Phrase maintenance worker stopped");
        });

        Self { shutdown, task }
    }

    /// Stop the worker, waiting for a running pass to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            log::warn!("Maintenance worker ended abnormally: {}", e);
        }
    }
}
