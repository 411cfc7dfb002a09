//! Engine state and initialization
//!
//! All services are assembled here. The reminder scheduler starts before
//! the store has finished opening; its immediate first tick runs against
//! the unready store and defers, which is the intended startup sequence.

use crate::config::DB_FILE_NAME;
use crate::database::Store;
use crate::error::Result;
use crate::notify::{NotificationPermission, Notifier};
use crate::services::{ProblemService, ReminderScheduler, TransferService};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Central engine state holding all services
pub struct Engine {
    pub problems: ProblemService,
    pub transfer: TransferService,
    store: Store,
    scheduler: JoinHandle<()>,
}

impl Engine {
    /// Start the engine: create the data directory, query notification
    /// permission (once, without blocking startup), start the reminder
    /// scheduler, then open the store.
    pub async fn start(data_dir: PathBuf, notifier: Arc<dyn Notifier>) -> Result<Engine> {
        tracing::info!("Initializing engine");
        tracing::info!("Data directory: {:?}", data_dir);

        std::fs::create_dir_all(&data_dir)?;

        let store = Store::new();
        let problems = ProblemService::new(store.clone());
        let transfer = TransferService::new(store.clone());

        match notifier.permission() {
            NotificationPermission::Granted => {
                tracing::info!("Notification permission granted");
            }
            NotificationPermission::Denied => {
                tracing::warn!(
                    "Notification permission denied; reminders will be consumed without delivery"
                );
            }
            NotificationPermission::Unsupported => {
                tracing::warn!("No notification facility available");
            }
        }

        let scheduler = ReminderScheduler::new(problems.clone(), notifier).start();

        store.open(&data_dir.join(DB_FILE_NAME)).await?;

        tracing::info!("Engine initialized successfully");
        Ok(Engine {
            problems,
            transfer,
            store,
            scheduler,
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Stop the background scan. In-flight session persists are owned by
    /// their callers and complete on their own.
    pub fn shutdown(self) {
        self.scheduler.abort();
        tracing::info!("Engine shutdown");
    }
}
