use std::path::PathBuf;

use serde::Serialize;
use shared::event::ChangeEventKind;

use crate::core::{Config, Result, ServerError};
use crate::db::DbService;
use crate::ledger::LedgerService;
use crate::notifier::ChangeNotifier;

/// Server state — shared handles to every service
///
/// Cheap to clone: every field is either small or Arc-backed. One instance
/// is built at startup and handed to the router as axum state.
///
/// | Field | Description |
/// |-------|-------------|
/// | config | immutable configuration |
/// | db | SQLite pool (WAL) |
/// | ledger | authoritative order ledger |
/// | notifier | change fan-out to connected devices |
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub db: DbService,
    pub ledger: LedgerService,
    pub notifier: ChangeNotifier,
}

impl ServerState {
    /// Initialize the server state
    ///
    /// Order: work directory, database (with migrations), ledger, notifier.
    pub async fn initialize(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(&config.work_dir)?;

        let db_path = config.database_path();
        let db = DbService::new(&db_path.to_string_lossy())
            .await
            .map_err(|e| ServerError::Config(format!("database init failed: {e}")))?;

        let ledger = LedgerService::new(db.pool.clone(), config.tenant_tz);
        let notifier = ChangeNotifier::new();

        Ok(Self {
            config: config.clone(),
            db,
            ledger,
            notifier,
        })
    }

    /// In-memory state for tests
    pub async fn initialize_in_memory(config: &Config) -> Result<Self> {
        let db = DbService::new_in_memory()
            .await
            .map_err(|e| ServerError::Config(format!("database init failed: {e}")))?;
        let ledger = LedgerService::new(db.pool.clone(), config.tenant_tz);
        Ok(Self {
            config: config.clone(),
            db,
            ledger,
            notifier: ChangeNotifier::new(),
        })
    }

    pub fn work_dir(&self) -> PathBuf {
        PathBuf::from(&self.config.work_dir)
    }

    /// Broadcast one committed change to every connected device
    pub fn publish<T: Serialize>(
        &self,
        tenant_id: &str,
        kind: ChangeEventKind,
        entity_id: &str,
        data: Option<&T>,
    ) {
        self.notifier.publish_resource(tenant_id, kind, entity_id, data);
    }
}
