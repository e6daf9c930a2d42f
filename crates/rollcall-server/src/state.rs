//! Application state shared across handlers.

use std::sync::Arc;

use jsonwebtoken::DecodingKey;
use rollcall_core::{
    AttendanceStats, AttendanceValidator, Config, Directory, GeoValidator, MemoryStore,
    QrSessionRegistry, SessionWindow, SharedStore,
};
use tracing::info;

/// `database.url` value that selects the in-memory store.
pub const MEMORY_DATABASE: &str = "memory";

/// Shared handle to [`AppState`].
pub type SharedState = Arc<AppState>;

/// Components built once from configuration and shared by every request.
pub struct AppState {
    /// Loaded configuration.
    pub config: Config,
    /// Record store.
    pub store: SharedStore,
    /// Scan pipeline.
    pub validator: AttendanceValidator,
    /// Session code registry.
    pub registry: QrSessionRegistry,
    /// Registration and enrollment.
    pub directory: Directory,
    /// Attendance reports.
    pub stats: AttendanceStats,
    decoding_key: DecodingKey,
}

impl AppState {
    /// Wire every component to `store`.
    #[must_use]
    pub fn new(config: Config, store: SharedStore) -> Self {
        let attendance = &config.attendance;
        let window = SessionWindow::from_config(attendance);

        Self {
            validator: AttendanceValidator::new(
                store.clone(),
                window,
                GeoValidator::from_config(attendance),
            ),
            registry: QrSessionRegistry::new(store.clone(), attendance, &config.qr),
            directory: Directory::new(store.clone()),
            stats: AttendanceStats::new(store.clone(), attendance.tz()),
            decoding_key: DecodingKey::from_secret(config.auth.jwt_secret.as_bytes()),
            store,
            config,
        }
    }

    /// Open the store named by `database.url` and build the state.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        let store = open_store(&config.database.url).await?;
        Ok(Self::new(config, store))
    }

    /// Key used to verify bearer tokens.
    #[must_use]
    pub const fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

async fn open_store(url: &str) -> anyhow::Result<SharedStore> {
    if url == MEMORY_DATABASE {
        info!("Using in-memory store; data is lost on exit");
        return Ok(Arc::new(MemoryStore::new()));
    }

    #[cfg(feature = "sqlite")]
    {
        let store = rollcall_core::SqlStore::connect(url).await?;
        Ok(Arc::new(store))
    }

    #[cfg(not(feature = "sqlite"))]
    {
        anyhow::bail!("database url '{url}' requires the `sqlite` feature")
    }
}
