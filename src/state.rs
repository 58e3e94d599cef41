use crate::config::Config;
use crate::storage::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Store, config: Config) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }
}

#[cfg(test)]
impl AppState {
    /// State over a fresh data file in its own temp directory.
    pub async fn scratch(label: &str) -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let mut path = std::env::temp_dir();
        path.push(format!(
            "daily_tracker_state_{label}_{}_{}",
            std::process::id(),
            nanos
        ));
        path.push("tracker.json");
        let store = Store::open(&path).await.unwrap();
        let config = Config {
            data_path: path,
            ..Config::default()
        };
        Self::new(store, config)
    }
}
