use crate::config::TrackingConfig;
use crate::tracking::{FileStore, RestStore};
use crate::traits::TrackingStore;
use std::sync::Arc;

const TOKEN_ENV_VARS: &[&str] = &["MLFLOW_TRACKING_TOKEN", "MLCHAT_TRACKING_TOKEN"];

/// Picks the backend from the URI scheme: `http(s)://` talks to a tracking
/// server, anything else is read as a local `mlruns` directory.
pub fn create_store(config: &TrackingConfig) -> Arc<dyn TrackingStore> {
    let uri = config.uri.trim();

    if uri.starts_with("http://") || uri.starts_with("https://") {
        let mut store = RestStore::new(uri);
        let token = config.token.clone().or_else(|| {
            TOKEN_ENV_VARS
                .iter()
                .find_map(|var| std::env::var(var).ok())
                .filter(|t| !t.is_empty())
        });
        if let Some(token) = token {
            store = store.with_token(token);
        }
        Arc::new(store)
    } else {
        Arc::new(FileStore::new(uri))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(uri: &str) -> TrackingConfig {
        TrackingConfig {
            uri: uri.to_string(),
            token: None,
        }
    }

    #[test]
    fn factory_picks_backend_by_scheme() {
        assert_eq!(create_store(&config("data/mlruns")).name(), "file");
        assert_eq!(create_store(&config("file:///srv/mlruns")).name(), "file");

        let rest = create_store(&config("http://localhost:5000/"));
        assert_eq!(rest.name(), "rest");
        assert_eq!(rest.location(), "http://localhost:5000");
    }
}
