pub mod local;
pub mod remote;
pub mod substrate;

use crate::config::toml_config::{AppConfig, BackendKind};
use crate::domain::ports::{KeyValueSubstrate, Store};
use crate::utils::error::Result;
use crate::utils::validation::validate_required_field;
use local::LocalStore;
use remote::RemoteStore;
use std::sync::Arc;
use substrate::{FileSubstrate, MemorySubstrate};

/// 依配置建立 store；呼叫端負責把同一個 handle 交給 `Adapter`
pub async fn connect(config: &AppConfig) -> Result<Arc<dyn Store>> {
    let store: Arc<dyn Store> = match config.store.backend {
        BackendKind::Local => match &config.local.data_dir {
            Some(dir) => {
                tracing::info!("💾 local store at {}", dir);
                Arc::new(local_store(config, FileSubstrate::new(dir)).await?)
            }
            None => {
                tracing::info!("💾 in-memory local store");
                Arc::new(local_store(config, MemorySubstrate::new()).await?)
            }
        },
        BackendKind::Remote => {
            let remote = validate_required_field("remote", &config.remote)?;
            tracing::info!("🌐 remote store at {}", remote.endpoint);
            Arc::new(
                RemoteStore::new(&remote.endpoint, &remote.api_key, config.remote_timeout())?
                    .with_delete_policy(config.delete_policy()),
            )
        }
    };
    Ok(store)
}

async fn local_store<K: KeyValueSubstrate>(
    config: &AppConfig,
    substrate: K,
) -> Result<LocalStore<K>> {
    let store = LocalStore::new(substrate)
        .with_key_prefix(config.local.key_prefix.clone())
        .with_delete_policy(config.delete_policy());
    if config.local.seed_defaults {
        store.seed_defaults().await?;
    }
    Ok(store)
}
