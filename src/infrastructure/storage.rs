use crate::config::AppConfig;
use crate::services::storage::LocalStorage;
use std::sync::Arc;
use tracing::info;

pub async fn setup_storage(config: &AppConfig) -> anyhow::Result<Arc<LocalStorage>> {
    info!("🗄️  Media storage: {}", config.media_root);

    tokio::fs::create_dir_all(&config.media_root).await?;

    Ok(Arc::new(LocalStorage::new(&config.media_root)))
}
