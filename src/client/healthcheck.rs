use anyhow::anyhow;

use crate::views;

pub async fn healthcheck_cmd(storage_config: storage::Config) -> anyhow::Result<()> {
    let storage = storage::Client::try_initialize(storage_config).await?;

    views::check_health(&storage)
        .await
        .map_err(|e| anyhow!("healthcheck failed: {e}"))?;

    tracing::info!(backend = storage.backend(), "✅ Healthcheck passed");
    Ok(())
}
