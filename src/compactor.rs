use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::engine::Engine;

const CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Background task that compacts the WAL once `threshold` appends have
/// accumulated since the last compaction.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(CHECK_INTERVAL);
    loop {
        interval.tick().await;
        compact_if_due(&engine, threshold).await;
    }
}

/// One compactor pass. Returns true if a compaction ran and succeeded.
pub async fn compact_if_due(engine: &Engine, threshold: u64) -> bool {
    let appends = engine.wal_appends_since_compact().await;
    if appends < threshold.max(1) {
        debug!("compactor: {appends} appends since last compaction, below {threshold}");
        return false;
    }
    match engine.compact_wal().await {
        Ok(()) => true,
        Err(e) => {
            warn!("compactor: compaction failed: {e}");
            false
        }
    }
}
