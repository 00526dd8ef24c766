use tokio::sync::oneshot;
use tracing::info;

use crate::limits::VIEWS_PER_SNAPSHOT_RECORD;
use crate::model::*;

use super::{Engine, EngineError, WalCommand};

impl Engine {
    /// Rewrite the WAL as a snapshot of current state.
    ///
    /// Every view is carried over, so later backfills score the same as they
    /// would against the uncompacted log. Holds the commit gate exclusively,
    /// so no command commits between snapshot and swap.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _gate = self.commit_gate.write().await;

        // Stable output order makes snapshots comparable.
        let mut handles: Vec<_> = self
            .activities
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        handles.sort_by_key(|(id, _)| *id);

        let mut events = Vec::new();
        let mut views = 0usize;
        for (_, rs) in &handles {
            let guard = rs.read().await;

            events.push(Event::ActivityRestored {
                id: guard.id,
                title: guard.title.clone(),
                capacity: guard.capacity,
                is_active: guard.is_active,
                current_occupancy: guard.current_occupancy(),
                popularity_score: guard.popularity_score(),
                last_capacity_update: guard.last_capacity_update(),
            });

            let mut checkins: Vec<&Checkin> = guard.checkins.values().collect();
            checkins.sort_by_key(|c| (c.opened_at, c.id));
            for checkin in checkins {
                events.push(Event::CheckinRestored {
                    activity_id: guard.id,
                    checkin: checkin.clone(),
                });
            }

            views += guard.views.len();
            for chunk in guard.views.chunks(VIEWS_PER_SNAPSHOT_RECORD) {
                events.push(Event::ViewsRestored {
                    activity_id: guard.id,
                    observed_at: chunk.to_vec(),
                });
            }
        }

        let count = events.len();
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))?;

        metrics::counter!(crate::observability::COMPACTIONS_TOTAL).increment(1);
        info!("compacted WAL to {count} records, {views} views");
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
