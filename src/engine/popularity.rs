use std::cmp::Ordering;

use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability::{record_command, VIEWS_TOTAL};

use super::{Engine, EngineError};

/// Higher rating first; an activity with no rating sorts after any rated one.
fn cmp_rating_desc(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl Engine {
    /// Record one view and refresh the activity's popularity score.
    ///
    /// The score is the number of views in the trailing window ending at `at`,
    /// so a backfilled view is scored against its own timestamp, not the clock.
    pub async fn record_view(&self, activity_id: Ulid, at: Ms) -> Result<(), EngineError> {
        let result = async {
            let _gate = self.commit_gate.read().await;
            let rs = self.get_activity_state(&activity_id)?;
            let mut guard = rs.write().await;
            let event = Event::ViewRecorded { activity_id, at };
            self.persist_and_apply(&mut guard, &event).await
        }
        .await;
        record_command("record_view", &result);
        if result.is_ok() {
            metrics::counter!(VIEWS_TOTAL).increment(1);
        }
        result
    }

    /// Views inside the trailing window ending at `at`. Read-only.
    pub async fn window_views(&self, activity_id: &Ulid, at: Ms) -> Result<u32, EngineError> {
        let rs = self.get_activity_state(activity_id)?;
        let guard = rs.read().await;
        Ok(guard.views_in_window(at, POPULARITY_WINDOW_MS))
    }

    /// Active activities, most popular first.
    ///
    /// Ties fall back to the attached rating source, then to id. Every call
    /// builds a fresh snapshot.
    ///
    /// At most `MAX_RANK_LIMIT` entries are returned, whatever `limit` asks for.
    pub async fn rank_active(&self, limit: usize) -> Vec<ActivityInfo> {
        let mut ranked: Vec<(ActivityInfo, Option<f64>)> = Vec::new();
        for rs in self.activity_handles() {
            let info = rs.read().await.info();
            if !info.is_active {
                continue;
            }
            let rating = self.ratings.as_ref().and_then(|r| r.rating(&info.id));
            ranked.push((info, rating));
        }

        ranked.sort_by(|(a, ra), (b, rb)| {
            b.popularity_score
                .cmp(&a.popularity_score)
                .then_with(|| cmp_rating_desc(*ra, *rb))
                .then_with(|| a.id.cmp(&b.id))
        });
        ranked.truncate(limit.min(MAX_RANK_LIMIT));
        ranked.into_iter().map(|(info, _)| info).collect()
    }
}
