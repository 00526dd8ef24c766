mod compaction;
mod error;
mod occupancy;
mod popularity;
mod registry;

pub use error::EngineError;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tracing::info;
use ulid::Ulid;

use crate::config::EngineConfig;
use crate::limits::*;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::ratings::RatingSource;
use crate::wal::Wal;

pub type SharedActivityState = Arc<RwLock<ActivityState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders.
///
/// A non-append command drained during the batch window ends the batch and is
/// handled on the next turn of the loop.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    let mut deferred = None;
    loop {
        let cmd = match deferred.take() {
            Some(cmd) => cmd,
            None => match rx.recv().await {
                Some(cmd) => cmd,
                None => break,
            },
        };
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                while let Ok(next) = rx.try_recv() {
                    match next {
                        WalCommand::Append { event, response } => batch.push((event, response)),
                        other => {
                            deferred = Some(other);
                            break;
                        }
                    }
                }
                commit_batch(&mut wal, &mut batch);
            }
            WalCommand::Compact { events, response } => {
                let result = Wal::write_compact_file(wal.path(), &events)
                    .and_then(|()| wal.swap_compact_file());
                let _ = response.send(result);
            }
            WalCommand::AppendsSinceCompact { response } => {
                let _ = response.send(wal.appends_since_compact());
            }
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    if let Err(e) = &result {
        tracing::error!("WAL flush failed for batch of {}: {e}", batch.len());
    }
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let append_result = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event));
    // Flush even after an append error so a half-written batch does not leak
    // into the next one.
    let flush_result = wal.flush_sync();
    append_result.and(flush_result)
}

/// Occupancy and popularity engine.
///
/// Activities live behind per-activity locks; every command that touches an
/// activity's derived fields holds that activity's write lock from validation
/// through WAL commit to in-memory apply. Different activities never contend.
pub struct Engine {
    pub(super) activities: DashMap<Ulid, SharedActivityState>,
    /// Reverse lookup: check-in id → activity id.
    pub(super) checkin_index: DashMap<Ulid, Ulid>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
    pub(super) ratings: Option<Arc<dyn RatingSource>>,
    /// Commands hold this shared; compaction holds it exclusively.
    pub(super) commit_gate: RwLock<()>,
    /// Serializes registrations so duplicate ids cannot both reach the WAL.
    pub(super) registration: Mutex<()>,
}

/// Apply a non-registration event to its activity. Caller holds the write lock.
///
/// This is the only place derived fields change, both live and on replay.
fn apply_to_activity(state: &mut ActivityState, event: &Event, checkin_index: &DashMap<Ulid, Ulid>) {
    match event {
        Event::ActivityUpdated { title, capacity, is_active, .. } => {
            state.title = title.clone();
            state.capacity = *capacity;
            state.is_active = *is_active;
        }
        Event::CheckedIn { id, activity_id, party_size, at } => {
            state.checkins.insert(
                *id,
                Checkin {
                    id: *id,
                    party_size: *party_size,
                    opened_at: *at,
                    status: CheckinStatus::Active,
                    closed_at: None,
                },
            );
            state.adjust_occupancy(i64::from(*party_size), *at);
            checkin_index.insert(*id, *activity_id);
        }
        Event::CheckedOut { id, at, .. } => {
            let Some(checkin) = state.checkins.get_mut(id) else {
                return;
            };
            if !checkin.is_active() {
                return;
            }
            checkin.status = CheckinStatus::Completed;
            checkin.closed_at = Some(*at);
            let party_size = checkin.party_size;
            state.adjust_occupancy(-i64::from(party_size), *at);
        }
        Event::ViewRecorded { at, .. } => {
            state.insert_view(*at);
            let score = state.views_in_window(*at, POPULARITY_WINDOW_MS);
            state.set_popularity(score);
        }
        Event::CheckinRestored { activity_id, checkin } => {
            state.checkins.insert(checkin.id, checkin.clone());
            checkin_index.insert(checkin.id, *activity_id);
        }
        Event::ViewsRestored { observed_at, .. } => {
            state.views.extend_from_slice(observed_at);
            state.views.sort_unstable();
        }
        Event::ActivityRestored {
            current_occupancy,
            popularity_score,
            last_capacity_update,
            ..
        } => {
            state.restore_derived(*current_occupancy, *popularity_score, *last_capacity_update);
        }
        // Creation happens at the map level, not here.
        Event::ActivityRegistered { .. } => {}
    }
}

fn new_activity_state(event: &Event) -> Option<ActivityState> {
    match event {
        Event::ActivityRegistered { id, title, capacity, is_active }
        | Event::ActivityRestored { id, title, capacity, is_active, .. } => {
            Some(ActivityState::new(*id, title.clone(), *capacity, *is_active))
        }
        _ => None,
    }
}

impl Engine {
    pub fn new(wal_path: PathBuf, notify: Arc<NotifyHub>) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            activities: DashMap::new(),
            checkin_index: DashMap::new(),
            wal_tx,
            notify,
            ratings: None,
            commit_gate: RwLock::new(()),
            registration: Mutex::new(()),
        };

        // We are the sole owner of every lock here, so try_write always
        // succeeds. Never block: this may run inside an async context.
        for event in &events {
            let activity_id = event.activity_id();
            if let Some(state) = new_activity_state(event) {
                engine.activities.insert(activity_id, Arc::new(RwLock::new(state)));
            }
            let Some(entry) = engine.activities.get(&activity_id) else {
                tracing::warn!("replay: event for unknown activity {activity_id}, skipped");
                continue;
            };
            let state = entry.value().clone();
            drop(entry);
            let mut guard = state.try_write().map_err(io::Error::other)?;
            apply_to_activity(&mut guard, event, &engine.checkin_index);
        }

        metrics::gauge!(crate::observability::ACTIVITIES_REGISTERED)
            .set(engine.activities.len() as f64);
        info!(
            "replayed {} events from {}: {} activities, {} check-ins",
            events.len(),
            wal_path.display(),
            engine.activities.len(),
            engine.checkin_index.len()
        );
        Ok(engine)
    }

    /// Open the engine in `config.data_dir`, creating the directory if needed.
    pub fn open(config: &EngineConfig) -> io::Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        Self::new(config.wal_path(), Arc::new(NotifyHub::new()))
    }

    /// Attach the review collaborator used to break popularity ties.
    pub fn with_ratings(mut self, ratings: Arc<dyn RatingSource>) -> Self {
        self.ratings = Some(ratings);
        self
    }

    pub fn subscribe(&self, activity_id: Ulid) -> tokio::sync::broadcast::Receiver<Event> {
        self.notify.subscribe(activity_id)
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub(super) fn get_activity_state(&self, id: &Ulid) -> Result<SharedActivityState, EngineError> {
        self.activities
            .get(id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::UnknownActivity(*id))
    }

    /// WAL-append + apply + notify. Nothing is applied if the append fails.
    pub(super) async fn persist_and_apply(
        &self,
        state: &mut ActivityState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_activity(state, event, &self.checkin_index);
        self.notify.send(state.id, event);
        Ok(())
    }

    /// Insert a freshly registered activity after its event is durable.
    pub(super) async fn persist_registration(&self, event: &Event) -> Result<(), EngineError> {
        let Some(state) = new_activity_state(event) else {
            return Ok(());
        };
        self.wal_append(event).await?;
        let id = state.id;
        self.activities.insert(id, Arc::new(RwLock::new(state)));
        self.notify.send(id, event);
        metrics::gauge!(crate::observability::ACTIVITIES_REGISTERED)
            .set(self.activities.len() as f64);
        Ok(())
    }
}
