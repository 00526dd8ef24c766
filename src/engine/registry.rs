use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability::record_command;

use super::{Engine, EngineError};

fn validate_title(title: &str) -> Result<(), EngineError> {
    if title.len() > MAX_TITLE_LEN {
        return Err(EngineError::LimitExceeded("activity title too long"));
    }
    Ok(())
}

impl Engine {
    /// Seed an activity. Derived fields start at zero.
    pub async fn register_activity(
        &self,
        id: Ulid,
        title: String,
        capacity: Option<u32>,
        is_active: bool,
    ) -> Result<(), EngineError> {
        let result = async {
            validate_title(&title)?;
            let _gate = self.commit_gate.read().await;
            let _registration = self.registration.lock().await;
            if self.activities.len() >= MAX_ACTIVITIES {
                return Err(EngineError::LimitExceeded("too many activities"));
            }
            if self.activities.contains_key(&id) {
                return Err(EngineError::AlreadyExists(id));
            }
            let event = Event::ActivityRegistered { id, title, capacity, is_active };
            self.persist_registration(&event).await
        }
        .await;
        record_command("register_activity", &result);
        result
    }

    /// Replace an activity's static attributes. Occupancy and popularity are kept.
    pub async fn update_activity(
        &self,
        id: Ulid,
        title: String,
        capacity: Option<u32>,
        is_active: bool,
    ) -> Result<(), EngineError> {
        let result = async {
            validate_title(&title)?;
            let _gate = self.commit_gate.read().await;
            let rs = self.get_activity_state(&id)?;
            let mut guard = rs.write().await;
            let event = Event::ActivityUpdated { id, title, capacity, is_active };
            self.persist_and_apply(&mut guard, &event).await
        }
        .await;
        record_command("update_activity", &result);
        result
    }

    pub async fn get(&self, id: &Ulid) -> Result<ActivityInfo, EngineError> {
        let rs = self.get_activity_state(id)?;
        let guard = rs.read().await;
        Ok(guard.info())
    }

    /// Busyness bucket computed from the current occupancy, never cached.
    pub async fn capacity_status(&self, id: &Ulid) -> Result<CapacityStatus, EngineError> {
        let rs = self.get_activity_state(id)?;
        let guard = rs.read().await;
        Ok(guard.capacity_status())
    }

    /// Every activity, ordered by id.
    pub async fn list_activities(&self) -> Vec<ActivityInfo> {
        let mut out = Vec::with_capacity(self.activities.len());
        for rs in self.activity_handles() {
            out.push(rs.read().await.info());
        }
        out.sort_by_key(|a| a.id);
        out
    }

    pub fn activity_count(&self) -> usize {
        self.activities.len()
    }

    /// Clone the lock handles out of the map so no shard guard is held across an await.
    pub(super) fn activity_handles(&self) -> Vec<super::SharedActivityState> {
        self.activities.iter().map(|e| e.value().clone()).collect()
    }
}
