use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability::{record_command, CHECKINS_TOTAL, CHECKOUTS_TOTAL};

use super::{Engine, EngineError};

impl Engine {
    /// Open a check-in for a party and add it to the activity's occupancy.
    ///
    /// The new check-in record and the occupancy increment commit together
    /// under the activity's write lock.
    pub async fn check_in(
        &self,
        activity_id: Ulid,
        party_size: u32,
        at: Ms,
    ) -> Result<Ulid, EngineError> {
        let result = async {
            if party_size == 0 {
                return Err(EngineError::InvalidPartySize(party_size));
            }
            if party_size > MAX_PARTY_SIZE {
                return Err(EngineError::LimitExceeded("party size too large"));
            }

            let _gate = self.commit_gate.read().await;
            let rs = self.get_activity_state(&activity_id)?;
            let mut guard = rs.write().await;

            let id = Ulid::new();
            let event = Event::CheckedIn { id, activity_id, party_size, at };
            self.persist_and_apply(&mut guard, &event).await?;
            tracing::debug!(
                "check-in {id} at {activity_id}: +{party_size}, occupancy {}",
                guard.current_occupancy()
            );
            Ok(id)
        }
        .await;
        record_command("check_in", &result);
        if result.is_ok() {
            metrics::counter!(CHECKINS_TOTAL).increment(1);
        }
        result
    }

    /// Close an active check-in and release its party from occupancy.
    ///
    /// A second check-out of the same id is a caller error (`AlreadyClosed`)
    /// and changes nothing.
    pub async fn check_out(&self, checkin_id: Ulid, at: Ms) -> Result<(), EngineError> {
        let result = async {
            let _gate = self.commit_gate.read().await;
            let activity_id = self
                .checkin_index
                .get(&checkin_id)
                .map(|e| *e.value())
                .ok_or(EngineError::NotFound(checkin_id))?;
            let rs = self.get_activity_state(&activity_id)?;
            let mut guard = rs.write().await;

            let checkin = guard
                .checkins
                .get(&checkin_id)
                .ok_or(EngineError::NotFound(checkin_id))?;
            if !checkin.is_active() {
                return Err(EngineError::AlreadyClosed(checkin_id));
            }

            let event = Event::CheckedOut { id: checkin_id, activity_id, at };
            self.persist_and_apply(&mut guard, &event).await?;
            tracing::debug!(
                "check-out {checkin_id} at {activity_id}: occupancy {}",
                guard.current_occupancy()
            );
            Ok(())
        }
        .await;
        record_command("check_out", &result);
        if result.is_ok() {
            metrics::counter!(CHECKOUTS_TOTAL).increment(1);
        }
        result
    }

    pub async fn get_checkin(&self, checkin_id: &Ulid) -> Result<CheckinInfo, EngineError> {
        let activity_id = self
            .checkin_index
            .get(checkin_id)
            .map(|e| *e.value())
            .ok_or(EngineError::NotFound(*checkin_id))?;
        let rs = self.get_activity_state(&activity_id)?;
        let guard = rs.read().await;
        guard
            .checkins
            .get(checkin_id)
            .map(|c| CheckinInfo::from_checkin(activity_id, c))
            .ok_or(EngineError::NotFound(*checkin_id))
    }

    /// Open check-ins at an activity, oldest first.
    pub async fn active_checkins(&self, activity_id: &Ulid) -> Result<Vec<CheckinInfo>, EngineError> {
        let rs = self.get_activity_state(activity_id)?;
        let guard = rs.read().await;
        let mut out: Vec<CheckinInfo> = guard
            .checkins
            .values()
            .filter(|c| c.is_active())
            .map(|c| CheckinInfo::from_checkin(*activity_id, c))
            .collect();
        out.sort_by_key(|c| (c.opened_at, c.id));
        Ok(out)
    }
}
