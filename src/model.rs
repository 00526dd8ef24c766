use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds, the only time type.
pub type Ms = i64;

/// Lifecycle of a single check-in. `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckinStatus {
    Active,
    Completed,
}

/// A party currently (or formerly) present at an activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkin {
    pub id: Ulid,
    pub party_size: u32,
    pub opened_at: Ms,
    pub status: CheckinStatus,
    pub closed_at: Option<Ms>,
}

impl Checkin {
    pub fn is_active(&self) -> bool {
        self.status == CheckinStatus::Active
    }
}

/// Qualitative busyness bucket derived from occupancy ÷ capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapacityStatus {
    VeryBusy,
    Busy,
    Moderate,
    Available,
    Unknown,
}

impl CapacityStatus {
    /// Classify without floating point: `occ / cap >= n / 10` is `occ * 10 >= cap * n`.
    /// Each threshold is inclusive toward the busier bucket.
    pub fn classify(occupancy: u32, capacity: Option<u32>) -> Self {
        let Some(cap) = capacity else {
            return CapacityStatus::Unknown;
        };
        let occ = u64::from(occupancy) * 10;
        let cap = u64::from(cap);
        if occ >= cap * 9 {
            CapacityStatus::VeryBusy
        } else if occ >= cap * 7 {
            CapacityStatus::Busy
        } else if occ >= cap * 4 {
            CapacityStatus::Moderate
        } else {
            CapacityStatus::Available
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CapacityStatus::VeryBusy => "very_busy",
            CapacityStatus::Busy => "busy",
            CapacityStatus::Moderate => "moderate",
            CapacityStatus::Available => "available",
            CapacityStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for CapacityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ActivityState {
    pub id: Ulid,
    pub title: String,
    pub capacity: Option<u32>,
    pub is_active: bool,
    current_occupancy: u32,
    popularity_score: u32,
    last_capacity_update: Option<Ms>,
    /// Check-ins by id, open and closed.
    pub checkins: HashMap<Ulid, Checkin>,
    /// View timestamps, sorted ascending. Doubles as the (activity, observed_at) index.
    pub views: Vec<Ms>,
}

impl ActivityState {
    pub fn new(id: Ulid, title: String, capacity: Option<u32>, is_active: bool) -> Self {
        Self {
            id,
            title,
            capacity,
            is_active,
            current_occupancy: 0,
            popularity_score: 0,
            last_capacity_update: None,
            checkins: HashMap::new(),
            views: Vec::new(),
        }
    }

    pub fn current_occupancy(&self) -> u32 {
        self.current_occupancy
    }

    pub fn popularity_score(&self) -> u32 {
        self.popularity_score
    }

    pub fn last_capacity_update(&self) -> Option<Ms> {
        self.last_capacity_update
    }

    /// Apply an occupancy delta, clamping at zero. Returns the new occupancy.
    pub(crate) fn adjust_occupancy(&mut self, delta: i64, at: Ms) -> u32 {
        let next = (i64::from(self.current_occupancy) + delta).clamp(0, i64::from(u32::MAX));
        self.current_occupancy = next as u32;
        self.last_capacity_update = Some(at);
        self.current_occupancy
    }

    pub(crate) fn set_popularity(&mut self, score: u32) {
        self.popularity_score = score;
    }

    /// Overwrite all derived fields at once. Only used when replaying a compacted snapshot.
    pub(crate) fn restore_derived(&mut self, occupancy: u32, popularity: u32, last_update: Option<Ms>) {
        self.current_occupancy = occupancy;
        self.popularity_score = popularity;
        self.last_capacity_update = last_update;
    }

    pub fn capacity_status(&self) -> CapacityStatus {
        CapacityStatus::classify(self.current_occupancy, self.capacity)
    }

    /// Insert a view keeping the index sorted. Equal timestamps go after existing ones.
    pub fn insert_view(&mut self, at: Ms) {
        let pos = self.views.partition_point(|&t| t <= at);
        self.views.insert(pos, at);
    }

    /// Number of views with `observed_at > now - window`.
    pub fn views_in_window(&self, now: Ms, window: Ms) -> u32 {
        let cutoff = now.saturating_sub(window);
        let first = self.views.partition_point(|&t| t <= cutoff);
        (self.views.len() - first) as u32
    }

    pub fn info(&self) -> ActivityInfo {
        ActivityInfo {
            id: self.id,
            title: self.title.clone(),
            capacity: self.capacity,
            current_occupancy: self.current_occupancy,
            popularity_score: self.popularity_score,
            is_active: self.is_active,
            last_capacity_update: self.last_capacity_update,
        }
    }
}

/// The event types: flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ActivityRegistered {
        id: Ulid,
        title: String,
        capacity: Option<u32>,
        is_active: bool,
    },
    ActivityUpdated {
        id: Ulid,
        title: String,
        capacity: Option<u32>,
        is_active: bool,
    },
    CheckedIn {
        id: Ulid,
        activity_id: Ulid,
        party_size: u32,
        at: Ms,
    },
    CheckedOut {
        id: Ulid,
        activity_id: Ulid,
        at: Ms,
    },
    ViewRecorded {
        activity_id: Ulid,
        at: Ms,
    },
    // Snapshot records written only by compaction. Replaying them sets state
    // directly instead of re-deriving it.
    ActivityRestored {
        id: Ulid,
        title: String,
        capacity: Option<u32>,
        is_active: bool,
        current_occupancy: u32,
        popularity_score: u32,
        last_capacity_update: Option<Ms>,
    },
    CheckinRestored {
        activity_id: Ulid,
        checkin: Checkin,
    },
    ViewsRestored {
        activity_id: Ulid,
        observed_at: Vec<Ms>,
    },
}

impl Event {
    pub fn activity_id(&self) -> Ulid {
        match self {
            Event::ActivityRegistered { id, .. }
            | Event::ActivityUpdated { id, .. }
            | Event::ActivityRestored { id, .. } => *id,
            Event::CheckedIn { activity_id, .. }
            | Event::CheckedOut { activity_id, .. }
            | Event::ViewRecorded { activity_id, .. }
            | Event::CheckinRestored { activity_id, .. }
            | Event::ViewsRestored { activity_id, .. } => *activity_id,
        }
    }
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityInfo {
    pub id: Ulid,
    pub title: String,
    pub capacity: Option<u32>,
    pub current_occupancy: u32,
    pub popularity_score: u32,
    pub is_active: bool,
    pub last_capacity_update: Option<Ms>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckinInfo {
    pub id: Ulid,
    pub activity_id: Ulid,
    pub party_size: u32,
    pub opened_at: Ms,
    pub status: CheckinStatus,
    pub closed_at: Option<Ms>,
}

impl CheckinInfo {
    pub fn from_checkin(activity_id: Ulid, c: &Checkin) -> Self {
        Self {
            id: c.id,
            activity_id,
            party_size: c.party_size,
            opened_at: c.opened_at,
            status: c.status,
            closed_at: c.closed_at,
        }
    }
}
