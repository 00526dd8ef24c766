use crate::model::Ms;

pub const DAY_MS: Ms = 86_400_000;

/// Trailing window over which views count toward the popularity score.
pub const POPULARITY_WINDOW_MS: Ms = 7 * DAY_MS;

pub const MAX_ACTIVITIES: usize = 1_000_000;
pub const MAX_TITLE_LEN: usize = 512;
pub const MAX_PARTY_SIZE: u32 = 10_000;
pub const MAX_RANK_LIMIT: usize = 1_000;

/// Largest WAL record payload. A longer length prefix is treated as a torn tail.
pub const MAX_RECORD_LEN: usize = 1 << 20;

/// Views per `ViewsRestored` record, keeping snapshot records under `MAX_RECORD_LEN`.
pub const VIEWS_PER_SNAPSHOT_RECORD: usize = 65_536;
