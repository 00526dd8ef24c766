pub mod compactor;
pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod ratings;
pub mod wal;

pub use engine::{Engine, EngineError};
pub use model::{ActivityInfo, CapacityStatus, CheckinInfo, CheckinStatus, Ms};
