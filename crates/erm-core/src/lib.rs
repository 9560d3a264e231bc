pub mod clock;
pub mod config;
pub mod error;
pub mod store;
pub mod totals;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::AppConfig;
pub use error::{ErmError, Result};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
pub use totals::{PlatformTotals, StatsProducer, StoreStatsProducer};
pub use types::{ActivityAction, ActivityKind, ActivityRecord};
