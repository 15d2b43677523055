pub mod clock;
pub mod config;
pub mod entry;

pub use clock::{Clock, FixedClock, SystemClock, TimestampZone};
pub use config::{AppConfig, SheetsConfig};
pub use entry::Entry;
