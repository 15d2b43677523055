use crate::clock::{Clock, TimestampZone};

/// One stored record: a row of `[timestamp, sender_id, payload]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub timestamp: String,
    pub sender_id: String,
    pub payload: String,
}

impl Entry {
    pub fn record(
        clock: &dyn Clock,
        zone: TimestampZone,
        sender_id: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: zone.format(clock.now()),
            sender_id: sender_id.into(),
            payload: payload.into(),
        }
    }

    pub fn into_row(self) -> Vec<String> {
        vec![self.timestamp, self.sender_id, self.payload]
    }

    /// Builds an entry from a sheet row. The Sheets API drops trailing empty
    /// cells, so short rows yield empty fields.
    pub fn from_row(row: &[String]) -> Self {
        let cell = |index: usize| row.get(index).cloned().unwrap_or_default();
        Self { timestamp: cell(0), sender_id: cell(1), payload: cell(2) }
    }
}
