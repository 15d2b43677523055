//! Spreadsheet datastore for databot
//!
//! Every stored entry is one row appended to a single Google Sheets range.
//! The crate exposes:
//! - **`SpreadsheetClient`** - the two datastore operations the bot needs
//! - **Google client** (`google`) - Sheets API v4 over `reqwest`
//! - **Service account auth** (`auth`) - JWT bearer exchange for access tokens
//! - **In-memory sheet** (`memory`) - append-only fake with failure injection
//!
//! There is no caching and no retry: each call is one fresh round trip, and
//! failures surface as [`SheetError`] values whose text is shown to users.

pub mod auth;
pub mod google;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub use google::GoogleSheetsClient;
pub use memory::InMemorySpreadsheet;

/// A sheet row, cells in column order.
pub type Row = Vec<String>;

/// Failure of a datastore round trip. The message is the provider's or
/// transport's own description and is surfaced verbatim.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SheetError {
    #[error("{0}")]
    RemoteWrite(String),
    #[error("{0}")]
    RemoteRead(String),
}

#[async_trait]
pub trait SpreadsheetClient: Send + Sync {
    /// Appends one row and returns the number of rows the datastore reports
    /// as inserted.
    async fn append_row(&self, fields: Row) -> Result<u64, SheetError>;

    /// Returns the last `n` rows of the range in stored order.
    async fn read_last_n(&self, n: usize) -> Result<Vec<Row>, SheetError>;
}

#[async_trait]
impl<T> SpreadsheetClient for Arc<T>
where
    T: SpreadsheetClient + ?Sized,
{
    async fn append_row(&self, fields: Row) -> Result<u64, SheetError> {
        (**self).append_row(fields).await
    }

    async fn read_last_n(&self, n: usize) -> Result<Vec<Row>, SheetError> {
        (**self).read_last_n(n).await
    }
}

pub(crate) fn last_n(mut rows: Vec<Row>, n: usize) -> Vec<Row> {
    let start = rows.len().saturating_sub(n);
    rows.split_off(start)
}
