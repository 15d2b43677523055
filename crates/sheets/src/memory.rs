use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{last_n, Row, SheetError, SpreadsheetClient};

/// Append-only in-process sheet.
#[derive(Default)]
pub struct InMemorySpreadsheet {
    state: Mutex<SheetState>,
}

#[derive(Default)]
struct SheetState {
    rows: Vec<Row>,
    write_failure: Option<String>,
    read_failure: Option<String>,
    append_calls: usize,
    read_calls: usize,
}

impl InMemorySpreadsheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<Row>) -> Self {
        Self { state: Mutex::new(SheetState { rows, ..SheetState::default() }) }
    }

    /// Makes every following append fail with `message`.
    pub async fn fail_writes(&self, message: impl Into<String>) {
        self.state.lock().await.write_failure = Some(message.into());
    }

    /// Makes every following read fail with `message`.
    pub async fn fail_reads(&self, message: impl Into<String>) {
        self.state.lock().await.read_failure = Some(message.into());
    }

    pub async fn rows(&self) -> Vec<Row> {
        self.state.lock().await.rows.clone()
    }

    pub async fn append_calls(&self) -> usize {
        self.state.lock().await.append_calls
    }

    pub async fn read_calls(&self) -> usize {
        self.state.lock().await.read_calls
    }
}

#[async_trait]
impl SpreadsheetClient for InMemorySpreadsheet {
    async fn append_row(&self, fields: Row) -> Result<u64, SheetError> {
        let mut state = self.state.lock().await;
        state.append_calls += 1;
        if let Some(message) = &state.write_failure {
            return Err(SheetError::RemoteWrite(message.clone()));
        }

        state.rows.push(fields);
        Ok(1)
    }

    async fn read_last_n(&self, n: usize) -> Result<Vec<Row>, SheetError> {
        let mut state = self.state.lock().await;
        state.read_calls += 1;
        if let Some(message) = &state.read_failure {
            return Err(SheetError::RemoteRead(message.clone()));
        }

        Ok(last_n(state.rows.clone(), n))
    }
}
