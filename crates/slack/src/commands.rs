use std::sync::Arc;

use databot_core::{Clock, Entry, SystemClock, TimestampZone};
use databot_sheets::SpreadsheetClient;
use tracing::{info, warn};

use crate::{events::EventContext, replies};

pub const STORE_COMMAND: &str = "/store";
pub const RETRIEVE_COMMAND: &str = "/retrieve";
pub const HELP_COMMAND: &str = "/databot-help";

/// Number of entries `/retrieve` lists.
pub const RETRIEVE_LIMIT: usize = 5;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SlashCommandPayload {
    pub command: String,
    pub text: String,
    pub channel_id: String,
    pub user_id: String,
    pub trigger_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataCommand {
    Store { payload: String },
    Retrieve,
    Help,
    Unsupported { command: String },
}

pub fn parse_data_command(payload: &SlashCommandPayload) -> DataCommand {
    match payload.command.trim().to_ascii_lowercase().as_str() {
        STORE_COMMAND => DataCommand::Store { payload: payload.text.clone() },
        RETRIEVE_COMMAND => DataCommand::Retrieve,
        HELP_COMMAND => DataCommand::Help,
        _ => DataCommand::Unsupported { command: payload.command.clone() },
    }
}

/// Turns slash commands into one datastore round trip and a reply line.
/// Datastore failures become reply text; nothing here returns an error.
pub struct CommandRouter<S> {
    sheet: S,
    clock: Arc<dyn Clock>,
    zone: TimestampZone,
}

impl<S> CommandRouter<S>
where
    S: SpreadsheetClient,
{
    pub fn new(sheet: S, zone: TimestampZone) -> Self {
        Self { sheet, clock: Arc::new(SystemClock), zone }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn route(&self, payload: &SlashCommandPayload, ctx: &EventContext) -> String {
        match parse_data_command(payload) {
            DataCommand::Store { payload: text } => self.store(&text, &payload.user_id, ctx).await,
            DataCommand::Retrieve => self.retrieve(ctx).await,
            DataCommand::Help => self.help(),
            DataCommand::Unsupported { command } => {
                warn!(
                    event_name = "command.unsupported",
                    correlation_id = %ctx.correlation_id,
                    command = %command,
                    "received unsupported slash command"
                );
                replies::unsupported_command(&command)
            }
        }
    }

    pub async fn store(&self, text: &str, user_id: &str, ctx: &EventContext) -> String {
        let entry = Entry::record(self.clock.as_ref(), self.zone, user_id, text);
        let timestamp = entry.timestamp.clone();

        match self.sheet.append_row(entry.into_row()).await {
            Ok(updated_rows) => {
                info!(
                    event_name = "command.store.completed",
                    correlation_id = %ctx.correlation_id,
                    user_id = %user_id,
                    timestamp = %timestamp,
                    updated_rows,
                    "entry stored"
                );
                replies::store_succeeded(updated_rows)
            }
            Err(error) => {
                warn!(
                    event_name = "command.store.failed",
                    correlation_id = %ctx.correlation_id,
                    user_id = %user_id,
                    error = %error,
                    "entry could not be stored"
                );
                replies::store_failed(&error)
            }
        }
    }

    pub async fn retrieve(&self, ctx: &EventContext) -> String {
        match self.sheet.read_last_n(RETRIEVE_LIMIT).await {
            Ok(rows) => {
                info!(
                    event_name = "command.retrieve.completed",
                    correlation_id = %ctx.correlation_id,
                    rows = rows.len(),
                    "entries retrieved"
                );
                let entries = rows.iter().map(|row| Entry::from_row(row)).collect::<Vec<_>>();
                replies::entry_listing(&entries)
            }
            Err(error) => {
                warn!(
                    event_name = "command.retrieve.failed",
                    correlation_id = %ctx.correlation_id,
                    error = %error,
                    "entries could not be retrieved"
                );
                replies::retrieve_failed(&error)
            }
        }
    }

    pub fn help(&self) -> String {
        replies::HELP_TEXT.to_owned()
    }
}
