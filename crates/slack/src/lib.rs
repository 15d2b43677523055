//! Slack side of databot.
//!
//! - **Socket Mode** (`socket`): websocket session with Slack, envelope acks
//!   and reconnect backoff. No public URL needed.
//! - **Commands** (`commands`): `/store`, `/retrieve` and `/databot-help`
//!   against a [`databot_sheets::SpreadsheetClient`].
//! - **Events** (`events`): dispatch of slash commands and plain messages.
//! - **Responder** (`responder`): keyword replies to chat messages.
//! - **Web API** (`web`): `apps.connections.open` and `chat.postMessage`.
//!
//! ```text
//! Slack ⇄ SocketModeRunner → EventDispatcher → CommandRouter → Google Sheets
//!                                   ↓
//!                            ReplySink (chat.postMessage)
//! ```

pub mod commands;
pub mod events;
pub mod replies;
pub mod responder;
pub mod socket;
pub mod web;
