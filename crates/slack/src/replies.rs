//! Reply text posted back to Slack. Uses Slack mrkdwn for bold and code.

use databot_core::Entry;
use databot_sheets::SheetError;

macro_rules! command_list {
    () => {
        "• `/store [data]` - Store data in Google Sheets\n\
         • `/retrieve` - Get last 5 entries from sheets\n\
         • `/databot-help` - Show this help message"
    };
}

pub const HELP_TEXT: &str = concat!("*Available Commands:*\n", command_list!());

pub const GREETING_TEXT: &str = concat!(
    "Hello! 👋 I'm databot. I store your data in Google Sheets. Available commands:\n",
    command_list!()
);

pub const CHAT_HELP_TEXT: &str = concat!(
    "I'm databot. Here are the available commands:\n",
    command_list!(),
    "\n\nYou can also chat with me directly for help!"
);

pub const FALLBACK_TEXT: &str =
    "I'm databot. I store your data in Google Sheets. Try saying 'hello' or 'help' to see what I can do.";

const LISTING_HEADER: &str = "*Last 5 entries:*\n";

pub fn store_succeeded(updated_rows: u64) -> String {
    format!("Data stored successfully! Entry added to row {updated_rows}")
}

pub fn store_failed(error: &SheetError) -> String {
    format!("Error storing data: {error}")
}

pub fn retrieve_failed(error: &SheetError) -> String {
    format!("Error retrieving data: {error}")
}

pub fn entry_listing(entries: &[Entry]) -> String {
    entries.iter().fold(LISTING_HEADER.to_owned(), |mut listing, entry| {
        listing.push_str(&format!(
            "• {} - User: {} - Data: {}\n",
            entry.timestamp, entry.sender_id, entry.payload
        ));
        listing
    })
}

pub fn unsupported_command(command: &str) -> String {
    format!("Unsupported command `{command}`. Try `/databot-help`.")
}
