//! Chat management commands (/reset, /help).

/// Reply sent after a conversation is reset.
pub const RESET_REPLY: &str = "Conversation reset.";

pub const HELP_TEXT: &str = "Send a message and I'll work on it with my tools.\n\n\
Commands:\n\
/reset - Save what I've learned and start a fresh conversation\n\
/help - Show this help";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Reset,
    Help,
}

/// Parse a management command. `/reset@bot_name` is accepted; anything else
/// (including unknown slash commands) is treated as chat text.
pub fn parse_command(text: &str) -> Option<Command> {
    let first = text.split_whitespace().next()?;
    let name = first.strip_prefix('/')?;
    let name = name.split('@').next().unwrap_or(name).to_lowercase();

    match name.as_str() {
        "reset" => Some(Command::Reset),
        "help" | "start" => Some(Command::Help),
        _ => None,
    }
}
