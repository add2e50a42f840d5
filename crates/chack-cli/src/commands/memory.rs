use anyhow::{Result, bail};
use chack_core::channel::{ChannelType, ConversationId};
use chack_core::config::ChackConfig;
use colored::Colorize;

use crate::cli::MemoryCommands;

pub fn run(config: &ChackConfig, command: MemoryCommands) -> Result<()> {
    match command {
        MemoryCommands::Show { channel, chat_id } => show(config, channel, &chat_id),
    }
}

fn show(config: &ChackConfig, channel: ChannelType, chat_id: &str) -> Result<()> {
    let settings = config.session_settings(channel);
    let Some(long_term) = settings.long_term else {
        bail!("Long-term memory is disabled for {channel}");
    };

    let id = ConversationId::new(channel, chat_id);
    let path = long_term.store.path_for(&id);
    let record = long_term.store.load(&id)?;

    println!("{} {}", "Record:".bold(), path.display());
    if record.is_empty() {
        println!("{}", "(empty)".dimmed());
    } else {
        println!("{record}");
    }
    Ok(())
}
