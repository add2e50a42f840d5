use std::path::PathBuf;

use chack_core::channel::ChannelType;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chack")]
#[command(version, about = "chack - multi-platform chat gateway for a tool-using agent")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file (defaults to ./config/chack.yaml)
    #[arg(long, short, global = true, env = "CHACK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the gateway (the default)
    Run,

    /// Validate the config file and print a short overview
    Check,

    /// Long-term memory records
    Memory {
        #[command(subcommand)]
        command: MemoryCommands,
    },
}

#[derive(Subcommand)]
pub enum MemoryCommands {
    /// Print the stored record for one chat
    Show {
        /// Platform: telegram, discord or console
        channel: ChannelType,
        chat_id: String,
    },
}
