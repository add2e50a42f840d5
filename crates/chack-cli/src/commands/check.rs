use anyhow::Result;
use chack_core::channel::ChannelType;
use chack_core::config::ChackConfig;
use chack_core::pricing::{PricingTable, resolve_pricing_path};
use colored::Colorize;

pub fn run(config: &ChackConfig) -> Result<()> {
    println!("{} {}", "Model:".bold(), config.model.primary);
    println!("{} {}", "Summary model:".bold(), config.summary_model());

    for channel in [ChannelType::Telegram, ChannelType::Discord, ChannelType::Console] {
        let status = if config.is_enabled(channel) {
            "enabled".green()
        } else {
            "disabled".dimmed()
        };
        let settings = config.session_settings(channel);
        println!(
            "{:<9} {}  max_turns={} window={} reset={}m long_term={}",
            channel.display_name(),
            status,
            settings.max_turns,
            settings.window.max_messages,
            settings.reset_minutes,
            settings
                .long_term
                .as_ref()
                .map(|lt| lt.store.base_dir().display().to_string())
                .unwrap_or_else(|| "off".to_string()),
        );
    }

    let pricing_path = resolve_pricing_path(config.pricing_path.as_deref());
    match PricingTable::load(&pricing_path) {
        Ok(table) => println!(
            "{} {} ({} models)",
            "Pricing:".bold(),
            pricing_path.display(),
            table.len()
        ),
        Err(e) => println!("{} {}", "Pricing:".bold(), format!("{e:#}").yellow()),
    }

    config.warn_open_access();
    Ok(())
}
