use colored::Colorize;

pub fn handle_error(err: anyhow::Error) -> ! {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    let msg = format!("{err:#}").to_lowercase();

    if msg.contains("failed to read") && msg.contains(".yaml") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Point chack at your config file with:");
        eprintln!("  {} chack --config path/to/chack.yaml", "$".dimmed());
    }

    if msg.contains("is required in the config file") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Both system_prompt and model.primary must be set.");
    }

    if msg.contains("tools.md") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Create TOOLS.md next to the config file or drop $$TOOLS$$ from the prompt.");
    }

    if msg.contains("connection refused") || msg.contains("network") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Check your internet connection and model.base_url, then try again.");
    }

    std::process::exit(1);
}
