use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chack_ai::{
    LlmClient, LlmSummarizer, OpenAIClient, ReactExecutorFactory, Summarizer, ToolRegistry,
};
use chack_core::channel::{ChannelRouter, ChannelType};
use chack_core::config::ChackConfig;
use chack_core::pricing::{PricingTable, resolve_pricing_path};
use chack_core::runtime::channel::start_message_handler;
use chack_core::{ConversationOrchestrator, RetryController, SessionRegistry};
use colored::Colorize;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::console::ConsoleChannel;

/// How long in-flight turns get to finish after shutdown is requested.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

pub async fn run(config: ChackConfig) -> Result<()> {
    config.warn_open_access();

    let llm = build_client(&config, &config.model.primary)?;
    let tools = Arc::new(ToolRegistry::new());
    let tool_policy = config.tool_usage_policy().for_available_tools(tools.list().len());
    let factory = ReactExecutorFactory::new(llm, tools)
        .with_temperature(Some(config.model.temperature));

    let summary_model = config.summary_model().to_string();
    let summary_llm = build_client(&config, &summary_model)?;
    let summarizer: Arc<dyn Summarizer> = Arc::new(
        LlmSummarizer::new(summary_llm).with_temperature(Some(config.summary_temperature())),
    );

    let shutdown = CancellationToken::new();
    let mut router = ChannelRouter::new();
    let mut registry = SessionRegistry::new(Arc::new(factory));

    for channel in [ChannelType::Telegram, ChannelType::Discord, ChannelType::Console] {
        if !config.is_enabled(channel) {
            continue;
        }
        if channel != ChannelType::Console {
            let section = config.channel(channel);
            if section.enabled != Some(true) && section.token.trim().is_empty() {
                continue;
            }
            warn!(
                "{} is enabled but this build has no {} transport; register one through ChannelRouter",
                channel,
                channel.key()
            );
            continue;
        }
        router.register(ConsoleChannel::new(shutdown.clone()));
        if let Some(limit) = config.channel(channel).message_limit {
            router.set_message_limit(channel, limit);
        }
        registry = registry.with_settings(channel, config.session_settings(channel));
    }

    if router.list_configured().is_empty() {
        bail!("No runnable channel is enabled; set console.enabled: true");
    }

    let pricing = load_pricing(&config);
    let router = Arc::new(router);
    let mut orchestrator =
        ConversationOrchestrator::new(Arc::new(registry), router.clone(), summarizer)
            .with_retry(RetryController::new(tool_policy))
            .with_pricing(Arc::new(pricing), summary_model);
    for channel in router.list_configured() {
        orchestrator = orchestrator.with_access(channel, config.access_policy(channel));
    }
    let orchestrator = Arc::new(orchestrator);

    let handles = start_message_handler(router, orchestrator, shutdown.clone());
    info!(model = %config.model.primary, "chack is running");
    println!(
        "{} type a message, /help for commands, Ctrl-D to quit",
        "chack".cyan().bold()
    );

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C, shutting down");
            shutdown.cancel();
        }
        _ = shutdown.cancelled() => {}
    }

    for handle in handles {
        if timeout(SHUTDOWN_GRACE, handle).await.is_err() {
            warn!("Message handler did not stop within {:?}", SHUTDOWN_GRACE);
        }
    }
    Ok(())
}

fn build_client(config: &ChackConfig, model: &str) -> Result<Arc<dyn LlmClient>> {
    let mut client = OpenAIClient::new(config.model.api_key.clone())
        .context("Failed to build the model client")?
        .with_model(model);
    if let Some(base_url) = config.model.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
        client = client.with_base_url(base_url);
    }
    Ok(Arc::new(client))
}

/// Missing or unreadable pricing leaves every cost unknown.
fn load_pricing(config: &ChackConfig) -> PricingTable {
    let path = resolve_pricing_path(config.pricing_path.as_deref());
    match PricingTable::load(&path) {
        Ok(table) => {
            info!(path = %path.display(), models = table.len(), "Loaded pricing table");
            table
        }
        Err(e) => {
            warn!(error = %format!("{e:#}"), "Pricing unavailable, costs will show as unknown");
            PricingTable::default()
        }
    }
}
