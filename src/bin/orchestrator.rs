// src/bin/orchestrator.rs
// CLI entry point: drive one query through the runtime and print the
// answer. Ambient scaffolding around the library, not part of its API
// surface — grounded on the teacher's own minimal `bin/mira.rs`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use mira_orchestrator::config::RuntimeConfig;
use mira_orchestrator::llm::mock::EchoProvider;
use mira_orchestrator::observer::Observer;
use mira_orchestrator::{Runtime, StrategyKind};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliStrategy {
    Direct,
    React,
    Reflection,
}

impl From<CliStrategy> for StrategyKind {
    fn from(value: CliStrategy) -> Self {
        match value {
            CliStrategy::Direct => StrategyKind::Direct,
            CliStrategy::React => StrategyKind::React,
            CliStrategy::Reflection => StrategyKind::Reflection,
        }
    }
}

/// Drive a single query through the tool-orchestration runtime.
#[derive(Debug, Parser)]
#[command(name = "orchestrator", version, about)]
struct CliArgs {
    /// Natural-language query to process.
    query: String,

    /// Inference strategy to use.
    #[arg(long, value_enum, default_value = "direct")]
    strategy: CliStrategy,

    /// Directory holding mcp/mcp.json, mcp/domains.json, config/rules/.
    #[arg(long, env = "ORCHESTRATOR_CONFIG_ROOT")]
    config_root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let args = CliArgs::parse();
    let config_root = args
        .config_root
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".orchestrator"));

    let config = RuntimeConfig::from_env(config_root);
    // No concrete LLM adapter ships with this crate (§9 "LLM as an
    // injected capability") — wire a real provider by constructing
    // `Runtime::bootstrap` directly instead of going through this CLI.
    let runtime = Runtime::bootstrap(config, Arc::new(EchoProvider), Observer::new()).await?;

    let answer = runtime.process_query(args.strategy.into(), &args.query, &Vec::new()).await;
    println!("{answer}");

    runtime.close().await;
    Ok(())
}
