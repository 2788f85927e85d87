use anyhow::Result;
use clap::{Parser, Subcommand};
use mlchat_core::agent::{AgentLoop, ContextBuilder, ToolRegistry};
use mlchat_core::config::{self, Config, TrackingConfig};
use mlchat_core::providers::{ProviderError, create_provider};
use mlchat_core::tools::register_tracking_tools;
use mlchat_core::tracking::create_store;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

mod onboard;
mod repl;

#[derive(Parser)]
#[command(name = "mlchat")]
#[command(about = "mlchat - ask questions about your MLflow experiments", long_about = None)]
struct Cli {
    /// Config file to use (default: ~/.mlchat/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a config file interactively
    Init,
    /// Chat with the assistant
    Chat {
        /// Answer a single message and exit
        #[arg(short, long)]
        message: Option<String>,
    },
    /// List the tools the assistant can call
    Tools,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_agent(config: &Config) -> Result<AgentLoop, ProviderError> {
    let provider = create_provider(&config.llm)?;
    let store = create_store(&config.tracking);

    let tool_registry = Arc::new(ToolRegistry::new());
    register_tracking_tools(&tool_registry, store.clone());

    let context_builder =
        ContextBuilder::new(store.location()).with_tool_specs(tool_registry.get_specs());

    info!(
        provider = provider.name(),
        model = provider.model(),
        store = store.name(),
        location = store.location(),
        "agent ready"
    );

    Ok(
        AgentLoop::new(Arc::from(provider), context_builder, tool_registry)
            .with_max_iterations(config.max_iterations),
    )
}

fn load_or_exit(path: &std::path::Path) -> Config {
    match config::load_config(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(config::get_config_path);
    let command = cli.command.unwrap_or(Commands::Chat { message: None });

    match command {
        Commands::Init => {
            if let Some(config) = onboard::run_onboard(&config_path)? {
                config::save_config(&config, &config_path)?;
                onboard::print_done(&config_path);
            }
        }
        Commands::Tools => {
            let tracking = config::load_config(&config_path)
                .map(|c| c.tracking)
                .unwrap_or_else(|_| TrackingConfig::default());
            let registry = ToolRegistry::new();
            register_tracking_tools(&registry, create_store(&tracking));

            for spec in registry.get_specs() {
                println!("{:<34} {}", spec.name, spec.description);
            }
        }
        Commands::Chat { message } => {
            let config = load_or_exit(&config_path);
            let agent_loop = match build_agent(&config) {
                Ok(agent_loop) => agent_loop,
                Err(e) => {
                    eprintln!("❌ {}", e);
                    std::process::exit(1);
                }
            };

            let skin = repl::skin();
            match message {
                Some(msg) => match agent_loop.process(&msg).await {
                    Ok(response) => repl::print_answer(&skin, &response),
                    Err(e) => {
                        eprintln!("❌ Error: {}", e);
                        std::process::exit(1);
                    }
                },
                None => repl::run(&agent_loop, &skin, &config::get_history_path()).await?,
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_is_the_default_command() {
        let cli = Cli::try_parse_from(["mlchat"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn config_flag_is_global() {
        let cli =
            Cli::try_parse_from(["mlchat", "chat", "--config", "/tmp/c.toml", "-m", "hi"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
        assert!(matches!(
            cli.command,
            Some(Commands::Chat { message: Some(ref m) }) if m == "hi"
        ));
    }

    #[test]
    fn unsupported_provider_fails_at_startup() {
        let config = config::parse_config(
            "[llm]\nprovider = \"ollama\"\nmodel = \"llama3\"\n",
            std::path::Path::new("config.toml"),
        )
        .unwrap();
        let err = build_agent(&config).err().unwrap();
        assert!(matches!(err, ProviderError::Unsupported(_)));
    }
}
