use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};
use mlchat_core::config::{Config, LlmConfig, TrackingConfig};
use mlchat_core::providers::ProviderKind;
use std::path::Path;

const BANNER: &str = r"
    -------------------------------------

     m l c h a t
     chat with your MLflow experiments

    -------------------------------------
";

const TOTAL_STEPS: usize = 3;

fn print_step(step: usize, total: usize, title: &str) {
    println!();
    println!(
        "{}",
        style(format!("[{}/{}] {}", step, total, title))
            .cyan()
            .bold()
    );
    println!();
}

pub fn default_model(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::Groq => "llama-3.3-70b-versatile",
        ProviderKind::OpenAi => "gpt-4o-mini",
        ProviderKind::Ollama => "llama3.1",
    }
}

/// Assembles the config the wizard writes. A blank key is left out so the
/// environment variable fallback applies.
pub fn build_config(
    provider: ProviderKind,
    api_key: &str,
    model: &str,
    tracking_uri: &str,
) -> Config {
    let api_key = api_key.trim();
    let llm = LlmConfig {
        provider,
        api_key: (!api_key.is_empty()).then(|| api_key.to_string()),
        model: model.trim().to_string(),
        base_url: None,
        params: Default::default(),
    };
    let tracking = TrackingConfig {
        uri: tracking_uri.trim().to_string(),
        token: None,
    };
    Config::new(llm, tracking)
}

fn setup_provider() -> Result<ProviderKind> {
    let labels: Vec<String> = ProviderKind::ALL
        .iter()
        .map(|k| {
            if k.is_supported() {
                k.to_string()
            } else {
                format!("{} (not available yet)", k)
            }
        })
        .collect();

    let selection = Select::new()
        .with_prompt("Select your LLM provider")
        .items(&labels)
        .default(0)
        .interact()
        .context("Failed to select provider")?;

    Ok(ProviderKind::ALL[selection])
}

fn setup_api_key(kind: ProviderKind) -> Result<String> {
    let env_vars = kind.api_key_env_vars();
    let prompt = if env_vars.is_empty() {
        format!("Enter your {} API key (optional)", kind)
    } else {
        format!(
            "Enter your {} API key (leave blank to use {})",
            kind,
            env_vars.join(" or ")
        )
    };

    Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()
        .context("Failed to read API key")
}

fn setup_model(kind: ProviderKind) -> Result<String> {
    Input::new()
        .with_prompt("Model")
        .default(default_model(kind).to_string())
        .interact_text()
        .context("Failed to read model")
}

fn setup_tracking_uri() -> Result<String> {
    Input::new()
        .with_prompt("Tracking URI (mlruns path or http(s) server)")
        .default(TrackingConfig::default().uri)
        .interact_text()
        .context("Failed to read tracking URI")
}

/// Returns `None` when the user declines to overwrite an existing config.
pub fn run_onboard(config_path: &Path) -> Result<Option<Config>> {
    println!("{}", style(BANNER).cyan().bold());
    println!("  {}", style("Welcome to mlchat!").white().bold());
    println!(
        "  {}",
        style("This wizard writes the config used by 'mlchat chat'.").dim()
    );

    if config_path.exists() {
        let overwrite = Confirm::new()
            .with_prompt(format!(
                "A config already exists at {}. Overwrite it?",
                config_path.display()
            ))
            .default(false)
            .interact()
            .context("Failed to read confirmation")?;
        if !overwrite {
            println!("  {} Keeping the existing config.", style("→").green());
            return Ok(None);
        }
    }

    print_step(1, TOTAL_STEPS, "Provider");
    let provider = setup_provider()?;
    if !provider.is_supported() {
        println!(
            "  {} {} is recognized but has no client yet; chat will refuse to start with it.",
            style("!").yellow(),
            provider
        );
    }

    print_step(2, TOTAL_STEPS, "API Key & Model");
    let api_key = setup_api_key(provider)?;
    let model = setup_model(provider)?;

    print_step(3, TOTAL_STEPS, "Tracking Store");
    let tracking_uri = setup_tracking_uri()?;

    let config = build_config(provider, &api_key, &model, &tracking_uri);
    config.validate()?;
    Ok(Some(config))
}

pub fn print_done(config_path: &Path) {
    println!();
    println!("  {} Configuration complete!", style("✓").green().bold());
    println!(
        "  {} Config saved to {}",
        style("→").green(),
        style(config_path.display()).cyan()
    );
    println!(
        "  {} You can now run: {}",
        style("→").green(),
        style("mlchat chat").cyan().bold()
    );
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlchat_core::config::{load_config, save_config};
    use tempfile::TempDir;

    #[test]
    fn blank_key_is_left_to_the_environment() {
        let config = build_config(ProviderKind::Groq, "  ", " llama-3.3-70b-versatile ", "data/mlruns");
        assert!(config.llm.api_key.is_none());
        assert_eq!(config.llm.model, "llama-3.3-70b-versatile");
        assert_eq!(config.max_iterations, 20);
    }

    #[test]
    fn wizard_output_round_trips_through_the_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let config = build_config(
            ProviderKind::Groq,
            "gsk_test",
            default_model(ProviderKind::Groq),
            "http://localhost:5000",
        );

        save_config(&config, &path).unwrap();
        let loaded = load_config(&path).unwrap();

        assert_eq!(loaded.llm.provider, ProviderKind::Groq);
        assert_eq!(loaded.llm.api_key.as_deref(), Some("gsk_test"));
        assert_eq!(loaded.tracking.uri, "http://localhost:5000");
    }
}
