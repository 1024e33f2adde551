use anyhow::{Context, Result};
use basebone_core::config::{Config, SearchConfig};
use console::style;
use dialoguer::{Input, Select};
use std::path::Path;

const BANNER: &str = r"
    -------------------------------------

     ___   _   ___ ___ ___  ___  _  _ ___
    | _ ) /_\ / __| __| _ )/ _ \| \| | __|
    | _ \/ _ \\__ \ _|| _ \ (_) | .` | _|
    |___/_/ \_\___/___|___/\___/|_|\_|___|

    -------------------------------------
";

const PROVIDERS: &[&str] = &["openai", "openrouter", "ollama"];

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

fn setup_provider() -> Result<String> {
    let selection = Select::new()
        .with_prompt("Select your model provider")
        .items(PROVIDERS)
        .default(0)
        .interact()
        .context("Failed to select provider")?;

    Ok(PROVIDERS[selection].to_string())
}

fn setup_api_key(provider: &str) -> Result<String> {
    if provider == "ollama" {
        println!("  {} Ollama runs locally, no API key needed", style("✓").green());
        return Ok(String::new());
    }

    let api_key: String = Input::new()
        .with_prompt(format!("Enter your {} API key", provider))
        .interact_text()
        .context("Failed to read API key")?;

    if api_key.trim().is_empty() {
        return Err(anyhow::anyhow!("API key cannot be empty"));
    }

    Ok(api_key.trim().to_string())
}

fn setup_model(provider: &str) -> Result<String> {
    let models: &[&str] = match provider {
        "ollama" => &["llama3.1", "mistral", "qwen2.5"],
        "openrouter" => &["openai/gpt-4o-mini", "anthropic/claude-3.5-haiku", "meta-llama/llama-3.1-70b-instruct"],
        _ => &["gpt-4o-mini", "gpt-4o", "gpt-4.1-mini"],
    };

    let selection = Select::new()
        .with_prompt("Select your model")
        .items(models)
        .default(0)
        .interact()
        .context("Failed to select model")?;

    Ok(models[selection].to_string())
}

fn setup_search() -> Result<SearchConfig> {
    let api_key: String = Input::new()
        .with_prompt("Enter your SerpApi key (optional)")
        .allow_empty(true)
        .interact_text()
        .context("Failed to read SerpApi key")?;

    let api_key = api_key.trim().to_string();
    Ok(SearchConfig {
        api_key,
        ..Default::default()
    })
}

pub fn run_onboard() -> Result<Config> {
    println!("{}", style(BANNER).cyan().bold());

    println!("  {}", style("Welcome to the Basebone Oracle!").white().bold());
    println!(
        "  {}",
        style("This wizard writes ~/.basebone/config.toml.").dim()
    );
    println!();

    print_step(1, 4, "Provider");
    let provider = setup_provider()?;

    print_step(2, 4, "API Key Setup");
    let api_key = setup_api_key(&provider)?;

    print_step(3, 4, "Model Selection");
    let model = setup_model(&provider)?;

    print_step(4, 4, "Search");
    let search = setup_search()?;
    if search.api_key.is_empty() {
        println!(
            "  {} No key saved. Set SERPAPI_API_KEY later or only the calculator will be available",
            style("!").yellow()
        );
    } else {
        println!("  {} Search tool enabled", style("✓").green());
    }

    let config = Config {
        provider: Some(provider),
        api_key,
        model,
        search,
        ..Default::default()
    };

    println!();
    println!("  {} Configuration complete!", style("✓").green().bold());

    Ok(config)
}

/// Printed once the config file has actually been written.
pub fn print_saved(path: &Path) {
    for line in saved_lines(path) {
        println!("{}", line);
    }
}

fn saved_lines(path: &Path) -> Vec<String> {
    vec![
        format!(
            "  {} Config saved to {}",
            style("→").green(),
            style(path.display()).cyan()
        ),
        String::new(),
        format!(
            "  {} Try it locally: {}",
            style("→").green(),
            style("basebone ask").cyan().bold()
        ),
        format!(
            "  {} Connect to Slack: {}",
            style("→").green(),
            style("SLACK_BOT_TOKEN=... SLACK_APP_TOKEN=... basebone serve")
                .cyan()
                .bold()
        ),
        String::new(),
    ]
}
