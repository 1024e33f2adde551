use anyhow::{Context, Result};
use basebone_core::agent::PromptTemplate;
use basebone_core::{
    AgentLoop, ChatService, Config, ContextBuilder, IncomingMessage, Reply, TemplateStore,
    ToolRegistry, config, create_memory, create_provider,
};
use basebone_slack::{OracleBot, SlackConfig};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod onboard;

const LOCAL_USER: &str = "local";
const LOCAL_CHANNEL: &str = "cli";

#[derive(Parser)]
#[command(name = "basebone")]
#[command(about = "basebone - a Slack oracle that reasons with search and a calculator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    Onboard,
    /// Ask from the terminal. Without --message, reads questions from stdin.
    Ask {
        #[arg(short, long)]
        message: Option<String>,
        /// Print the prompting chain after each answer.
        #[arg(long)]
        show_chain: bool,
    },
    /// Run the Slack bot until Ctrl-C.
    Serve,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "basebone=info,basebone_core=info,basebone_slack=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(Cli::parse()).await {
        error!("{:?}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let command = cli.command.unwrap_or_else(|| {
        if !config::config_exists() {
            Commands::Onboard
        } else {
            Commands::Ask {
                message: None,
                show_chain: false,
            }
        }
    });

    match command {
        Commands::Onboard => {
            let onboard_config = onboard::run_onboard().context("Onboarding failed")?;
            config::save_config(&onboard_config).context("Failed to save config")?;
            onboard::print_saved(&config::get_config_path());
        }
        Commands::Ask {
            message,
            show_chain,
        } => {
            let config = Config::load_or_init()?;
            let service = build_service(&config)?;

            match message {
                Some(msg) => ask_once(&service, &msg, show_chain).await,
                None => repl(&service, show_chain).await,
            }
        }
        Commands::Serve => {
            let config = Config::load_or_init()?;
            let service = Arc::new(build_service(&config)?);
            let slack_config = SlackConfig::from_env().context("Slack credentials missing")?;

            let bot = Arc::new(OracleBot::new(slack_config, service)?);
            let signal_bot = bot.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    signal_bot.shutdown();
                }
            });

            info!("starting Slack bot");
            bot.start().await.context("Slack bot stopped")?;
        }
    }

    Ok(())
}

fn build_service(config: &Config) -> Result<ChatService> {
    let provider = create_provider(config).context("failed to create provider")?;
    info!(provider = provider.name(), model = %config.model, "provider ready");

    let templates = match &config.prompt_template {
        Some(text) => TemplateStore::new(PromptTemplate::new(text.clone())),
        None => TemplateStore::default(),
    };

    let tool_registry = ToolRegistry::from_config(config);
    info!(tools = ?tool_registry.names(), "tools registered");

    let agent_loop = AgentLoop::new(
        provider,
        ContextBuilder::new(Arc::new(templates)),
        Arc::new(tool_registry),
    )
    .with_limits(config.limits());

    Ok(ChatService::new(agent_loop, create_memory())
        .with_prompt_editors(config.allowed_prompt_editors.clone()))
}

async fn ask_once(service: &ChatService, text: &str, show_chain: bool) {
    println!("\n🤔 Processing...\n");
    let reply = service
        .handle(&IncomingMessage::new(LOCAL_USER, LOCAL_CHANNEL, text))
        .await;
    print_reply(&reply, show_chain);
}

async fn repl(service: &ChatService, show_chain: bool) {
    use std::io::{self, BufRead};

    println!("🔮 Basebone Oracle");
    println!("Type your question (+forget, +prompt <template>, Ctrl+D to exit):\n");
    let stdin = io::stdin();
    let stdout = io::stdout();

    loop {
        print!("> ");
        let _ = stdout.lock().flush();

        let mut input = String::new();
        match stdin.lock().read_line(&mut input) {
            Ok(0) | Err(_) => {
                println!("\n👋 Goodbye!");
                break;
            }
            Ok(_) => {
                if input.trim().is_empty() {
                    continue;
                }
                ask_once(service, input.trim(), show_chain).await;
                println!();
            }
        }
    }
}

fn print_reply(reply: &Reply, show_chain: bool) {
    match reply {
        Reply::Answer(answer) => {
            println!("Final Answer: {}", answer.text);
            if show_chain {
                println!("\nPrompting Chain:\n{}", answer.chain.join("\n"));
            }
        }
        Reply::Failure(message) => eprintln!("❌ {}", message),
        other => println!("{}", other.text()),
    }
}
