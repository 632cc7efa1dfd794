use clap::{Parser, Subcommand};
use std::sync::Arc;

use helpbot::application::errors::BotError;
use helpbot::application::flows::{onboarding_flow, register_default_commands};
use helpbot::application::messaging::MessageRouter;
use helpbot::application::services::{CommandService, Messenger};
use helpbot::domain::entities::InboundMessage;
use helpbot::domain::traits::{Directory, Outbox, Transport};
use helpbot::infrastructure::adapters::ConsoleAdapter;
use helpbot::infrastructure::config::Config;
use helpbot::infrastructure::database::Database;

#[derive(Parser)]
#[command(name = "helpbot")]
#[command(about = "Onboarding helper bot for vinebot conversations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Log debug output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot
    Run,
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.quiet {
        tracing::Level::ERROR
    } else if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    match cli.command {
        Commands::Run => {
            if let Err(e) = run_bot(&cli.config) {
                tracing::error!("helpbot stopped: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Version => {
            println!("helpbot v{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::InitConfig => {
            init_config();
        }
    }
}

fn load_config(config_path: &str) -> Config {
    if std::path::Path::new(config_path).exists() {
        Config::load(config_path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config: {}, using defaults", e);
            Config::load_env()
        })
    } else {
        Config::load_env()
    }
}

fn run_bot(config_path: &str) -> Result<(), BotError> {
    let config = load_config(config_path);
    tracing::info!("Starting {}", config.bot.name);

    let db = Arc::new(Database::new(&config.database.path)?);
    tracing::info!("Database opened at {}", config.database.path.display());

    let rt = tokio::runtime::Runtime::new().map_err(|e| BotError::Internal(e.to_string()))?;
    let adapter = {
        let _runtime = rt.enter();
        Arc::new(ConsoleAdapter::new(&config.bot.name, &config.bot.domain))
    };
    let directory: Arc<dyn Directory> = db.clone();

    let messenger = Arc::new(Messenger::new(
        &config.bot.name,
        &config.routing.leaves_domain,
        config.control_address()?,
        directory.clone(),
        adapter.clone(),
    ));
    let dialogue = onboarding_flow(config.onboarding_settings(), directory.clone(), messenger);

    let mut commands = CommandService::new();
    register_default_commands(&mut commands, directory.clone(), config.bot.admins.clone());
    tracing::info!("Registered {} slash commands", commands.registry().len());

    let router = MessageRouter::new(
        config.router_settings()?,
        config.message_parser(),
        dialogue,
        commands,
        directory,
    );

    let served = rt.block_on(serve(&router, adapter.as_ref()));
    // The stdin reader may still be parked in a blocking read
    rt.shutdown_timeout(std::time::Duration::from_millis(500));
    served?;

    // Every handler holding the database goes away with the router
    drop(router);
    match Arc::try_unwrap(db) {
        Ok(db) => db.close()?,
        Err(_) => tracing::warn!("Database still shared at shutdown, leaving it open"),
    }
    tracing::info!("Done");
    Ok(())
}

/// Handle messages one at a time until the transport closes or Ctrl-C.
///
/// Shutdown is only observed between messages, so the message in flight is
/// always finished first.
async fn serve(router: &MessageRouter, transport: &ConsoleAdapter) -> Result<(), BotError> {
    transport.start().await?;
    tracing::info!("Connected as {}", transport.bot_info().address);

    loop {
        let msg = tokio::select! {
            msg = transport.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                break;
            }
        };
        dispatch(router, transport, &msg);
    }
    Ok(())
}

fn dispatch(router: &MessageRouter, outbox: &dyn Outbox, msg: &InboundMessage) {
    match router.route(msg) {
        Ok(Some(reply)) => {
            if let Err(e) = outbox.send_chat(&reply.to, &reply.body) {
                tracing::error!("Failed to send reply to {}: {}", reply.to, e);
                return;
            }
            if let Err(e) = router.log_broadcast(&reply) {
                tracing::warn!("Could not log broadcast to {}: {}", reply.to, e);
            }
        }
        Ok(None) => {}
        Err(e) => tracing::error!("Failed to handle message from {}: {}", msg.from, e),
    }
}

fn init_config() {
    match Config::default().to_yaml() {
        Ok(yaml) => {
            println!("{}", yaml);
            println!("\nSave this to config.yaml and adjust as needed.");
        }
        Err(e) => tracing::error!("Failed to render default config: {}", e),
    }
}
