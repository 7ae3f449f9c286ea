//! `vibestack` command-line entry point

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use vibe_server::{generation_service, routes, AppState, Overrides, ServerConfig};

fn cli() -> Command {
    let config = Arg::new("config")
        .long("config")
        .env("VIBESTACK_CONFIG")
        .value_parser(value_parser!(PathBuf))
        .help("TOML configuration file");

    Command::new("vibestack")
        .version(vibe_server::VERSION)
        .about("AI landing page generator with a sandboxed remix/polish editor")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("serve")
                .about("Run the HTTP API")
                .arg(
                    Arg::new("listen")
                        .long("listen")
                        .value_parser(value_parser!(SocketAddr))
                        .help("Address to listen on (default 127.0.0.1:3000)"),
                )
                .arg(config.clone())
                .arg(
                    Arg::new("log-json")
                        .long("log-json")
                        .action(ArgAction::SetTrue)
                        .help("Emit logs as JSON lines"),
                )
                .arg(
                    Arg::new("allow-anonymous")
                        .long("allow-anonymous")
                        .action(ArgAction::SetTrue)
                        .help("Accept requests without an x-user-id header (development only)"),
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Print the effective configuration with secrets redacted")
                .arg(config),
        )
}

fn load(args: &ArgMatches) -> Result<ServerConfig> {
    let overrides = Overrides {
        listen: args.try_get_one::<SocketAddr>("listen").ok().flatten().copied(),
        allow_anonymous: args.try_get_one::<bool>("allow-anonymous").ok().flatten().copied().unwrap_or(false),
        log_json: args.try_get_one::<bool>("log-json").ok().flatten().copied().unwrap_or(false),
    };
    let path = args.get_one::<PathBuf>("config");
    ServerConfig::load(path.map(PathBuf::as_path), &overrides).context("failed to load configuration")
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if json { builder.json().try_init() } else { builder.try_init() };
    installed.map_err(|err| anyhow::anyhow!(err))
}

async fn serve(config: ServerConfig) -> Result<()> {
    init_tracing(config.log_json)?;
    if config.allow_anonymous {
        tracing::warn!("Anonymous access is enabled; do not use this in production");
    }
    if config.webhook_secret.is_none() {
        tracing::warn!("No webhook secret configured; billing webhooks will be refused");
    }

    let generator = generation_service(&config).context("failed to configure the generation service")?;
    let state = AppState::new(generator, &config);

    let (addr, server) = warp::serve(routes(state))
        .try_bind_with_graceful_shutdown(config.listen, async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "Failed to listen for shutdown signal");
            }
        })
        .with_context(|| format!("failed to bind {}", config.listen))?;

    tracing::info!(%addr, models = ?config.core.models, "VibeStack listening");
    server.await;
    tracing::info!("Shut down");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    match matches.subcommand() {
        Some(("serve", args)) => serve(load(args)?).await,
        Some(("config", args)) => {
            println!("{:#?}", load(args)?);
            Ok(())
        }
        _ => Ok(()),
    }
}
