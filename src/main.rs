use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use quests_server::http::{AppState, router};
use quests_server::service::{QuestService, count_problems};
use quests_server::watcher::QuestWatcher;

#[derive(Parser)]
#[command(name = "quests-server")]
#[command(about = "Data-driven quest engine with an HTTP API")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Load the quests once, print the diagnostics report and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("quests_server=info".parse()?),
        )
        .init();

    let mut service = QuestService::from_config_file(&cli.config)
        .with_context(|| format!("failed to load config {:?}", cli.config))?;
    service.load();

    if cli.check {
        return check(&service);
    }

    let bind = service.config().server.bind.clone();
    let watch = service.config().server.watch;
    let quests_dir = service.quests_dir().to_path_buf();
    let items_dir = service.config().server.items_dir.clone();
    let state = AppState::new(service);

    // Hot reload on definition changes
    if watch {
        match QuestWatcher::start(&quests_dir, Some(&items_dir), Some(&cli.config)) {
            Ok(mut watcher) => {
                let reload_state = state.clone();
                tokio::spawn(async move {
                    while let Some(path) = watcher.next_change().await {
                        info!("Detected change in {:?}, triggering reload", path);
                        let mut service = reload_state.service.lock().await;
                        match service.reload() {
                            Ok(diagnostics) => {
                                let (errors, warnings) = count_problems(diagnostics);
                                info!("Hot-reload completed ({} errors, {} warnings)", errors, warnings);
                            }
                            Err(e) => error!("Hot-reload failed: {}", e),
                        }
                    }
                });
            }
            Err(e) => warn!("Failed to start quest watcher, hot-reload disabled: {}", e),
        }
    }

    let app = router(state.clone());
    let addr: SocketAddr = bind.parse().with_context(|| format!("invalid bind address '{}'", bind))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Quest server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    info!("Shutting down, saving progress");
    state.service.lock().await.save_all()?;
    Ok(())
}

/// Print the diagnostics report; fail if any file has an error
fn check(service: &QuestService) -> Result<()> {
    let diagnostics = service.diagnostics();
    for (path, problems) in diagnostics {
        println!("{}", path);
        for problem in problems {
            println!("  {}", problem);
        }
    }

    let (errors, warnings) = count_problems(diagnostics);
    println!(
        "{} quests loaded, {} error(s), {} warning(s)",
        service.manager().len(),
        errors,
        warnings
    );
    if errors > 0 {
        anyhow::bail!("quest definitions have {} error(s)", errors);
    }
    Ok(())
}
