use std::fs::OpenOptions;
use std::io;
use std::sync::{Arc, Mutex};

use chrono::Local;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use neko_rest::broadcast::Broadcaster;
use neko_rest::config::Config;
use neko_rest::daemon::{self, Endpoint, TrackerHandle};
use neko_rest::native_messaging;
use neko_rest::notify::desktop::DesktopNotifier;
use neko_rest::probe::reported::ReportedActivity;
use neko_rest::store::PersistentStore;
use neko_rest::store::file::JsonFileStore;
use neko_rest::store::memory::MemoryStore;
use neko_rest::tracker::SittingTracker;
use neko_rest::ws;

fn init_logging(config: &Config) -> io::Result<()> {
    let default_level = if config.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    // stdout is reserved for native messaging
    match &config.log {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(io::stderr).init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();
    init_logging(&config)?;

    info!(
        tick_secs = config.tick_secs,
        native = config.native,
        "🐱 NekoRest starting"
    );

    let store: Arc<dyn PersistentStore> = if config.ephemeral {
        info!("state kept in memory only");
        Arc::new(MemoryStore::new())
    } else {
        match JsonFileStore::open(config.state_file()).await {
            Ok(file_store) => {
                let file_store = Arc::new(file_store);
                info!(path = %file_store.path().display(), "state file");
                file_store.clone().spawn_watch(config.watch_interval());
                file_store
            }
            Err(e) => {
                warn!(error = %e, "state file unusable, keeping state in memory");
                Arc::new(MemoryStore::new())
            }
        }
    };

    let activity = ReportedActivity::new();
    let listeners = Broadcaster::new();
    let tracker = SittingTracker::load(
        store,
        Arc::new(activity.clone()),
        Arc::new(DesktopNotifier),
        listeners.clone(),
        Local::now(),
    )
    .await;

    let (handle, commands) = TrackerHandle::channel();
    let endpoint = Endpoint {
        handle,
        activity,
        listeners,
    };
    let owner = tokio::spawn(daemon::run(tracker, commands, config.tick_interval()));

    if config.native {
        // The browser owns our lifetime: stop when it closes the pipe.
        native_messaging::serve_stdio(endpoint).await;
    } else {
        tokio::select! {
            result = ws::websocket_server::start_websocket_server(config.addr, endpoint) => result?,
            _ = tokio::signal::ctrl_c() => info!("interrupted, shutting down"),
        }
    }

    owner.abort();
    Ok(())
}
