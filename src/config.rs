use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use directories::ProjectDirs;

use crate::store::file::STATE_FILE_NAME;

/// NekoRest: a virtual cat that gets sick when you sit too long.
#[derive(Parser, Debug, Clone)]
#[command(name = "neko_rest", version, about)]
pub struct Config {
    /// WebSocket listen address
    #[arg(long, default_value = "127.0.0.1:8765")]
    pub addr: SocketAddr,

    /// Serve the extension over native messaging (stdin/stdout)
    #[arg(long)]
    pub native: bool,

    /// Directory holding the state file
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Keep state in memory only
    #[arg(long)]
    pub ephemeral: bool,

    /// Seconds between detection ticks
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub tick_secs: u64,

    /// Seconds between checks for external edits of the state file
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u64).range(1..))]
    pub watch_secs: u64,

    /// Write logs to this file instead of stderr
    #[arg(short, long)]
    pub log: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_secs(self.watch_secs)
    }

    pub fn data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("neko_rest");
        }
        ProjectDirs::from("", "", "neko_rest")
            .map(|dirs| dirs.data_local_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn state_file(&self) -> PathBuf {
        self.data_dir().join(STATE_FILE_NAME)
    }
}
