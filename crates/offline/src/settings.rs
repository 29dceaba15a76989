//! Settings of the sync client: TOML file, then `TRAVELMIND_SYNC_*`
//! environment variables, then command line flags.

use std::time::Duration;

use serde::Deserialize;

use crate::{error::Result, queue::QueuePolicy};

pub const DEFAULT_CONFIG_PATH: &str = "config/sync.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub base_url: String,
    pub queue_path: String,
    pub max_retries: u32,
    pub completed_grace_secs: u64,
    pub level: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        let policy = QueuePolicy::default();
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            queue_path: "config/sync_queue.json".to_string(),
            max_retries: policy.max_retries,
            completed_grace_secs: policy.completed_grace.as_secs(),
            level: "info".to_string(),
        }
    }
}

impl SyncConfig {
    pub fn policy(&self) -> QueuePolicy {
        QueuePolicy {
            max_retries: self.max_retries,
            completed_grace: Duration::from_secs(self.completed_grace_secs),
        }
    }
}

#[derive(Debug, Default, clap::Args)]
pub struct ConfigArgs {
    /// Optional config file path (TOML).
    #[arg(long, global = true)]
    pub config: Option<String>,
    /// Override server base URL (e.g. http://127.0.0.1:3000).
    #[arg(long, global = true)]
    pub base_url: Option<String>,
    /// Override the queue file location.
    #[arg(long, global = true)]
    pub queue_path: Option<String>,
    /// Override the number of attempts before an operation is parked.
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,
    /// Override how long completed operations are kept, in seconds.
    #[arg(long, global = true)]
    pub completed_grace_secs: Option<u64>,
}

pub fn load(args: ConfigArgs) -> Result<SyncConfig> {
    let config_path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    let mut builder = config::Config::builder();
    builder = builder.add_source(config::File::with_name(config_path).required(false));
    builder = builder
        .add_source(config::Environment::with_prefix("TRAVELMIND_SYNC").try_parsing(true));
    let mut settings: SyncConfig = builder.build()?.try_deserialize()?;

    if let Some(base_url) = args.base_url {
        settings.base_url = base_url;
    }
    if let Some(queue_path) = args.queue_path {
        settings.queue_path = queue_path;
    }
    if let Some(max_retries) = args.max_retries {
        settings.max_retries = max_retries;
    }
    if let Some(completed_grace_secs) = args.completed_grace_secs {
        settings.completed_grace_secs = completed_grace_secs;
    }

    Ok(settings)
}
