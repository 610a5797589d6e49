//! Bootstraps the worker process: logging, configuration, the broker
//! connection and the resource controller. Everything else (per-job
//! parameters, test data layout) arrives later, per message.
//!

use sandbox::cgroup::ResourceController;

use crate::broker::Broker;
use crate::config::WorkerConfig;
use crate::{Result, ResultExt};

/// Result of a successful bootstrap: a ready-to-use broker connection and
/// the resolved configuration the rest of the worker needs.
pub struct Bootstrap {
    pub config: WorkerConfig,
    pub broker: Broker,
    pub controller: ResourceController,
}

/// Initialize logging, load configuration from the environment and connect
/// to the broker. Called once at process startup.
pub async fn bootstrap() -> Result<Bootstrap> {
    env_logger::init();

    let config = WorkerConfig::from_env();
    log::info!("starting judge worker, data dir {}", config.data_dir.display());

    let broker = Broker::connect(&config.broker_uri())
        .await
        .chain_err(|| "failed to connect to broker")?;
    log::info!("connected to broker at {}:{}", config.broker_host, config.broker_port);

    let controller = ResourceController::new();

    Ok(Bootstrap { config, broker, controller })
}
