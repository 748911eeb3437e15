use anyhow::{Context, Result};
use std::{env, path::PathBuf, sync::Arc};
use structopt::StructOpt;
use tracing::{info, info_span, Instrument};
use tracing_subscriber::{filter::LevelFilter, prelude::*, EnvFilter};
use train::config::Config;

#[derive(Debug, Clone, StructOpt)]
/// Train the PIXOR detector on pre-tiled imagery
struct Args {
    #[structopt(long, default_value = "train.json5")]
    /// configuration file
    pub config_file: PathBuf,
    #[structopt(long)]
    /// overrides the logging directory of the configuration file
    pub logging_dir: Option<PathBuf>,
}

fn init_tracing() {
    // INFO unless RUST_LOG says otherwise
    let filter = match env::var(EnvFilter::DEFAULT_ENV) {
        Ok(_) => EnvFilter::from_default_env(),
        Err(_) => EnvFilter::default().add_directive(LevelFilter::INFO.into()),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true).compact())
        .init();
}

#[tokio::main]
pub async fn main() -> Result<()> {
    init_tracing();

    let Args {
        config_file,
        logging_dir,
    } = Args::from_args();
    let mut config = Config::open(&config_file)
        .with_context(|| format!("failed to load config file '{}'", config_file.display()))?;
    if let Some(dir) = logging_dir {
        config.logging.dir = dir;
    }
    info!(
        "train model '{}' with config '{}'",
        config.model.pixor().name,
        config_file.display()
    );

    train::start(Arc::new(config))
        .instrument(info_span!("train"))
        .await?;

    Ok(())
}
