mod config;
mod engine;
mod models;
mod query;
mod storage;
mod types;

use std::io::{stderr, stdout, BufWriter};
use std::time::Instant;

use anyhow::Result;
use tracing::{error, info};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

use crate::config::Settings;
use crate::engine::{Reporter, Tour};
use crate::storage::{DocumentStore, MongoStore};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::from_env()?;

    setup_logging(settings.log_level);

    let store = MongoStore::connect(&settings.uri).await?;
    let reporter = Reporter::new(BufWriter::new(stdout().lock()));

    let timer = Instant::now();
    let outcome = Tour::new(&store, &settings, reporter).run().await;

    //NOTE: The client is shut down on every path so pooled connections are released before exit
    store.close().await;

    match &outcome {
        Ok(()) => info!("Tour finished in: {:?}", timer.elapsed()),
        Err(failure) => error!("Tour stopped after {:?}: {failure:#}", timer.elapsed())
    }

    outcome
}

fn setup_logging(level: LevelFilter) {
    //NOTE: Tour output goes to stdout, logging stays on stderr
    let terminal_log = fmt::layer()
        .with_target(false)
        .with_writer(stderr)
        .with_filter(level);

    tracing_subscriber::registry()
        .with(terminal_log)
        .init();
}
