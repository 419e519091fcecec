use anyhow::Result;
use std::path::Path;
use tracing_subscriber::{fmt, EnvFilter};

use put_recommender::config::Config;
use put_recommender::data::CsvDataSource;
use put_recommender::pipeline::Recommender;
use put_recommender::scoring::engine::print_summary;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .init();

    let source = Box::new(CsvDataSource::new(&cfg.data_dir));
    let output_dir = cfg.output_dir.clone();

    let recommender = Recommender::new(cfg, source);
    let output = recommender.run().await?;

    print_summary(&output.recommendations);
    output.portfolio.print_summary();
    output.save(Path::new(&output_dir))?;

    Ok(())
}
