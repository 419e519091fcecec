use anyhow::{bail, Context, Result};
use chrono::{Duration, NaiveDate};
use std::path::Path;
use tracing_subscriber::{fmt, EnvFilter};

use put_recommender::backtesting::{BacktestReport, BacktestRunner};
use put_recommender::config::Config;
use put_recommender::data::{load_all, CsvDataSource};

fn parse_day(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("Expected a YYYY-MM-DD date, got {:?}", raw))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .init();

    cfg.validate()?;

    // Usage: backtest [START] [END], both YYYY-MM-DD
    let args: Vec<String> = std::env::args().collect();
    let end = match args.get(2) {
        Some(raw) => parse_day(raw)?,
        None => cfg.as_of,
    };
    let start = match args.get(1) {
        Some(raw) => parse_day(raw)?,
        None => end - Duration::days(90),
    };
    if start > end {
        bail!("Start {} is after end {}", start, end);
    }

    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║          PUT RECOMMENDER — BACKTESTER                    ║");
    println!("╠══════════════════════════════════════════════════════════╣");
    println!("║  Period:     {} to {}                      ║", start, end);
    println!("║  Window:     {}d support                                ║", cfg.filters.rolling_period);
    println!("║  DTE:        {}..={} ({})                          ║", cfg.backtest.min_dte, cfg.backtest.max_dte, cfg.backtest.day_count);
    println!("╚══════════════════════════════════════════════════════════╝");
    println!();

    let source = CsvDataSource::new(&cfg.data_dir);
    let data = load_all(&source, false).await?;

    let output_dir = cfg.output_dir.clone();
    let runner = BacktestRunner::new(data, cfg);
    let report = runner.run(start, end).await?;

    report.print_summary();

    std::fs::create_dir_all(&output_dir)?;
    let stem = format!(
        "{}/backtest_{}_{}",
        output_dir,
        report.start.format("%Y%m%d"),
        report.end.format("%Y%m%d"),
    );
    report.save_json(Path::new(&format!("{}.json", stem)))?;
    save_report_to_file(&report, &format!("{}.txt", stem))?;
    println!("\nReport saved to: {}.txt / .json", stem);

    Ok(())
}

fn save_report_to_file(report: &BacktestReport, path: &str) -> Result<()> {
    use std::io::Write;

    let mut f = std::fs::File::create(path)?;
    let pct = |v: Option<f64>| v.map_or("n/a".to_string(), |v| format!("{:.1}%", v));

    writeln!(f, "Put Recommender Backtest Report")?;
    writeln!(f, "===============================")?;
    writeln!(
        f,
        "Period: {} to {} ({} trading days)",
        report.start.format("%Y-%m-%d"),
        report.end.format("%Y-%m-%d"),
        report.trading_days
    )?;
    writeln!(f)?;
    writeln!(f, "Outcomes:")?;
    writeln!(f, "  Scored:    {}", report.total_records)?;
    writeln!(f, "  Known:     {}", report.with_outcome)?;
    writeln!(f, "  Worthless: {}", report.worthless)?;
    writeln!(f, "  ITM:       {}", report.in_the_money)?;
    writeln!(f)?;
    writeln!(f, "By Score:")?;
    for b in &report.buckets {
        writeln!(
            f,
            "  {}: {:.1}% worthless | {} of {}",
            b.label, b.hit_rate_pct, b.worthless_count, b.n
        )?;
    }
    writeln!(f)?;
    writeln!(f, "Overall:")?;
    writeln!(f, "  Hit Rate:   {}", pct(report.overall_hit_rate))?;
    writeln!(f, "  Avg Score:  {:.1}", report.avg_score.unwrap_or(0.0))?;
    writeln!(f, "  Top 25%:    {}", pct(report.top_quartile_hit_rate))?;
    writeln!(f, "  Bottom 25%: {}", pct(report.bottom_quartile_hit_rate))?;
    if let Some(spread) = report.score_spread {
        writeln!(f, "  Spread:     {:+.1} pp", spread)?;
    }

    Ok(())
}
