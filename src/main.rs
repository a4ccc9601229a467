use anyhow::{Context, Result};
use chrono::Datelike;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use intrinsic_value::analysis::ValuationPipeline;
use intrinsic_value::api::{MacrotrendsEpsClient, WikipediaUniverseClient, YahooPriceClient};
use intrinsic_value::cache::CsvEpsCache;
use intrinsic_value::eps_collector::EpsCollector;
use intrinsic_value::models::{self, Config, RunParams};
use intrinsic_value::price_oracle::PriceOracle;
use intrinsic_value::report;

/// Estimate intrinsic value from EPS growth and rank undervalued Nasdaq-100 companies
#[derive(Parser, Debug)]
#[command(name = "intrinsic-value", version)]
struct Args {
    /// Tag the run as a backtest (use together with a past --final-year)
    #[arg(long)]
    backtest: bool,

    /// Year the valuation is computed as of [default: current year]
    #[arg(long)]
    final_year: Option<i32>,

    /// Years between the two EPS observations
    #[arg(long, default_value_t = RunParams::DEFAULT_YEARS_BACK)]
    years_back: u32,

    /// Value a previously saved EPS table instead of acquiring EPS
    #[arg(long)]
    eps_table: Option<PathBuf>,

    /// Only analyse the first N companies of the universe
    #[arg(long)]
    limit: Option<usize>,

    /// EPS cache file [env: EPS_CACHE_PATH]
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Directory for report files [env: OUTPUT_DIR]
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Exit multiple applied to future EPS
    #[arg(long)]
    pe_ratio: Option<f64>,

    /// Annual discount rate, e.g. 0.15
    #[arg(long)]
    discount_rate: Option<f64>,

    /// Projection horizon in years
    #[arg(long)]
    growth_years: Option<u32>,
}

impl Args {
    fn apply_to(&self, config: &mut Config) {
        if let Some(path) = &self.cache {
            config.eps_cache_path = path.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(pe_ratio) = self.pe_ratio {
            config.valuation.pe_ratio = pe_ratio;
        }
        if let Some(discount_rate) = self.discount_rate {
            config.valuation.discount_rate = discount_rate;
        }
        if let Some(years) = self.growth_years {
            config.valuation.years = years;
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("intrinsic_value=info")),
        )
        .init();

    let args = Args::parse();
    if let Err(e) = run(args).await {
        tracing::error!("Run failed: {:#}", e);
        eprintln!("❌ {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = Config::from_env();
    args.apply_to(&mut config);

    let today = models::today();
    let run = RunParams {
        backtest: args.backtest,
        final_year: args.final_year.unwrap_or_else(|| today.year()),
        years_back: args.years_back,
    };
    if run.backtest && run.final_year == today.year() {
        warn!("--backtest with the current year prices as of today, same as a live run");
    }
    let window = run.window();
    info!(
        "🚀 {} run: final year {}, {} years back (EPS {} vs {})",
        if run.backtest { "Backtest" } else { "Live" },
        run.final_year,
        run.years_back,
        window.initial,
        window.latest
    );

    let eps_table = match &args.eps_table {
        Some(path) => {
            let pairs = report::read_eps_pairs(path)
                .with_context(|| format!("reading EPS table {}", path.display()))?;
            info!("📂 Loaded {} EPS pairs from {}", pairs.len(), path.display());
            pairs
        }
        None => {
            let universe = WikipediaUniverseClient::from_config(&config)?;
            let source = MacrotrendsEpsClient::from_config(&config)?;
            let cache = CsvEpsCache::new(&config.eps_cache_path);
            info!("💾 EPS cache: {}", config.eps_cache_path.display());

            let collector = EpsCollector::new(universe, cache, source).with_limit(args.limit);
            let acquisition = collector.acquire(run.final_year, run.years_back).await?;
            let stats = &acquisition.stats;
            let resolved = acquisition
                .pairs
                .iter()
                .filter(|p| p.eps_initial.is_some() && p.eps_latest.is_some())
                .count();
            info!(
                "📊 {} companies: {} complete EPS pairs, {} fetch calls, {} cache hits, {} cache errors",
                stats.companies, resolved, stats.fetch_calls, stats.cache_hits, stats.cache_errors
            );

            let table_path = report::eps_table_path(&config.output_dir, &run);
            report::write_eps_pairs(&table_path, &acquisition.pairs)?;
            info!("💾 Saved EPS table to {}", table_path.display());
            acquisition.pairs
        }
    };

    let oracle = PriceOracle::new(YahooPriceClient::from_config(&config)?);
    let pipeline = ValuationPipeline::new(oracle, config.valuation, &config.output_dir);
    let outcome = pipeline.run(&eps_table, &run, today).await?;

    let summary = &outcome.summary;
    info!(
        "📊 {} rows: {} valued, {} dropped (invalid EPS), {} without price, {} undervalued",
        summary.input_rows, summary.valued, summary.dropped, summary.missing_price, summary.undervalued
    );
    println!("{}", outcome.paths.undervalued_sorted_html.display());
    Ok(())
}
