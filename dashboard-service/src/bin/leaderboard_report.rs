use anyhow::{anyhow, bail, Result};
use dashboard_service::{
    config::AppConfig,
    observability,
    rank::{GeneratorFilter, SortKey, REVENUE_LEADERBOARD_SIZE},
    store::PgMarketData,
    views::{self, fmt_revenue, LeaderboardView},
    window::DateRange,
};
use std::{env, path::PathBuf};
use time::OffsetDateTime;

const USAGE: &str = "usage: leaderboard_report [--range 24h|7d|30d] [--regions R1,R2] \
[--fuels F1,F2] [--search TERM] \
[--sort total_revenue|capacity_factor|revenue_per_mw|performance_score] \
[--top N] [--csv PATH]";

#[derive(Debug, Default)]
struct ReportArgs {
    range: Option<String>,
    regions: Option<String>,
    fuels: Option<String>,
    search: Option<String>,
    sort: Option<String>,
    top: Option<usize>,
    csv: Option<PathBuf>,
}

fn parse_args() -> Result<ReportArgs> {
    let mut parsed = ReportArgs::default();
    let mut args = env::args().skip(1);

    while let Some(arg) = args.next() {
        let mut value = |flag: &str| {
            args.next()
                .ok_or_else(|| anyhow!("{flag} needs a value\n{USAGE}"))
        };
        match arg.as_str() {
            "--range" => parsed.range = Some(value("--range")?),
            "--regions" => parsed.regions = Some(value("--regions")?),
            "--fuels" => parsed.fuels = Some(value("--fuels")?),
            "--search" => parsed.search = Some(value("--search")?),
            "--sort" => parsed.sort = Some(value("--sort")?),
            "--top" => parsed.top = Some(value("--top")?.parse()?),
            "--csv" => parsed.csv = Some(PathBuf::from(value("--csv")?)),
            _ => bail!("unknown argument '{arg}'\n{USAGE}"),
        }
    }
    Ok(parsed)
}

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args = parse_args()?;

    let range = DateRange::parse(args.range.as_deref(), None, None)
        .map_err(|e| anyhow!("{e}\n{USAGE}"))?;
    let sort = match args.sort.as_deref() {
        Some(key) => {
            SortKey::parse(key).ok_or_else(|| anyhow!("unknown sort key '{key}'\n{USAGE}"))?
        }
        None => SortKey::TotalRevenue,
    };
    let filter = GeneratorFilter::from_csv(
        args.regions.as_deref(),
        args.fuels.as_deref(),
        args.search.as_deref(),
    );
    let top = args.top.unwrap_or(REVENUE_LEADERBOARD_SIZE);

    let cfg = AppConfig::load()?;
    let store = PgMarketData::connect(&cfg.database).await?;

    let view = views::leaderboard(
        &store,
        &filter,
        range,
        sort,
        top,
        OffsetDateTime::now_utc(),
    )
    .await;

    if let Some(error) = &view.error {
        bail!("leaderboard query failed: {error}");
    }

    print_table(&view, range);

    if let Some(path) = &args.csv {
        write_csv(path, &view)?;
        tracing::info!(path = %path.display(), rows = view.entries.len(), "report exported");
    }

    Ok(())
}

fn print_table(view: &LeaderboardView, range: DateRange) {
    println!(
        "Generator leaderboard, last {} ({} entries)",
        range.key(),
        view.entries.len()
    );
    println!(
        "{:<5} {:<10} {:<30} {:<6} {:<12} {:>10} {:>8} {:>8} {:>8}",
        "RANK", "DUID", "STATION", "REGION", "FUEL", "REVENUE", "SHARE%", "CF%", "SCORE"
    );

    for e in &view.entries {
        println!(
            "{:<5} {:<10} {:<30} {:<6} {:<12} {:>10} {:>7.1}% {:>7.1}% {:>8.2}",
            e.rank,
            e.duid,
            e.station_name.as_deref().unwrap_or("-"),
            e.region.as_deref().unwrap_or("-"),
            e.fuel_source.as_deref().unwrap_or("-"),
            fmt_revenue(e.total_revenue),
            e.market_share_pct,
            e.capacity_factor_pct,
            e.performance_score,
        );
    }

    println!("Market total: {}", fmt_revenue(view.market_revenue));
}

fn write_csv(path: &std::path::Path, view: &LeaderboardView) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "rank",
        "duid",
        "station_name",
        "region",
        "fuel_source",
        "total_revenue",
        "market_share_pct",
        "avg_power_mw",
        "capacity_factor_pct",
        "revenue_per_mw",
        "performance_score",
    ])?;

    for e in &view.entries {
        writer.write_record([
            e.rank.to_string(),
            e.duid.clone(),
            e.station_name.clone().unwrap_or_default(),
            e.region.clone().unwrap_or_default(),
            e.fuel_source.clone().unwrap_or_default(),
            format!("{:.2}", e.total_revenue),
            format!("{:.2}", e.market_share_pct),
            format!("{:.2}", e.avg_power_mw),
            format!("{:.2}", e.capacity_factor_pct),
            format!("{:.2}", e.revenue_per_mw),
            format!("{:.4}", e.performance_score),
        ])?;
    }

    writer.flush()?;
    Ok(())
}
