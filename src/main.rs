use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use food_dashboard::{
    claims_by_food, demand, explorer, overview, query_entry, session_table, top_n, top_receivers,
    ClaimSort, DashboardConfig, DatasetRegistry, FilterOptions, FilterSelection, QueryKey, Role,
    Table,
};

#[derive(Parser)]
#[command(name = "food-dashboard")]
#[command(about = "Food donation dashboard: filters, KPIs and rankings over precomputed query reports")]
struct Cli {
    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory with the query CSVs (overrides config and FOOD_DASHBOARD_DATA_DIR)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Global filters, "All" or omitted means no constraint
#[derive(Args, Debug, Clone)]
struct FilterArgs {
    #[arg(long)]
    city: Option<String>,

    #[arg(long)]
    provider: Option<String>,

    #[arg(long)]
    food: Option<String>,
}

impl FilterArgs {
    fn selection(&self) -> FilterSelection {
        FilterSelection::global(self.city.clone(), self.provider.clone(), self.food.clone())
    }
}

#[derive(Subcommand)]
enum Command {
    /// KPI cards and provider-type contribution
    Overview(FilterArgs),

    /// Selectable values for the global filters
    Filters,

    /// Every query (or one) after filters, with chart suggestion
    Query {
        /// Query key (q01..q15); all queries when omitted
        key: Option<String>,

        /// Rows to print per table
        #[arg(long, default_value_t = 20)]
        rows: usize,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Top-N rows of a query by a metric role
    Top {
        key: String,

        #[arg(long, default_value = "claims")]
        metric: String,

        #[arg(long, default_value = "name")]
        label: String,

        #[arg(short, default_value_t = 10)]
        n: usize,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Top receivers and claims by food item
    Claims {
        #[arg(short, default_value_t = food_dashboard::views::TOP_RECEIVERS_DEFAULT)]
        n: usize,

        /// Sort claims by food item by "claims" or "quantity"
        #[arg(long, default_value = "claims")]
        sort: String,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Most demanded food types per city
    Demand {
        /// Local city view on top of the global filters
        #[arg(long)]
        local_city: Option<String>,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Write a filtered query as CSV to stdout
    Export {
        key: String,

        #[command(flatten)]
        filters: FilterArgs,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = DashboardConfig::load(cli.config.as_deref(), cli.data_dir.clone())?;
    info!("data directory: {}", config.data_dir.display());

    let registry = DatasetRegistry::open(config);

    match cli.command {
        Command::Overview(filters) => run_overview(&registry, &filters.selection()),
        Command::Filters => run_filters(&registry),
        Command::Query { key, rows, filters } => run_query(&registry, key, rows, &filters.selection()),
        Command::Top { key, metric, label, n, filters } => {
            run_top(&registry, &key, &metric, &label, n, &filters.selection())
        }
        Command::Claims { n, sort, filters } => run_claims(&registry, n, &sort, &filters.selection()),
        Command::Demand { local_city, filters } => {
            run_demand(&registry, local_city.as_deref(), &filters.selection())
        }
        Command::Export { key, filters } => run_export(&registry, &key, &filters.selection()),
    }
}

fn run_overview(registry: &DatasetRegistry, selection: &FilterSelection) -> Result<()> {
    let overview = overview(registry, selection);

    println!("🌍 Food Waste Dashboard - Overview");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("  Total Food Quantity : {}", overview.total_quantity);
    println!("  Top City (Listings) : {}", overview.top_city);
    println!("  Top Provider        : {}", overview.top_provider);

    let missing = [
        overview.total_quantity.is_available(),
        overview.top_city.is_available(),
        overview.top_provider.is_available(),
    ]
    .iter()
    .filter(|available| !**available)
    .count();
    if missing > 0 {
        println!("  ⚠️  {} KPI(s) have no data; check the data directory or loosen the filters", missing);
    }

    println!("\nProvider Type Contribution");
    match overview.provider_contribution {
        Some(points) if !points.is_empty() => {
            let total: f64 = points.iter().filter_map(|p| p.value).sum();
            for p in points {
                let value = p.value.unwrap_or(0.0);
                let pct = if total > 0.0 { value / total * 100.0 } else { 0.0 };
                println!("  {:<30} {:>12.2} {:>6.1}%", p.label, value, pct);
            }
        }
        Some(_) => println!("  No data available after filters applied."),
        None => println!("  q02 does not contain expected columns for a share chart."),
    }

    Ok(())
}

fn run_filters(registry: &DatasetRegistry) -> Result<()> {
    let options = FilterOptions::collect(registry);

    for (name, values) in [
        ("City", &options.cities),
        ("Provider", &options.providers),
        ("Food Type", &options.food_types),
    ] {
        println!("{} ({})", name, values.len() - 1);
        for v in values {
            println!("  {}", v);
        }
    }

    Ok(())
}

fn run_query(
    registry: &DatasetRegistry,
    key: Option<String>,
    rows: usize,
    selection: &FilterSelection,
) -> Result<()> {
    let entries = match key {
        Some(k) => vec![query_entry(registry, selection, None, k.parse::<QueryKey>()?)],
        None => explorer(registry, selection, None),
    };

    for entry in entries {
        println!("\n📊 {} - {}", entry.title, entry.key.code().to_uppercase());
        println!("Business question: {}", entry.question);

        if entry.table.is_empty() {
            println!("No data available after filters applied.");
            continue;
        }

        print!("{}", entry.table.head(rows));
        if entry.table.row_count() > rows {
            println!("... {} more rows", entry.table.row_count() - rows);
        }

        if let Some(chart) = entry.chart {
            if let (Some(label), Some(metric)) = (&chart.label_column, &chart.metric_column) {
                println!("Chart: {} by {} (top {})", metric, label, chart.table.row_count());
            }
        }
    }

    Ok(())
}

fn run_top(
    registry: &DatasetRegistry,
    key: &str,
    metric: &str,
    label: &str,
    n: usize,
    selection: &FilterSelection,
) -> Result<()> {
    let key: QueryKey = key.parse()?;
    let metric: Role = metric.parse()?;
    let label: Role = label.parse()?;

    let table = session_table(registry, selection, None, key);
    let ranking = top_n(&table, metric, label, n);

    if !ranking.ordered {
        println!("⚠️  {} has no {} column; showing rows unordered", key, metric.name());
    }
    print!("{}", ranking.table);

    Ok(())
}

fn run_claims(registry: &DatasetRegistry, n: usize, sort: &str, selection: &FilterSelection) -> Result<()> {
    let sort: ClaimSort = sort.parse()?;

    println!("📦 Top Receivers by Claims (q04)");
    match top_receivers(registry, selection, None, n) {
        Some(ranking) => print!("{}", ranking.table),
        None => println!("No q04 data after filters."),
    }

    println!("\n📦 Claims by Food Item (q08)");
    match claims_by_food(registry, selection, None, sort) {
        Some(ranking) => print!("{}", ranking.table),
        None => println!("No q08 data after filters."),
    }

    Ok(())
}

fn run_demand(registry: &DatasetRegistry, local_city: Option<&str>, selection: &FilterSelection) -> Result<()> {
    println!("🔮 Most Demanded Food Types (q14)");

    let Some(demand) = demand(registry, selection, local_city) else {
        println!("No q14 rows after filters.");
        return Ok(());
    };

    println!("Local city options: {}", demand.cities.join(", "));
    match demand.ranking {
        Some(ranking) => print!("{}", ranking.table),
        None => print!("{}", demand.table),
    }

    Ok(())
}

fn run_export(registry: &DatasetRegistry, key: &str, selection: &FilterSelection) -> Result<()> {
    let key: QueryKey = key.parse()?;
    let table: Table = session_table(registry, selection, None, key);

    if table.is_empty() {
        eprintln!("No data to download.");
        return Ok(());
    }

    let bytes = table.to_csv_bytes()?;
    std::io::stdout()
        .write_all(&bytes)
        .context("Failed to write CSV to stdout")?;

    Ok(())
}
