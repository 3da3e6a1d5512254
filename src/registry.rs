// 🗄️ Dataset Registry - the fifteen precomputed query tables
// Loaded once, cached, shared read-only. A broken source becomes an empty table.

use crate::config::DashboardConfig;
use crate::error::DashboardError;
use crate::table::Table;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

// ============================================================================
// QUERY CATALOG
// ============================================================================

/// QueryKey - stable identifier of one precomputed report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QueryKey {
    #[serde(rename = "q01")]
    Q01,
    #[serde(rename = "q02")]
    Q02,
    #[serde(rename = "q03")]
    Q03,
    #[serde(rename = "q04")]
    Q04,
    #[serde(rename = "q05")]
    Q05,
    #[serde(rename = "q06")]
    Q06,
    #[serde(rename = "q07")]
    Q07,
    #[serde(rename = "q08")]
    Q08,
    #[serde(rename = "q09")]
    Q09,
    #[serde(rename = "q10")]
    Q10,
    #[serde(rename = "q11")]
    Q11,
    #[serde(rename = "q12")]
    Q12,
    #[serde(rename = "q13")]
    Q13,
    #[serde(rename = "q14")]
    Q14,
    #[serde(rename = "q15")]
    Q15,
}

impl QueryKey {
    pub const ALL: [QueryKey; 15] = [
        QueryKey::Q01,
        QueryKey::Q02,
        QueryKey::Q03,
        QueryKey::Q04,
        QueryKey::Q05,
        QueryKey::Q06,
        QueryKey::Q07,
        QueryKey::Q08,
        QueryKey::Q09,
        QueryKey::Q10,
        QueryKey::Q11,
        QueryKey::Q12,
        QueryKey::Q13,
        QueryKey::Q14,
        QueryKey::Q15,
    ];

    /// Short code ("q01")
    pub fn code(&self) -> &'static str {
        match self {
            QueryKey::Q01 => "q01",
            QueryKey::Q02 => "q02",
            QueryKey::Q03 => "q03",
            QueryKey::Q04 => "q04",
            QueryKey::Q05 => "q05",
            QueryKey::Q06 => "q06",
            QueryKey::Q07 => "q07",
            QueryKey::Q08 => "q08",
            QueryKey::Q09 => "q09",
            QueryKey::Q10 => "q10",
            QueryKey::Q11 => "q11",
            QueryKey::Q12 => "q12",
            QueryKey::Q13 => "q13",
            QueryKey::Q14 => "q14",
            QueryKey::Q15 => "q15",
        }
    }

    /// Cleaned CSV shipped for this query
    pub fn default_file_name(&self) -> &'static str {
        match self {
            QueryKey::Q01 => "query01_city_provider_receiver_counts_cleaned.csv",
            QueryKey::Q02 => "query02_To_contributing_provider_type_cleaned.csv",
            QueryKey::Q03 => "query03_all_provider_contacts_cleaned.csv",
            QueryKey::Q04 => "query04_receivers_with_most_claims_cleaned.csv",
            QueryKey::Q05 => "query05_total_food_quantity_cleaned.csv",
            QueryKey::Q06 => "query06_city_with_highest_listings_cleaned.csv",
            QueryKey::Q07 => "query07_Most_common_food_types_cleaned.csv",
            QueryKey::Q08 => "query08_food_claims_by_item_cleaned.csv",
            QueryKey::Q09 => "query09_provider_with_highest_successful_claims_cleaned.csv",
            QueryKey::Q10 => "query10_Claim_status_percentages_cleaned.csv",
            QueryKey::Q11 => "query11_avg_claim_quantity_cleaned.csv",
            QueryKey::Q12 => "query12_Most_claimed_meal_type_cleaned.csv",
            QueryKey::Q13 => "query13_quantity_donated_per_provider_cleaned.csv",
            QueryKey::Q14 => "query14_most_demanded_food_type_per_city_cleaned.csv",
            QueryKey::Q15 => "query15_peak_claim_month_cleaned.csv",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            QueryKey::Q01 => "Cities with Provider & Receiver Counts",
            QueryKey::Q02 => "Top Contributing Provider Types",
            QueryKey::Q03 => "All Provider Contact Details",
            QueryKey::Q04 => "Receivers with Most Claims",
            QueryKey::Q05 => "Total Food Quantity Donated",
            QueryKey::Q06 => "City with Highest Listings",
            QueryKey::Q07 => "Most Common Food Types",
            QueryKey::Q08 => "Food Claims by Item",
            QueryKey::Q09 => "Provider with Highest Successful Claims",
            QueryKey::Q10 => "Claim Status Percentages",
            QueryKey::Q11 => "Average Claim Quantity per Claim",
            QueryKey::Q12 => "Most Claimed Meal Type",
            QueryKey::Q13 => "Quantity Donated per Provider",
            QueryKey::Q14 => "Most Demanded Food Type per City",
            QueryKey::Q15 => "Peak Claim Month",
        }
    }

    /// The business question the query answers
    pub fn question(&self) -> &'static str {
        match self {
            QueryKey::Q01 => "Which cities have the most providers and receivers (counts)?",
            QueryKey::Q02 => "Which provider types contribute the most quantity?",
            QueryKey::Q03 => "List all provider contact details.",
            QueryKey::Q04 => "Which receivers have the most claims?",
            QueryKey::Q05 => "What is the total food quantity donated (overall / by filter)?",
            QueryKey::Q06 => "Which city has the highest number of listings?",
            QueryKey::Q07 => "Which food types are most common?",
            QueryKey::Q08 => "Which food items receive the most claims?",
            QueryKey::Q09 => "Which provider has the highest number of successful claims?",
            QueryKey::Q10 => "What are the percentages of claim statuses (Cancelled, Completed, etc.)?",
            QueryKey::Q11 => "What is the average claim quantity per claimant?",
            QueryKey::Q12 => "Which meal types (Breakfast/Lunch/Dinner) are claimed most often?",
            QueryKey::Q13 => "How much quantity does each provider donate?",
            QueryKey::Q14 => "Which food types are most demanded in each city?",
            QueryKey::Q15 => "Which month(s) have peak claims?",
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for QueryKey {
    type Err = DashboardError;

    /// Accepts "q04", "Q04", "4" and "04"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix('q')
            .or_else(|| trimmed.strip_prefix('Q'))
            .unwrap_or(trimmed);

        digits
            .parse::<usize>()
            .ok()
            .filter(|n| (1..=QueryKey::ALL.len()).contains(n))
            .map(|n| QueryKey::ALL[n - 1])
            .ok_or_else(|| DashboardError::UnknownQuery(s.to_string()))
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Load outcome for one key
#[derive(Debug, Clone, Serialize)]
pub struct SourceStatus {
    pub key: QueryKey,
    pub source: PathBuf,
    pub available: bool,
    pub rows: usize,
    pub columns: usize,
    pub loaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct LoadedTable {
    table: Arc<Table>,
    status: SourceStatus,
}

/// DatasetRegistry - owns the immutable base tables
///
/// Constructed once at process start and passed by reference (or `Arc`) to
/// every consumer. `load` is idempotent: the backing file is read at most once
/// per key, later calls return the cached `Arc<Table>`.
pub struct DatasetRegistry {
    config: DashboardConfig,
    cache: RwLock<HashMap<QueryKey, LoadedTable>>,
}

impl DatasetRegistry {
    /// Create a registry without touching the disk
    pub fn new(config: DashboardConfig) -> Self {
        DatasetRegistry {
            config,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry and eagerly load every query
    pub fn open(config: DashboardConfig) -> Self {
        let registry = DatasetRegistry::new(config);
        registry.load_all();
        registry
    }

    /// Registry pre-seeded with in-memory tables. Keys not given load from the
    /// default config location on first use.
    pub fn from_tables<I>(tables: I) -> Self
    where
        I: IntoIterator<Item = (QueryKey, Table)>,
    {
        let now = Utc::now();
        let config = DashboardConfig::default();
        let cache = tables
            .into_iter()
            .map(|(key, table)| {
                let status = SourceStatus {
                    key,
                    source: PathBuf::from("<memory>"),
                    available: true,
                    rows: table.row_count(),
                    columns: table.column_count(),
                    loaded_at: now,
                };
                (key, LoadedTable { table: Arc::new(table), status })
            })
            .collect();

        DatasetRegistry {
            config,
            cache: RwLock::new(cache),
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Table for `key`; never fails. Unreadable sources yield `Table::empty()`.
    pub fn load(&self, key: QueryKey) -> Arc<Table> {
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(loaded) = cache.get(&key) {
                debug!(query = %key, "cache hit");
                return Arc::clone(&loaded.table);
            }
        }

        let loaded = self.read_source(key);

        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        // Another caller may have filled the slot while we were reading
        let entry = cache.entry(key).or_insert(loaded);
        Arc::clone(&entry.table)
    }

    /// Load every query key
    pub fn load_all(&self) {
        for key in QueryKey::ALL {
            self.load(key);
        }
    }

    /// Every query with its table, in key order
    pub fn tables(&self) -> Vec<(QueryKey, Arc<Table>)> {
        QueryKey::ALL.iter().map(|&k| (k, self.load(k))).collect()
    }

    /// Load outcome for every key that has been loaded so far
    pub fn status(&self) -> Vec<SourceStatus> {
        let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
        let mut statuses: Vec<SourceStatus> = cache.values().map(|l| l.status.clone()).collect();
        statuses.sort_by_key(|s| s.key);
        statuses
    }

    fn read_source(&self, key: QueryKey) -> LoadedTable {
        let path = self.config.path_for(key);

        let (table, available) = match Table::from_path(&path) {
            Ok(table) => {
                info!(
                    query = %key,
                    rows = table.row_count(),
                    columns = table.column_count(),
                    "loaded {}",
                    path.display()
                );
                (table, true)
            }
            Err(e) => {
                warn!(query = %key, "source unavailable ({}): {}", path.display(), e);
                (Table::empty(), false)
            }
        };

        let status = SourceStatus {
            key,
            source: path,
            available,
            rows: table.row_count(),
            columns: table.column_count(),
            loaded_at: Utc::now(),
        };

        LoadedTable { table: Arc::new(table), status }
    }
}

// ============================================================================
// TESTS
// ============================================================================
