// 🧭 Views - descriptive aggregates consumed by the presentation layer
// Each view = Registry → Filter Engine → (session working copy) → Aggregation.

use crate::aggregate::{
    first_value, rank_columns, scalar_sum, shares, top_n, ChartPoint, Kpi, Ranking,
};
use crate::error::DashboardError;
use crate::filter::{apply, collect_values_in, with_all, FilterSelection, ALL};
use crate::registry::{DatasetRegistry, QueryKey};
use crate::roles::{resolve, Role};
use crate::session::{SessionEditStore, WorkingCopy};
use crate::table::Table;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Rows shown in a query explorer chart
pub const EXPLORER_CHART_ROWS: usize = 20;
/// Rows shown in the claims-by-food and demand charts
pub const DETAIL_CHART_ROWS: usize = 30;

pub const TOP_RECEIVERS_DEFAULT: usize = 10;
pub const TOP_RECEIVERS_MIN: usize = 3;
pub const TOP_RECEIVERS_MAX: usize = 50;

/// Queries exposed as editable entity tables
pub const EDITABLE_QUERIES: [QueryKey; 3] = [QueryKey::Q03, QueryKey::Q04, QueryKey::Q13];

/// Filtered table for `key`, or the session's working copy when one exists
pub fn session_table(
    registry: &DatasetRegistry,
    selection: &FilterSelection,
    session: Option<&SessionEditStore>,
    key: QueryKey,
) -> Table {
    match session.and_then(|s| s.get(key)) {
        Some(copy) => copy.table().clone(),
        None => apply(&registry.load(key), selection),
    }
}

// ============================================================================
// OVERVIEW
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub total_quantity: Kpi<f64>,
    pub top_city: Kpi<String>,
    pub top_provider: Kpi<String>,
    /// Provider-type shares from q02; None when the table lacks either column
    pub provider_contribution: Option<Vec<ChartPoint>>,
}

pub fn overview(registry: &DatasetRegistry, selection: &FilterSelection) -> Overview {
    let total_quantity = scalar_sum(&apply(&registry.load(QueryKey::Q05), selection), Role::Quantity);
    let top_city = first_value(&apply(&registry.load(QueryKey::Q06), selection), Role::City);

    // q13 stands in only when q09 has no data at all, not when filters empty it
    let q09 = registry.load(QueryKey::Q09);
    let top_provider = if !q09.is_empty() {
        first_value(&apply(&q09, selection), Role::ProviderName)
    } else {
        let q13 = registry.load(QueryKey::Q13);
        if q13.is_empty() {
            Kpi::NotAvailable
        } else {
            first_value(&apply(&q13, selection), Role::ProviderName)
        }
    };

    let provider_contribution = shares(
        &apply(&registry.load(QueryKey::Q02), selection),
        Role::ContributionName,
        Role::ContributionValue,
    );

    Overview {
        total_quantity,
        top_city,
        top_provider,
        provider_contribution,
    }
}

// ============================================================================
// QUERY EXPLORER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryEntry {
    pub key: QueryKey,
    pub title: &'static str,
    pub question: &'static str,
    /// True when `table` is the session's working copy
    pub edited: bool,
    pub table: Table,
    pub chart: Option<Ranking>,
}

/// Chart heuristic for an arbitrary query table
///
/// Claims metric + a name/food/location label wins; otherwise a quantity
/// metric labelled by the first column; otherwise no chart.
pub fn chart_suggestion(table: &Table) -> Option<Ranking> {
    if table.is_empty() {
        return None;
    }

    let claims = resolve(table, Role::ClaimCount);
    let label = resolve(table, Role::ChartLabel);
    if claims.is_some() && label.is_some() {
        return Some(rank_columns(table, claims, label, EXPLORER_CHART_ROWS));
    }

    let quantity = resolve(table, Role::Quantity);
    if quantity.is_some() && table.column_count() >= 2 {
        let first = table.columns().first().map(String::as_str);
        return Some(rank_columns(table, quantity, first, EXPLORER_CHART_ROWS));
    }

    None
}

/// One entry per query, in key order
pub fn explorer(
    registry: &DatasetRegistry,
    selection: &FilterSelection,
    session: Option<&SessionEditStore>,
) -> Vec<QueryEntry> {
    QueryKey::ALL
        .iter()
        .map(|&key| query_entry(registry, selection, session, key))
        .collect()
}

pub fn query_entry(
    registry: &DatasetRegistry,
    selection: &FilterSelection,
    session: Option<&SessionEditStore>,
    key: QueryKey,
) -> QueryEntry {
    let edited = session.map_or(false, |s| s.get(key).is_some());
    let table = session_table(registry, selection, session, key);
    let chart = chart_suggestion(&table);

    QueryEntry {
        key,
        title: key.title(),
        question: key.question(),
        edited,
        table,
        chart,
    }
}

// ============================================================================
// CLAIMS
// ============================================================================

/// Metric for the claims-by-food chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimSort {
    #[default]
    Claims,
    Quantity,
}

impl ClaimSort {
    fn metric(&self) -> Role {
        match self {
            ClaimSort::Claims => Role::ClaimCount,
            ClaimSort::Quantity => Role::ClaimedQuantity,
        }
    }
}

impl FromStr for ClaimSort {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "claims" | "total claims" => Ok(ClaimSort::Claims),
            "quantity" | "total quantity" => Ok(ClaimSort::Quantity),
            _ => Err(DashboardError::UnknownRole(s.to_string())),
        }
    }
}

/// Top-N receivers by claims (q04). None when there is no data after filters.
pub fn top_receivers(
    registry: &DatasetRegistry,
    selection: &FilterSelection,
    session: Option<&SessionEditStore>,
    n: usize,
) -> Option<Ranking> {
    let table = session_table(registry, selection, session, QueryKey::Q04);
    if table.is_empty() {
        return None;
    }

    let n = n.clamp(TOP_RECEIVERS_MIN, TOP_RECEIVERS_MAX);
    Some(top_n(&table, Role::ClaimCount, Role::NameLabel, n))
}

/// Claims by food item (q08), sorted by the chosen metric
pub fn claims_by_food(
    registry: &DatasetRegistry,
    selection: &FilterSelection,
    session: Option<&SessionEditStore>,
    sort: ClaimSort,
) -> Option<Ranking> {
    let table = session_table(registry, selection, session, QueryKey::Q08);
    if table.is_empty() {
        return None;
    }

    Some(top_n(&table, sort.metric(), Role::FoodLabel, DETAIL_CHART_ROWS))
}

// ============================================================================
// PREDICTIONS (descriptive demand)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Demand {
    /// Local city choices, "All" first
    pub cities: Vec<String>,
    pub table: Table,
    /// None when the table has no count column or no food type
    pub ranking: Option<Ranking>,
}

const FOOD_TYPE_COLUMN: &str = "Food_Type";

/// Make sure a `Food_Type` column exists, renaming or copying a synonym
fn standardize_food_type(table: &mut Table) {
    if table.has_column(FOOD_TYPE_COLUMN) {
        return;
    }

    if let Some(idx) = table.column_index("FoodType") {
        table.rename_column_at(idx, FOOD_TYPE_COLUMN);
    } else if let Some(idx) = table.column_index("Food_Name") {
        table.add_column(FOOD_TYPE_COLUMN, |row| row[idx].clone());
    }
}

/// Most demanded food types (q14), with an optional local city narrowing
pub fn demand(
    registry: &DatasetRegistry,
    selection: &FilterSelection,
    local_city: Option<&str>,
) -> Option<Demand> {
    let mut table = apply(&registry.load(QueryKey::Q14), selection);
    if table.is_empty() {
        return None;
    }

    standardize_food_type(&mut table);

    let cities = with_all(collect_values_in(&table, Role::City));
    if let Some(city) = local_city.filter(|c| *c != ALL) {
        table = apply(&table, &FilterSelection::new().with(Role::City, city));
    }

    let count = resolve(&table, Role::ClaimOrCount);
    let ranking = (count.is_some() && table.has_column(FOOD_TYPE_COLUMN))
        .then(|| rank_columns(&table, count, Some(FOOD_TYPE_COLUMN), DETAIL_CHART_ROWS));

    Some(Demand {
        cities,
        table,
        ranking,
    })
}

// ============================================================================
// EDITABLE TABLES
// ============================================================================

/// Working copy of an editable query, forked from the filtered base on first use
pub fn editable<'s>(
    registry: &DatasetRegistry,
    selection: &FilterSelection,
    session: &'s mut SessionEditStore,
    key: QueryKey,
) -> Option<&'s mut WorkingCopy> {
    let base = registry.load(key);
    if base.is_empty() {
        return None;
    }

    Some(session.get_or_fork(key, &apply(&base, selection)))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> DatasetRegistry {
        // Unlisted queries are empty; later entries override earlier ones
        let empty = QueryKey::ALL.map(|k| (k, Table::empty()));
        DatasetRegistry::from_tables(empty.into_iter().chain([
            (
                QueryKey::Q02,
                Table::from_rows(
                    &["Provider_Type", "Total_Quantity"],
                    &[&["Restaurant", "120"], &["Grocery Store", "80"]],
                ),
            ),
            (
                QueryKey::Q04,
                Table::from_rows(
                    &["Receiver_Name", "Location", "Claims"],
                    &[
                        &["A", "Mumbai", "5"],
                        &["B", "Delhi", "9"],
                        &["C", "Mumbai", "9"],
                        &["D", "Mumbai", "2"],
                    ],
                ),
            ),
            (
                QueryKey::Q05,
                Table::from_rows(
                    &["Location", "Total_Quantity"],
                    &[&["Mumbai", "100"], &["Delhi", "50"], &["Mumbai", "25"]],
                ),
            ),
            (
                QueryKey::Q06,
                Table::from_rows(&["Location", "Listings"], &[&["Delhi", "40"], &["Mumbai", "30"]]),
            ),
            (
                QueryKey::Q08,
                Table::from_rows(
                    &["Food_Name", "Total_Claims", "Total_Quantity"],
                    &[&["Rice", "4", "100"], &["Bread", "9", "20"], &["Soup", "6", "60"]],
                ),
            ),
            (QueryKey::Q09, Table::empty()),
            (
                QueryKey::Q13,
                Table::from_rows(
                    &["Name", "Location", "Total_Quantity"],
                    &[&["Annapurna", "Mumbai", "300"], &["Hot Loaf", "Delhi", "200"]],
                ),
            ),
            (
                QueryKey::Q14,
                Table::from_rows(
                    &["Location", "FoodType", "Claim_Count"],
                    &[
                        &["Mumbai", "Vegan", "3"],
                        &["Mumbai", "Vegetarian", "8"],
                        &["Delhi", "Non-Vegetarian", "5"],
                    ],
                ),
            ),
            (QueryKey::Q15, Table::from_rows(&["Month", "Total_Claims"], &[&["Jan", "30"]])),
        ]))
    }

    #[test]
    fn test_overview_unfiltered() {
        let overview = overview(&registry(), &FilterSelection::new());

        assert_eq!(overview.total_quantity, Kpi::Available(175.0));
        assert_eq!(overview.top_city, Kpi::Available("Delhi".to_string()));
        // q09 is empty, so the provider comes from q13
        assert_eq!(overview.top_provider, Kpi::Available("Annapurna".to_string()));
        assert_eq!(overview.provider_contribution.unwrap().len(), 2);
    }

    #[test]
    fn test_overview_respects_filters() {
        let selection = FilterSelection::new().with(Role::City, "Mumbai");
        let overview = overview(&registry(), &selection);

        assert_eq!(overview.total_quantity, Kpi::Available(125.0));
        assert_eq!(overview.top_city, Kpi::Available("Mumbai".to_string()));
        // q02 has no city column, so its shares are unfiltered
        assert_eq!(overview.provider_contribution.unwrap().len(), 2);
    }

    #[test]
    fn test_overview_with_no_data() {
        let registry = DatasetRegistry::from_tables(QueryKey::ALL.map(|k| (k, Table::empty())));
        let overview = overview(&registry, &FilterSelection::new());

        assert_eq!(overview.total_quantity, Kpi::NotAvailable);
        assert_eq!(overview.top_city, Kpi::NotAvailable);
        assert_eq!(overview.top_provider, Kpi::NotAvailable);
        assert_eq!(overview.provider_contribution, None);
    }

    #[test]
    fn test_chart_suggestion_prefers_claims() {
        let registry = registry();
        let chart = chart_suggestion(&registry.load(QueryKey::Q08)).unwrap();

        assert_eq!(chart.metric_column.as_deref(), Some("Total_Claims"));
        assert_eq!(chart.label_column.as_deref(), Some("Food_Name"));
        assert_eq!(chart.points()[0].label, "Bread");
    }

    #[test]
    fn test_chart_suggestion_quantity_uses_first_column() {
        let registry = registry();
        let chart = chart_suggestion(&registry.load(QueryKey::Q13)).unwrap();

        assert_eq!(chart.metric_column.as_deref(), Some("Total_Quantity"));
        assert_eq!(chart.label_column.as_deref(), Some("Name"));
    }

    #[test]
    fn test_chart_suggestion_none() {
        let table = Table::from_rows(&["Status", "Percentage"], &[&["Completed", "40"]]);
        assert!(chart_suggestion(&table).is_none());
        assert!(chart_suggestion(&Table::empty()).is_none());
    }

    #[test]
    fn test_explorer_covers_every_query_in_order() {
        let entries = explorer(&registry(), &FilterSelection::new(), None);
        assert_eq!(entries.len(), 15);
        assert_eq!(entries[0].key, QueryKey::Q01);
        assert!(entries[0].table.is_empty());
        assert_eq!(entries[14].title, "Peak Claim Month");
        assert!(entries.iter().all(|e| !e.edited));
    }

    #[test]
    fn test_explorer_shows_working_copy() {
        let registry = registry();
        let mut session = SessionEditStore::new();
        let selection = FilterSelection::new();

        editable(&registry, &selection, &mut session, QueryKey::Q04)
            .unwrap()
            .table_mut()
            .remove_row(0)
            .unwrap();

        let entry = query_entry(&registry, &selection, Some(&session), QueryKey::Q04);
        assert!(entry.edited);
        assert_eq!(entry.table.row_count(), 3);
        // Base data is untouched
        assert_eq!(registry.load(QueryKey::Q04).row_count(), 4);
    }

    #[test]
    fn test_top_receivers_clamps_n() {
        let registry = registry();
        let ranking = top_receivers(&registry, &FilterSelection::new(), None, 1).unwrap();

        // n is clamped up to the minimum of 3
        assert_eq!(ranking.table.row_count(), 3);
        let names: Vec<_> = ranking.points().into_iter().map(|p| p.label).collect();
        assert_eq!(names, vec!["B", "C", "A"]);
    }

    #[test]
    fn test_top_receivers_no_data_after_filters() {
        let selection = FilterSelection::new().with(Role::City, "Chennai");
        assert!(top_receivers(&registry(), &selection, None, 10).is_none());
    }

    #[test]
    fn test_claims_by_food_sort_options() {
        let registry = registry();
        let selection = FilterSelection::new();

        let by_claims = claims_by_food(&registry, &selection, None, ClaimSort::Claims).unwrap();
        assert_eq!(by_claims.points()[0].label, "Bread");

        let by_qty = claims_by_food(&registry, &selection, None, ClaimSort::Quantity).unwrap();
        assert_eq!(by_qty.metric_column.as_deref(), Some("Total_Quantity"));
        assert_eq!(by_qty.points()[0].label, "Rice");
    }

    #[test]
    fn test_claim_sort_parsing() {
        assert_eq!("Total Claims".parse::<ClaimSort>().unwrap(), ClaimSort::Claims);
        assert_eq!("quantity".parse::<ClaimSort>().unwrap(), ClaimSort::Quantity);
        assert!("price".parse::<ClaimSort>().is_err());
    }

    #[test]
    fn test_demand_standardizes_food_type() {
        let demand = demand(&registry(), &FilterSelection::new(), None).unwrap();

        assert!(demand.table.has_column("Food_Type"));
        assert!(!demand.table.has_column("FoodType"));
        assert_eq!(demand.cities, vec!["All", "Delhi", "Mumbai"]);

        let ranking = demand.ranking.unwrap();
        assert_eq!(ranking.metric_column.as_deref(), Some("Claim_Count"));
        assert_eq!(ranking.points()[0].label, "Vegetarian");
    }

    #[test]
    fn test_demand_local_city() {
        let demand = demand(&registry(), &FilterSelection::new(), Some("Delhi")).unwrap();
        assert_eq!(demand.table.row_count(), 1);
        // Local choices still list every city from the globally filtered table
        assert_eq!(demand.cities.len(), 3);

        let all = super::demand(&registry(), &FilterSelection::new(), Some(ALL)).unwrap();
        assert_eq!(all.table.row_count(), 3);
    }

    #[test]
    fn test_demand_copies_food_name() {
        let registry = DatasetRegistry::from_tables([(
            QueryKey::Q14,
            Table::from_rows(&["Location", "Food_Name", "Count"], &[&["Pune", "Dal", "4"]]),
        )]);

        let demand = demand(&registry, &FilterSelection::new(), None).unwrap();
        assert_eq!(demand.table.text(0, "Food_Type"), Some("Dal"));
        assert_eq!(demand.table.text(0, "Food_Name"), Some("Dal"));
        assert!(demand.ranking.is_some());
    }

    #[test]
    fn test_editable_forks_filtered_table() {
        let registry = registry();
        let mut session = SessionEditStore::new();
        let selection = FilterSelection::new().with(Role::City, "Mumbai");

        let copy = editable(&registry, &selection, &mut session, QueryKey::Q13).unwrap();
        assert_eq!(copy.table().row_count(), 1);

        assert!(editable(&registry, &selection, &mut session, QueryKey::Q09).is_none());
        assert_eq!(session.keys(), vec![QueryKey::Q13]);
    }
}
