// 📊 Aggregation / KPI Layer
// Scalar sums, first-row lookups and top-N rankings over filtered tables.
// Every function is total: missing columns degrade to NotAvailable or an unordered fallback.

use crate::roles::{resolve, resolve_label, Role};
use crate::table::{parse_number, Table};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

// ============================================================================
// KPI VALUES
// ============================================================================

/// A scalar KPI, or the "not available" sentinel (distinct from zero)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Kpi<T> {
    Available(T),
    NotAvailable,
}

impl<T> Kpi<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Kpi::Available(_))
    }
}

impl fmt::Display for Kpi<f64> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kpi::Available(v) if v.fract() == 0.0 && v.abs() < 1e15 => write!(f, "{:.0}", v),
            Kpi::Available(v) => write!(f, "{:.2}", v),
            Kpi::NotAvailable => f.write_str("N/A"),
        }
    }
}

impl fmt::Display for Kpi<String> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kpi::Available(v) => f.write_str(v),
            Kpi::NotAvailable => f.write_str("N/A"),
        }
    }
}

/// Sum the numeric cells of `role`'s column. Non-numeric and missing cells are excluded.
///
/// NotAvailable when the table is empty or the role does not resolve.
pub fn scalar_sum(table: &Table, role: Role) -> Kpi<f64> {
    if table.is_empty() {
        return Kpi::NotAvailable;
    }

    match resolve(table, role) {
        Some(column) => Kpi::Available(table.column_values(column).filter_map(parse_number).sum()),
        None => Kpi::NotAvailable,
    }
}

/// First non-missing value of `role`'s column, in row order.
///
/// Tables are assumed to be ranked by their source query, so the first row is the "top" one.
pub fn first_value(table: &Table, role: Role) -> Kpi<String> {
    resolve(table, role)
        .and_then(|column| table.column_values(column).flatten().next())
        .map(|v| Kpi::Available(v.to_string()))
        .unwrap_or(Kpi::NotAvailable)
}

// ============================================================================
// RANKINGS
// ============================================================================

/// One bar / slice of a chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub label: String,
    pub value: Option<f64>,
}

/// Ranking - chart-ready sub-table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranking {
    pub label_column: Option<String>,
    pub metric_column: Option<String>,
    /// False when the metric did not resolve and rows are in source order
    pub ordered: bool,
    pub table: Table,
}

impl Ranking {
    /// (label, metric) pairs for plotting. Empty when the metric is unresolved.
    pub fn points(&self) -> Vec<ChartPoint> {
        let (Some(label), Some(metric)) = (&self.label_column, &self.metric_column) else {
            return Vec::new();
        };

        self.table
            .column_values(label)
            .zip(self.table.column_values(metric))
            .map(|(l, m)| ChartPoint {
                label: l.unwrap_or("").to_string(),
                value: parse_number(m),
            })
            .collect()
    }
}

/// Descending numeric order; non-numeric values sink to the bottom
fn descending(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable descending sort on `column`. Ties keep their source order.
pub fn sort_desc(table: &Table, column: &str) -> Table {
    let mut keyed: Vec<(usize, Option<f64>)> = table
        .column_values(column)
        .map(parse_number)
        .enumerate()
        .collect();

    keyed.sort_by(|a, b| descending(a.1, b.1));
    table.take_rows(keyed.into_iter().map(|(i, _)| i))
}

/// Top `n` rows by `metric`, labelled by `label`.
///
/// The result is projected to the label and metric columns. When the metric
/// does not resolve, the first `n` rows are returned unordered and unprojected.
/// When the label does not resolve, the first column stands in.
pub fn top_n(table: &Table, metric: Role, label: Role, n: usize) -> Ranking {
    rank_columns(table, resolve(table, metric), resolve_label(table, label), n)
}

/// `top_n` over already-resolved column names
pub fn rank_columns(table: &Table, metric: Option<&str>, label: Option<&str>, n: usize) -> Ranking {
    let label_column = label.filter(|l| table.has_column(l)).map(str::to_string);

    let Some(metric_column) = metric.filter(|m| table.has_column(m)) else {
        return Ranking {
            label_column,
            metric_column: None,
            ordered: false,
            table: table.head(n),
        };
    };

    let mut keep: Vec<&str> = Vec::with_capacity(2);
    if let Some(l) = label_column.as_deref() {
        if l != metric_column {
            keep.push(l);
        }
    }
    keep.push(metric_column);

    Ranking {
        table: sort_desc(table, metric_column).head(n).project(&keep),
        label_column,
        metric_column: Some(metric_column.to_string()),
        ordered: true,
    }
}

/// Name/value pairs for a share (pie) chart, or None when either role is missing
pub fn shares(table: &Table, name: Role, value: Role) -> Option<Vec<ChartPoint>> {
    let name_column = resolve(table, name)?;
    let value_column = resolve(table, value)?;

    Some(
        table
            .column_values(name_column)
            .zip(table.column_values(value_column))
            .map(|(n, v)| ChartPoint {
                label: n.unwrap_or("").to_string(),
                value: parse_number(v),
            })
            .collect(),
    )
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn receivers() -> Table {
        Table::from_rows(
            &["Receiver_Name", "Claims"],
            &[&["A", "5"], &["B", "9"], &["C", "9"], &["D", "2"]],
        )
    }

    #[test]
    fn test_top_n_ties_keep_source_order() {
        let ranking = top_n(&receivers(), Role::ClaimCount, Role::NameLabel, 2);

        assert!(ranking.ordered);
        assert_eq!(ranking.metric_column.as_deref(), Some("Claims"));
        assert_eq!(ranking.label_column.as_deref(), Some("Receiver_Name"));
        assert_eq!(
            ranking.table,
            Table::from_rows(&["Receiver_Name", "Claims"], &[&["B", "9"], &["C", "9"]])
        );
    }

    #[test]
    fn test_top_n_is_idempotent() {
        let first = top_n(&receivers(), Role::ClaimCount, Role::NameLabel, 3);
        let second = top_n(&receivers(), Role::ClaimCount, Role::NameLabel, 3);
        assert_eq!(first, second);

        let again = top_n(&first.table, Role::ClaimCount, Role::NameLabel, 3);
        assert_eq!(again.table, first.table);
    }

    #[test]
    fn test_top_n_projects_label_and_metric() {
        let table = Table::from_rows(
            &["Receiver_ID", "Receiver_Name", "City", "Total_Claims"],
            &[&["1", "A", "X", "3"], &["2", "B", "Y", "8"]],
        );

        let ranking = top_n(&table, Role::ClaimCount, Role::NameLabel, 5);
        assert_eq!(
            ranking.table.columns(),
            &["Receiver_Name".to_string(), "Total_Claims".to_string()]
        );
        assert_eq!(ranking.table.text(0, "Receiver_Name"), Some("B"));
    }

    #[test]
    fn test_top_n_without_metric_falls_back_to_head() {
        let table = Table::from_rows(&["Month", "Status"], &[&["Jan", "x"], &["Feb", "y"], &["Mar", "z"]]);

        let ranking = top_n(&table, Role::ClaimCount, Role::NameLabel, 2);
        assert!(!ranking.ordered);
        assert_eq!(ranking.metric_column, None);
        assert_eq!(ranking.label_column.as_deref(), Some("Month"));
        assert_eq!(ranking.table, table.head(2));
        assert!(ranking.points().is_empty());
    }

    #[test]
    fn test_non_numeric_metric_sinks() {
        let table = Table::from_rows(
            &["Name", "Claims"],
            &[&["A", "n/a"], &["B", "1"], &["C", ""], &["D", "4"]],
        );

        let sorted = sort_desc(&table, "Claims");
        let names: Vec<_> = sorted.column_values("Name").flatten().collect();
        assert_eq!(names, vec!["D", "B", "A", "C"]);
    }

    #[test]
    fn test_rank_columns_with_explicit_label() {
        let table = Table::from_rows(
            &["Provider_Type", "Total_Quantity"],
            &[&["Restaurant", "3"], &["Grocery", "12"]],
        );

        let ranking = rank_columns(&table, Some("Total_Quantity"), Some("Provider_Type"), 1);
        assert_eq!(ranking.points()[0].label, "Grocery");

        let unknown = rank_columns(&table, Some("Nope"), Some("Provider_Type"), 5);
        assert!(!unknown.ordered);
        assert_eq!(unknown.table, table);
    }

    #[test]
    fn test_ranking_points() {
        let ranking = top_n(&receivers(), Role::ClaimCount, Role::NameLabel, 1);
        assert_eq!(
            ranking.points(),
            vec![ChartPoint { label: "B".to_string(), value: Some(9.0) }]
        );
    }

    #[test]
    fn test_scalar_sum_excludes_non_numeric() {
        let table = Table::from_rows(
            &["Provider_Type", "Total_Quantity"],
            &[&["Restaurant", "10"], &["Grocery", "2.5"], &["Other", "?"], &["Farm", ""]],
        );

        let total = scalar_sum(&table, Role::Quantity);
        assert_eq!(total, Kpi::Available(12.5));
        assert!(total.is_available());
    }

    #[test]
    fn test_scalar_sum_not_available() {
        assert_eq!(scalar_sum(&Table::empty(), Role::Quantity), Kpi::NotAvailable);

        let no_qty = Table::from_rows(&["Name"], &[&["A"]]);
        assert_eq!(scalar_sum(&no_qty, Role::Quantity), Kpi::NotAvailable);

        let filtered_out = Table::from_rows(&["Quantity"], &[]);
        assert!(!scalar_sum(&filtered_out, Role::Quantity).is_available());
    }

    #[test]
    fn test_first_value_skips_missing() {
        let table = Table::from_rows(&["Location", "Listings"], &[&["", "50"], &["Pune", "40"]]);
        assert_eq!(first_value(&table, Role::City), Kpi::Available("Pune".to_string()));
        assert_eq!(first_value(&table, Role::ProviderName), Kpi::NotAvailable);
        assert_eq!(first_value(&Table::empty(), Role::City), Kpi::NotAvailable);
    }

    #[test]
    fn test_kpi_display() {
        assert_eq!(Kpi::Available(1200.0).to_string(), "1200");
        assert_eq!(Kpi::Available(12.5).to_string(), "12.50");
        assert_eq!(Kpi::<f64>::NotAvailable.to_string(), "N/A");
        assert_eq!(Kpi::Available("Pune".to_string()).to_string(), "Pune");
    }

    #[test]
    fn test_kpi_serializes_status() {
        let json = serde_json::to_value(Kpi::Available(3.0)).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "available", "value": 3.0 }));

        let json = serde_json::to_value(Kpi::<f64>::NotAvailable).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "not_available" }));
    }

    #[test]
    fn test_shares() {
        let table = Table::from_rows(
            &["Provider_Type", "Total_Quantity"],
            &[&["Restaurant", "10"], &["Grocery", "5"]],
        );

        let points = shares(&table, Role::ContributionName, Role::ContributionValue).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].label, "Restaurant");
        assert_eq!(points[1].value, Some(5.0));

        let no_value = Table::from_rows(&["Provider_Type"], &[&["Restaurant"]]);
        assert!(shares(&no_value, Role::ContributionName, Role::ContributionValue).is_none());
    }
}
