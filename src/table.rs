// 📋 Table - rectangular, untyped query results
// Columns are plain names; cells are optional text so any source schema fits.

use crate::error::{DashboardError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::Path;

/// A single cell. `None` is a missing value (empty CSV field).
pub type Cell = Option<String>;

// ============================================================================
// TABLE
// ============================================================================

/// Table - one precomputed query result
///
/// Rows always have exactly `columns.len()` cells and never hold an empty
/// string. A table with no rows or no columns is "empty" and every downstream
/// operation treats it as inert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawTable")]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

/// Wire shape of a table; deserialization goes through `Table::new`
#[derive(Deserialize)]
struct RawTable {
    columns: Vec<String>,
    #[serde(default)]
    rows: Vec<Vec<Cell>>,
}

impl From<RawTable> for Table {
    fn from(raw: RawTable) -> Self {
        Table::new(raw.columns, raw.rows)
    }
}

/// Empty text is a missing value
fn missing_if_blank(cell: Cell) -> Cell {
    cell.filter(|v| !v.is_empty())
}

/// Fit a row to `width` cells
fn normalize_row(row: Vec<Cell>, width: usize) -> Vec<Cell> {
    let mut row: Vec<Cell> = row.into_iter().take(width).map(missing_if_blank).collect();
    row.resize(width, None);
    row
}

impl Table {
    /// Build a table, padding short rows with missing cells and cutting long ones
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = columns.len();
        let rows = rows.into_iter().map(|row| normalize_row(row, width)).collect();

        Table { columns, rows }
    }

    /// The "no data" sentinel used for unavailable sources
    pub fn empty() -> Self {
        Table::default()
    }

    /// Convenience constructor for literal data (tests, demos)
    pub fn from_rows(columns: &[&str], rows: &[&[&str]]) -> Self {
        let columns = columns.iter().map(|c| c.to_string()).collect();
        let rows = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|v| if v.is_empty() { None } else { Some(v.to_string()) })
                    .collect()
            })
            .collect();

        Table::new(columns, rows)
    }

    /// Read a delimited table with a header row
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let columns: Vec<String> = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            if record.len() > columns.len() {
                // More fields than headers means the file is malformed
                return Err(DashboardError::Csv(csv::Error::from(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "line {}: expected {} fields, found {}",
                        record.position().map(|p| p.line()).unwrap_or(0),
                        columns.len(),
                        record.len()
                    ),
                ))));
            }

            let row = record
                .iter()
                .map(|field| if field.is_empty() { None } else { Some(field.to_string()) })
                .collect();
            rows.push(row);
        }

        Ok(Table::new(columns, rows))
    }

    /// Read a delimited table from disk
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Table::from_reader(file)
    }

    /// Serialize header + rows back to CSV. Missing cells become empty fields.
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut wtr = csv::Writer::from_writer(Vec::new());

        if !self.columns.is_empty() {
            wtr.write_record(&self.columns)?;
        }
        for row in &self.rows {
            wtr.write_record(row.iter().map(|c| c.as_deref().unwrap_or("")))?;
        }

        wtr.into_inner()
            .map_err(|e| DashboardError::Io(e.into_error()))
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// True when there is nothing to show (no rows or no columns)
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Text of one cell, `None` when missing or out of range
    pub fn text(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)?.as_deref()
    }

    /// All cells of one column in row order
    pub fn column_values<'a>(&'a self, column: &str) -> impl Iterator<Item = Option<&'a str>> + 'a {
        let idx = self.column_index(column);
        self.rows
            .iter()
            .map(move |row| idx.and_then(|i| row.get(i)).and_then(|c| c.as_deref()))
    }

    // ========================================================================
    // DERIVED TABLES (never mutate self)
    // ========================================================================

    /// Keep rows matching the predicate, preserving order
    pub fn filter_rows<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(&[Cell]) -> bool,
    {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|r| keep(r.as_slice())).cloned().collect(),
        }
    }

    /// Rows in the given order; out-of-range indices are ignored
    pub fn take_rows<I: IntoIterator<Item = usize>>(&self, order: I) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: order
                .into_iter()
                .filter_map(|i| self.rows.get(i).cloned())
                .collect(),
        }
    }

    /// First `n` rows
    pub fn head(&self, n: usize) -> Table {
        self.take_rows(0..n.min(self.rows.len()))
    }

    /// Keep only the named columns, in the given order. Unknown names are skipped.
    pub fn project(&self, columns: &[&str]) -> Table {
        let indices: Vec<usize> = columns
            .iter()
            .filter_map(|c| self.column_index(c))
            .collect();

        Table {
            columns: indices.iter().map(|&i| self.columns[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        }
    }

    // ========================================================================
    // EDITING (working copies only)
    // ========================================================================

    /// Overwrite one cell
    pub fn set_cell(&mut self, row: usize, column: &str, value: Cell) -> Result<()> {
        let idx = self
            .column_index(column)
            .ok_or_else(|| DashboardError::ColumnNotFound(column.to_string()))?;
        let len = self.rows.len();
        let target = self
            .rows
            .get_mut(row)
            .ok_or(DashboardError::RowOutOfRange { row, len })?;

        target[idx] = missing_if_blank(value);
        Ok(())
    }

    /// Append a row; short rows are padded with missing cells
    pub fn push_row(&mut self, cells: Vec<Cell>) {
        let row = normalize_row(cells, self.columns.len());
        self.rows.push(row);
    }

    /// Remove a row and return it
    pub fn remove_row(&mut self, row: usize) -> Result<Vec<Cell>> {
        if row >= self.rows.len() {
            return Err(DashboardError::RowOutOfRange { row, len: self.rows.len() });
        }
        Ok(self.rows.remove(row))
    }

    /// Rename the column at `idx` in place. Out-of-range indices are ignored.
    pub fn rename_column_at(&mut self, idx: usize, to: &str) {
        if let Some(name) = self.columns.get_mut(idx) {
            *name = to.to_string();
        }
    }

    /// Append a column computed from each row
    pub fn add_column<F>(&mut self, name: &str, mut value: F)
    where
        F: FnMut(&[Cell]) -> Cell,
    {
        for row in &mut self.rows {
            let cell = value(row.as_slice());
            row.push(cell);
        }
        self.columns.push(name.to_string());
    }
}

/// Numeric coercion: trimmed text parsed as f64, anything else is non-numeric
pub fn parse_number(cell: Option<&str>) -> Option<f64> {
    cell.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| !v.is_nan())
}

// ============================================================================
// TEXT RENDERING (CLI previews)
// ============================================================================

const MAX_CELL_WIDTH: usize = 30;

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.columns.is_empty() {
            return writeln!(f, "(no data)");
        }

        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                let len = cell.as_deref().unwrap_or("").chars().count();
                widths[i] = widths[i].max(len);
            }
        }
        for w in &mut widths {
            *w = (*w).min(MAX_CELL_WIDTH);
        }

        let header: Vec<String> = self
            .columns
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<w$}", truncate(c, *w), w = *w))
            .collect();
        writeln!(f, "{}", header.join(" | "))?;

        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        writeln!(f, "{}", rule.join("-+-"))?;

        for row in &self.rows {
            let line: Vec<String> = row
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:<w$}", truncate(c.as_deref().unwrap_or(""), *w), w = *w))
                .collect();
            writeln!(f, "{}", line.join(" | "))?;
        }

        Ok(())
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_reader_marks_empty_fields_missing() {
        let csv = "Location,Total\nMumbai,10\n,5\n";
        let table = Table::from_reader(csv.as_bytes()).unwrap();

        assert_eq!(table.columns(), &["Location".to_string(), "Total".to_string()]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.text(0, "Location"), Some("Mumbai"));
        assert_eq!(table.text(1, "Location"), None);
        assert_eq!(table.text(1, "Total"), Some("5"));
    }

    #[test]
    fn test_from_reader_pads_short_rows() {
        let csv = "A,B,C\n1,2\n";
        let table = Table::from_reader(csv.as_bytes()).unwrap();

        assert_eq!(table.rows()[0].len(), 3);
        assert_eq!(table.text(0, "C"), None);
    }

    #[test]
    fn test_from_reader_rejects_long_rows() {
        let csv = "A,B\n1,2,3\n";
        assert!(Table::from_reader(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_empty_sentinel() {
        let table = Table::empty();
        assert!(table.is_empty());
        assert_eq!(table.row_count(), 0);

        let headers_only = Table::from_rows(&["A"], &[]);
        assert!(headers_only.is_empty(), "Zero rows counts as no data");
    }

    #[test]
    fn test_csv_export_keeps_header_and_missing_cells() {
        let table = Table::from_rows(&["Name", "Claims"], &[&["A", "5"], &["B", ""]]);
        let bytes = table.to_csv_bytes().unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert_eq!(text, "Name,Claims\nA,5\nB,\n");

        let reparsed = Table::from_reader(text.as_bytes()).unwrap();
        assert_eq!(reparsed, table);
    }

    #[test]
    fn test_head_and_project() {
        let table = Table::from_rows(
            &["Name", "City", "Claims"],
            &[&["A", "X", "1"], &["B", "Y", "2"], &["C", "Z", "3"]],
        );

        let head = table.head(2);
        assert_eq!(head.row_count(), 2);
        assert_eq!(table.head(10).row_count(), 3);

        let projected = table.project(&["Claims", "Missing", "Name"]);
        assert_eq!(projected.columns(), &["Claims".to_string(), "Name".to_string()]);
        assert_eq!(projected.text(2, "Name"), Some("C"));
    }

    #[test]
    fn test_editing_operations() {
        let mut table = Table::from_rows(&["Name", "Claims"], &[&["A", "5"]]);

        table.set_cell(0, "Claims", Some("7".to_string())).unwrap();
        assert_eq!(table.text(0, "Claims"), Some("7"));

        table.push_row(vec![Some("B".to_string())]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.text(1, "Claims"), None);

        let removed = table.remove_row(0).unwrap();
        assert_eq!(removed[0].as_deref(), Some("A"));
        assert_eq!(table.row_count(), 1);

        assert!(matches!(
            table.set_cell(5, "Name", None),
            Err(DashboardError::RowOutOfRange { row: 5, len: 1 })
        ));
        assert!(matches!(
            table.set_cell(0, "Nope", None),
            Err(DashboardError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_blank_edits_become_missing() {
        let mut table = Table::from_rows(&["Location"], &[&["Delhi"], &["Mumbai"]]);

        table.set_cell(0, "Location", Some(String::new())).unwrap();
        table.push_row(vec![Some(String::new())]);

        assert_eq!(table.rows()[0], vec![None]);
        assert_eq!(table.rows()[2], vec![None]);
        let names: Vec<_> = table.column_values("Location").flatten().collect();
        assert_eq!(names, vec!["Mumbai"]);

        let reparsed = Table::from_reader(table.to_csv_bytes().unwrap().as_slice()).unwrap();
        assert_eq!(reparsed, table);
    }

    #[test]
    fn test_deserialize_fits_rows_to_columns() {
        let table: Table =
            serde_json::from_str(r#"{"columns":["Location","Name"],"rows":[["Mumbai"],["Delhi","A","x"],["","B"]]}"#)
                .unwrap();

        assert_eq!(table.rows().len(), 3);
        assert!(table.rows().iter().all(|r| r.len() == 2));
        assert_eq!(table.text(0, "Name"), None);
        assert_eq!(table.text(1, "Name"), Some("A"));
        assert_eq!(table.text(2, "Location"), None);
        // Renders without indexing past a short row
        assert!(table.to_string().contains("Mumbai"));
    }

    #[test]
    fn test_rename_column_at() {
        let mut table = Table::from_rows(&["FoodType", "Count"], &[&["Vegan", "3"]]);

        table.rename_column_at(0, "Food_Type");
        table.rename_column_at(9, "Ignored");

        assert_eq!(table.columns(), &["Food_Type".to_string(), "Count".to_string()]);
        assert_eq!(table.text(0, "Food_Type"), Some("Vegan"));
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number(Some(" 12.5 ")), Some(12.5));
        assert_eq!(parse_number(Some("abc")), None);
        assert_eq!(parse_number(None), None);
        assert_eq!(parse_number(Some("NaN")), None);
    }

    #[test]
    fn test_display_renders_header() {
        let table = Table::from_rows(&["Name"], &[&["Alpha"]]);
        let rendered = table.to_string();
        assert!(rendered.starts_with("Name "));
        assert!(rendered.contains("Alpha"));
        assert_eq!(Table::empty().to_string(), "(no data)\n");
    }
}
