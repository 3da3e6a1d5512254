// 🔍 Filter Engine - global filters applied across heterogeneous tables
// Constraints are best-effort per table: a role the table lacks is skipped, not an error.

use crate::registry::DatasetRegistry;
use crate::roles::{resolve, Role};
use crate::table::Table;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// The "no constraint" choice offered by every selector
pub const ALL: &str = "All";

// ============================================================================
// FILTER SELECTION
// ============================================================================

/// FilterSelection - role → chosen value. Roles set to "All" are simply absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterSelection {
    constraints: BTreeMap<Role, String>,
}

impl FilterSelection {
    /// Empty selection (identity filter)
    pub fn new() -> Self {
        FilterSelection::default()
    }

    /// Set one role. "All" (or an empty value) clears the constraint.
    pub fn set(&mut self, role: Role, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() || value == ALL {
            self.constraints.remove(&role);
        } else {
            self.constraints.insert(role, value);
        }
    }

    /// Builder: add a constraint
    pub fn with(mut self, role: Role, value: impl Into<String>) -> Self {
        self.set(role, value);
        self
    }

    /// Builder: add a constraint only when a value was given
    pub fn with_optional(self, role: Role, value: Option<String>) -> Self {
        match value {
            Some(v) => self.with(role, v),
            None => self,
        }
    }

    /// Selection from the three global sidebar filters
    pub fn global(city: Option<String>, provider: Option<String>, food: Option<String>) -> Self {
        FilterSelection::new()
            .with_optional(Role::City, city)
            .with_optional(Role::ProviderName, provider)
            .with_optional(Role::FoodType, food)
    }

    pub fn get(&self, role: Role) -> Option<&str> {
        self.constraints.get(&role).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Role, &str)> {
        self.constraints.iter().map(|(r, v)| (*r, v.as_str()))
    }
}

// ============================================================================
// APPLY
// ============================================================================

/// Apply a selection to one table. Pure: `table` is never modified.
///
/// Each constraint resolves its role on this specific table. Unresolved roles
/// are skipped; resolved ones keep only rows whose cell text equals the value.
/// Constraints combine with AND.
pub fn apply(table: &Table, selection: &FilterSelection) -> Table {
    if table.is_empty() || selection.is_empty() {
        return table.clone();
    }

    let active: Vec<(usize, &str)> = selection
        .iter()
        .filter_map(|(role, value)| {
            let column = resolve(table, role)?;
            table.column_index(column).map(|idx| (idx, value))
        })
        .collect();

    if active.is_empty() {
        return table.clone();
    }

    let filtered = table.filter_rows(|row| {
        active
            .iter()
            .all(|(idx, value)| row[*idx].as_deref() == Some(*value))
    });

    debug!(
        constraints = active.len(),
        before = table.row_count(),
        after = filtered.row_count(),
        "filter applied"
    );

    filtered
}

// ============================================================================
// SELECTABLE VALUES
// ============================================================================

/// Distinct, sorted, non-missing values of `role` across the given tables
pub fn collect_values_from<'a, I>(tables: I, role: Role) -> Vec<String>
where
    I: IntoIterator<Item = &'a Table>,
{
    let mut values = BTreeSet::new();

    for table in tables {
        if table.is_empty() {
            continue;
        }
        if let Some(column) = resolve(table, role) {
            values.extend(table.column_values(column).flatten().map(str::to_string));
        }
    }

    values.into_iter().collect()
}

/// Distinct values of `role` across every table in the registry
pub fn collect_values(registry: &DatasetRegistry, role: Role) -> Vec<String> {
    let tables = registry.tables();
    collect_values_from(tables.iter().map(|(_, t)| t.as_ref()), role)
}

/// Distinct values of `role` within a single table (local selectors)
pub fn collect_values_in(table: &Table, role: Role) -> Vec<String> {
    collect_values_from(std::iter::once(table), role)
}

/// Prepend the "All" choice for a selector widget
pub fn with_all(values: Vec<String>) -> Vec<String> {
    std::iter::once(ALL.to_string()).chain(values).collect()
}

/// FilterOptions - selectable values for the three global filters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterOptions {
    pub cities: Vec<String>,
    pub providers: Vec<String>,
    pub food_types: Vec<String>,
}

impl FilterOptions {
    /// Scan every table. Each list starts with "All".
    pub fn collect(registry: &DatasetRegistry) -> Self {
        FilterOptions {
            cities: with_all(collect_values(registry, Role::City)),
            providers: with_all(collect_values(registry, Role::ProviderName)),
            food_types: with_all(collect_values(registry, Role::FoodType)),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
