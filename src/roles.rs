// 🏛️ Column Resolver - Semantic Roles
// Each role maps to at most one concrete column per table, via a fixed priority list.

use crate::error::DashboardError;
use crate::table::Table;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// RESOLUTION STRATEGIES
// ============================================================================

/// How a role finds its column.
///
/// Two strategies:
/// - `Exact`: candidates tried in priority order, case-sensitive exact match.
///   First candidate present in the table wins.
/// - `Contains`: first column in the table's natural order whose lowercased
///   name contains any of the patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Exact(&'static [&'static str]),
    Contains(&'static [&'static str]),
}

impl Strategy {
    /// Find the matching column among `columns`
    pub fn find<'a>(&self, columns: &'a [String]) -> Option<&'a str> {
        match self {
            Strategy::Exact(candidates) => candidates
                .iter()
                .find_map(|cand| columns.iter().find(|c| c.as_str() == *cand))
                .map(String::as_str),
            Strategy::Contains(patterns) => columns
                .iter()
                .find(|c| {
                    let lower = c.to_lowercase();
                    patterns.iter().any(|p| lower.contains(*p))
                })
                .map(String::as_str),
        }
    }
}

// ============================================================================
// ROLES
// ============================================================================

const CITY: &[&str] = &["Location", "City", "location", "city"];
const PROVIDER_NAME: &[&str] = &["Name", "Provider", "name", "provider"];
const FOOD_TYPE: &[&str] = &["Food_Type", "Food_Name", "FoodType", "food_name", "food_type"];

// Substring patterns are stored lowercase
const QUANTITY: &[&str] = &["quantity", "total_food", "total"];
const QUANTITY_ONLY: &[&str] = &["quantity"];
const CLAIM_COUNT: &[&str] = &["claim"];
const CLAIM_OR_COUNT: &[&str] = &["claim", "count"];
const CHART_LABEL: &[&str] = &["name", "food", "location"];
const NAME_LABEL: &[&str] = &["name"];
const FOOD_LABEL: &[&str] = &["food"];
const CONTRIBUTION_VALUE: &[&str] = &["total", "quantity", "count"];
const CONTRIBUTION_NAME: &[&str] = &["provider", "type"];

/// Role - an abstract filter/metric dimension, independent of any source schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    City,
    ProviderName,
    FoodType,
    Quantity,
    ClaimedQuantity,
    ClaimCount,
    ClaimOrCount,
    ChartLabel,
    NameLabel,
    FoodLabel,
    ContributionValue,
    ContributionName,
}

impl Role {
    pub const ALL: [Role; 12] = [
        Role::City,
        Role::ProviderName,
        Role::FoodType,
        Role::Quantity,
        Role::ClaimedQuantity,
        Role::ClaimCount,
        Role::ClaimOrCount,
        Role::ChartLabel,
        Role::NameLabel,
        Role::FoodLabel,
        Role::ContributionValue,
        Role::ContributionName,
    ];

    /// Roles offered as global filters
    pub const FILTERS: [Role; 3] = [Role::City, Role::ProviderName, Role::FoodType];

    /// Human-readable name for display
    pub fn name(&self) -> &str {
        match self {
            Role::City => "City",
            Role::ProviderName => "Provider",
            Role::FoodType => "Food Type",
            Role::Quantity => "Quantity",
            Role::ClaimedQuantity => "Claimed Quantity",
            Role::ClaimCount => "Claims",
            Role::ClaimOrCount => "Claims / Count",
            Role::ChartLabel => "Label",
            Role::NameLabel => "Name",
            Role::FoodLabel => "Food",
            Role::ContributionValue => "Contribution",
            Role::ContributionName => "Provider Type",
        }
    }

    /// Short code used on the command line and in the API
    pub fn code(&self) -> &str {
        match self {
            Role::City => "city",
            Role::ProviderName => "provider",
            Role::FoodType => "food",
            Role::Quantity => "quantity",
            Role::ClaimedQuantity => "claimed_quantity",
            Role::ClaimCount => "claims",
            Role::ClaimOrCount => "claims_or_count",
            Role::ChartLabel => "label",
            Role::NameLabel => "name",
            Role::FoodLabel => "food_label",
            Role::ContributionValue => "contribution",
            Role::ContributionName => "provider_type",
        }
    }

    pub fn strategy(&self) -> Strategy {
        match self {
            Role::City => Strategy::Exact(CITY),
            Role::ProviderName => Strategy::Exact(PROVIDER_NAME),
            Role::FoodType => Strategy::Exact(FOOD_TYPE),
            Role::Quantity => Strategy::Contains(QUANTITY),
            Role::ClaimedQuantity => Strategy::Contains(QUANTITY_ONLY),
            Role::ClaimCount => Strategy::Contains(CLAIM_COUNT),
            Role::ClaimOrCount => Strategy::Contains(CLAIM_OR_COUNT),
            Role::ChartLabel => Strategy::Contains(CHART_LABEL),
            Role::NameLabel => Strategy::Contains(NAME_LABEL),
            Role::FoodLabel => Strategy::Contains(FOOD_LABEL),
            Role::ContributionValue => Strategy::Contains(CONTRIBUTION_VALUE),
            Role::ContributionName => Strategy::Contains(CONTRIBUTION_NAME),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Role {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Role::ALL
            .iter()
            .copied()
            .find(|r| r.code() == wanted)
            .ok_or_else(|| DashboardError::UnknownRole(s.to_string()))
    }
}

// ============================================================================
// RESOLUTION
// ============================================================================

/// Resolve a role to a column of `table`, or `None` when the table lacks it
pub fn resolve(table: &Table, role: Role) -> Option<&str> {
    role.strategy().find(table.columns())
}

/// Resolve a label role, falling back to the first column
pub fn resolve_label(table: &Table, role: Role) -> Option<&str> {
    resolve(table, role).or_else(|| table.columns().first().map(String::as_str))
}

// ============================================================================
// TESTS
// ============================================================================
