// Food Waste Dashboard - Core Library
// Exposes the filter-and-aggregation core for the CLI, API server, and tests

pub mod error;
pub mod table;
pub mod config;
pub mod registry;   // Dataset Registry - cached query tables
pub mod roles;      // Column Resolver - semantic roles
pub mod filter;     // Filter Engine
pub mod aggregate;  // Aggregation / KPI Layer
pub mod session;    // Session Edit Store
pub mod views;      // Descriptive views for presentation

// Re-export commonly used types
pub use error::{DashboardError, Result};
pub use table::{Cell, Table, parse_number};
pub use config::{DashboardConfig, DATA_DIR_ENV};
pub use registry::{DatasetRegistry, QueryKey, SourceStatus};
pub use roles::{Role, Strategy, resolve, resolve_label};
pub use filter::{
    FilterOptions, FilterSelection, ALL,
    apply, collect_values, collect_values_from, collect_values_in, with_all,
};
pub use aggregate::{
    ChartPoint, Kpi, Ranking,
    first_value, rank_columns, scalar_sum, shares, sort_desc, top_n,
};
pub use session::{Edit, SessionEditStore, SessionPool, WorkingCopy};
pub use views::{
    ClaimSort, Demand, Overview, QueryEntry,
    chart_suggestion, claims_by_food, demand, editable, explorer, overview,
    query_entry, session_table, top_receivers,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
