//! Read-only queries over the transaction ledger.
//!
//! The ledger is a static SQLite database of card transactions, a lookup
//! table from merchant category code (MCC) to a description, and fraud labels.
//! This module exposes the query shapes the dashboard pages need.

mod amount;
mod categories;
mod entry;
mod monthly_totals;
mod overview;
mod transaction_errors;

pub use amount::{AMOUNT_FUNCTION, parse_amount, register_amount_function};
pub use categories::{
    CategoryStats, category_exists, get_category_labels, top_categories_by_average,
    top_categories_by_volume,
};
pub use entry::{LedgerEntry, insert_fraud_label, insert_ledger_entry, insert_mcc_code};
pub use overview::{ClientSpend, OverviewTotals, get_overview_totals, top_clients_by_spend};
pub use monthly_totals::get_monthly_totals;
pub use transaction_errors::{ErrorCount, NO_ERROR_LABEL, get_error_distribution};

use std::fmt::Display;

/// Which slice of the ledger a query or cached result covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Every transaction in the ledger.
    All,
    /// Transactions whose MCC description exactly matches the label.
    Category(String),
}

impl Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::All => write!(f, "all transactions"),
            Scope::Category(label) => write!(f, "category \"{label}\""),
        }
    }
}
