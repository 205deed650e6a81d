//! Queries over the error types recorded against transactions.

use rusqlite::Connection;

use crate::Error;

/// The label used in the source data for transactions without errors.
pub const NO_ERROR_LABEL: &str = "No Error";

/// The number of transactions that failed with a single error type.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorCount {
    /// The error type, e.g. "Insufficient Balance".
    pub error: String,
    /// How many transactions recorded exactly this error.
    pub transaction_count: i64,
}

/// Get the `limit` most common error types, most common first.
///
/// Transactions with several comma separated errors are left out so that each
/// bar in the chart describes a single cause.
pub fn get_error_distribution(
    limit: usize,
    connection: &Connection,
) -> Result<Vec<ErrorCount>, Error> {
    connection
        .prepare(
            "SELECT errors, COUNT(*) AS transaction_count
            FROM transactions
            WHERE errors IS NOT NULL
                AND errors != ''
                AND errors != ?1
                AND errors NOT LIKE '%,%'
            GROUP BY errors
            ORDER BY transaction_count DESC, errors ASC
            LIMIT ?2",
        )?
        .query_map((NO_ERROR_LABEL, limit as i64), |row| {
            Ok(ErrorCount {
                error: row.get(0)?,
                transaction_count: row.get(1)?,
            })
        })?
        .map(|maybe_count| maybe_count.map_err(Error::from))
        .collect()
}
