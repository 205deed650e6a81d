//! Merchant category queries.

use rusqlite::{Connection, Row};

use crate::Error;

/// Spending statistics for one merchant category.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryStats {
    /// The MCC description, e.g. "Grocery Stores, Supermarkets".
    pub description: String,
    /// How many transactions fall in the category.
    pub transaction_count: i64,
    /// The sum of all amounts in the category.
    pub total_spent: f64,
    /// The mean amount, rounded to cents.
    pub average_amount: f64,
}

/// Get every category label that has at least one transaction, sorted
/// alphabetically.
pub fn get_category_labels(connection: &Connection) -> Result<Vec<String>, Error> {
    connection
        .prepare(
            "SELECT DISTINCT m.description
            FROM transactions t
            INNER JOIN mcc_codes m ON t.mcc = m.mcc
            ORDER BY m.description ASC",
        )?
        .query_map([], |row| row.get(0))?
        .map(|maybe_label| maybe_label.map_err(Error::from))
        .collect()
}

/// Whether `label` is a known category description.
pub fn category_exists(label: &str, connection: &Connection) -> Result<bool, Error> {
    connection
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM mcc_codes WHERE description = ?1)",
            [label],
            |row| row.get(0),
        )
        .map_err(Error::from)
}

/// Get the `limit` categories with the most transactions, busiest first.
pub fn top_categories_by_volume(
    limit: usize,
    connection: &Connection,
) -> Result<Vec<CategoryStats>, Error> {
    query_category_stats("transaction_count DESC", limit, connection)
}

/// Get the `limit` categories with the largest average transaction, largest
/// first.
pub fn top_categories_by_average(
    limit: usize,
    connection: &Connection,
) -> Result<Vec<CategoryStats>, Error> {
    query_category_stats("average_amount DESC", limit, connection)
}

fn query_category_stats(
    order_by: &str,
    limit: usize,
    connection: &Connection,
) -> Result<Vec<CategoryStats>, Error> {
    let query = format!(
        "SELECT
            m.description,
            COUNT(*) AS transaction_count,
            SUM(parse_amount(t.amount)) AS total_spent,
            ROUND(AVG(parse_amount(t.amount)), 2) AS average_amount
        FROM transactions t
        INNER JOIN mcc_codes m ON t.mcc = m.mcc
        GROUP BY m.description
        ORDER BY {order_by}, m.description ASC
        LIMIT ?1"
    );

    connection
        .prepare(&query)?
        .query_map([limit as i64], map_category_stats_row)?
        .map(|maybe_stats| maybe_stats.map_err(Error::from))
        .collect()
}

fn map_category_stats_row(row: &Row) -> Result<CategoryStats, rusqlite::Error> {
    Ok(CategoryStats {
        description: row.get(0)?,
        transaction_count: row.get(1)?,
        total_spent: row.get(2)?,
        average_amount: row.get(3)?,
    })
}
