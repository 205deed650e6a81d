//! The monthly spending query behind every time series on the dashboard.

use rusqlite::{Connection, Row};

use crate::{Error, ledger::Scope, monthly::MonthlyTotal};

/// Sum the amounts in `scope` by calendar month, oldest month first.
///
/// The grouping happens in SQLite, so only one row per month is read no
/// matter how large the ledger is. A category scope matches the MCC
/// description exactly. An unknown label yields an empty list rather than an
/// error, callers decide how to report an empty selection.
///
/// # Errors
/// Returns [Error::InvalidAmount] if any matching amount cannot be parsed, or
/// [Error::SqlError] if a month cannot be read as a date.
pub fn get_monthly_totals(
    scope: &Scope,
    connection: &Connection,
) -> Result<Vec<MonthlyTotal>, Error> {
    match scope {
        Scope::All => connection
            .prepare(
                "SELECT date(t.date, 'start of month') AS month, SUM(parse_amount(t.amount))
                FROM transactions t
                GROUP BY month
                ORDER BY month",
            )?
            .query_map([], map_row)?
            .map(|maybe_total| maybe_total.map_err(Error::from))
            .collect(),
        Scope::Category(label) => connection
            .prepare(
                "SELECT date(t.date, 'start of month') AS month, SUM(parse_amount(t.amount))
                FROM transactions t
                INNER JOIN mcc_codes m ON t.mcc = m.mcc
                WHERE m.description = ?1
                GROUP BY month
                ORDER BY month",
            )?
            .query_map([label], map_row)?
            .map(|maybe_total| maybe_total.map_err(Error::from))
            .collect(),
    }
}

fn map_row(row: &Row) -> Result<MonthlyTotal, rusqlite::Error> {
    Ok(MonthlyTotal {
        month: row.get(0)?,
        total: row.get(1)?,
    })
}
