//! Precomputed fraud statistics.
//!
//! Fraud rates need a join across the whole ledger and the fraud labels, which
//! is too slow to run per request. An offline job writes the results to CSV
//! files in the data directory and the dashboard only reads them.
//!
//! Rates are percentages, e.g. `2.5` means 2.5% of transactions were fraud.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, ledger::NO_ERROR_LABEL};

/// File name of the fraud rate per error type table.
pub const FRAUD_BY_ERROR_FILE: &str = "fraud_by_error.csv";
/// File name of the fraud rate per merchant category table.
pub const FRAUD_BY_CATEGORY_FILE: &str = "fraud_by_category.csv";
/// File name of the fraudulent vs legitimate amounts table.
pub const FRAUD_AMOUNTS_FILE: &str = "fraud_amounts.csv";

/// How often transactions with an error type turned out to be fraud.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorFraudRate {
    /// The error type, [NO_ERROR_LABEL] for transactions without errors.
    #[serde(deserialize_with = "no_error_if_empty")]
    pub errors: String,
    /// Transactions with this error type.
    pub total_transactions: i64,
    /// How many of those were labelled as fraud.
    pub fraud_count: i64,
    /// `fraud_count` as a percentage of `total_transactions`.
    pub fraud_rate: f64,
}

/// How often transactions in a merchant category turned out to be fraud.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryFraudRate {
    /// The MCC description.
    pub description: String,
    /// Transactions in this category.
    pub total_transactions: i64,
    /// How many of those were labelled as fraud.
    pub fraud_count: i64,
    /// `fraud_count` as a percentage of `total_transactions`.
    pub fraud_rate: f64,
}

/// Summary of transaction amounts for either fraudulent or legitimate
/// transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudAmounts {
    /// "Yes" for fraudulent transactions, "No" otherwise.
    pub is_fraud: String,
    /// The mean amount.
    pub avg_amount: f64,
    /// The smallest amount, negative for refunds.
    pub min_amount: f64,
    /// The largest amount.
    pub max_amount: f64,
}

/// The average amounts of legitimate and fraudulent transactions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AverageAmounts {
    /// The mean amount of legitimate transactions.
    pub typical: f64,
    /// The mean amount of fraudulent transactions.
    pub fraudulent: f64,
}

fn no_error_if_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let errors = Option::<String>::deserialize(deserializer)?;

    Ok(match errors {
        Some(errors) if !errors.trim().is_empty() => errors,
        _ => NO_ERROR_LABEL.to_owned(),
    })
}

/// Read the fraud rate for each error type, highest rate first.
///
/// # Errors
/// Returns [Error::InvalidCSV] if the file is missing or malformed.
pub fn load_fraud_by_error(data_dir: &Path) -> Result<Vec<ErrorFraudRate>, Error> {
    let mut rows: Vec<ErrorFraudRate> = read_rows(&data_dir.join(FRAUD_BY_ERROR_FILE))?;
    sort_by_rate_descending(&mut rows, |row| row.fraud_rate);

    Ok(rows)
}

/// Read the fraud rate for each merchant category, highest rate first.
///
/// # Errors
/// Returns [Error::InvalidCSV] if the file is missing or malformed.
pub fn load_fraud_by_category(data_dir: &Path) -> Result<Vec<CategoryFraudRate>, Error> {
    let mut rows: Vec<CategoryFraudRate> = read_rows(&data_dir.join(FRAUD_BY_CATEGORY_FILE))?;
    sort_by_rate_descending(&mut rows, |row| row.fraud_rate);

    Ok(rows)
}

/// Read the average amounts of legitimate and fraudulent transactions.
///
/// # Errors
/// Returns [Error::InvalidCSV] if the file is missing, malformed, or lacks a
/// row for either group.
pub fn load_average_amounts(data_dir: &Path) -> Result<AverageAmounts, Error> {
    let path = data_dir.join(FRAUD_AMOUNTS_FILE);
    let rows: Vec<FraudAmounts> = read_rows(&path)?;

    let average_for = |label: &str| {
        rows.iter()
            .find(|row| row.is_fraud == label)
            .map(|row| row.avg_amount)
            .ok_or_else(|| {
                Error::InvalidCSV(format!(
                    "{} has no row with is_fraud = \"{label}\"",
                    path.display()
                ))
            })
    };

    Ok(AverageAmounts {
        typical: average_for("No")?,
        fraudulent: average_for("Yes")?,
    })
}

/// Write `rows` to `path` with a header row, replacing any existing file.
///
/// # Errors
/// Returns [Error::InvalidCSV] if the file cannot be written.
pub fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), Error> {
    let to_error = |error: csv::Error| Error::InvalidCSV(format!("{}: {error}", path.display()));

    let mut writer = csv::Writer::from_path(path).map_err(to_error)?;

    for row in rows {
        writer.serialize(row).map_err(to_error)?;
    }

    writer
        .flush()
        .map_err(|error| Error::InvalidCSV(format!("{}: {error}", path.display())))
}

fn read_rows<T>(path: &Path) -> Result<Vec<T>, Error>
where
    T: for<'de> Deserialize<'de>,
{
    let to_error = |error: csv::Error| Error::InvalidCSV(format!("{}: {error}", path.display()));

    csv::Reader::from_path(path)
        .map_err(to_error)?
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(to_error)
        .inspect_err(|error| tracing::error!("could not read fraud statistics: {error}"))
}

fn sort_by_rate_descending<T>(rows: &mut [T], rate: impl Fn(&T) -> f64) {
    rows.sort_by(|a, b| rate(b).total_cmp(&rate(a)));
}
