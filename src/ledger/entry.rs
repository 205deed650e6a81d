//! Writing rows into the ledger.
//!
//! The dashboard never writes to the ledger. These functions exist for
//! building test databases.

use rusqlite::Connection;
use time::Date;

use crate::Error;

/// A transaction to insert into the ledger.
///
/// To create a new `LedgerEntry`, use [LedgerEntry::build].
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    /// The amount as stored in the source data, e.g. "$-77.00".
    pub amount: String,
    /// The day the transaction happened.
    pub date: Date,
    /// The customer that made the transaction.
    pub client_id: i64,
    /// The merchant category code.
    pub mcc: Option<i64>,
    /// Comma separated error types, e.g. "Bad PIN,Insufficient Balance".
    pub errors: Option<String>,
}

impl LedgerEntry {
    /// Start building a ledger entry for client 0 with no category or errors.
    pub fn build(amount: &str, date: Date) -> Self {
        Self {
            amount: amount.to_owned(),
            date,
            client_id: 0,
            mcc: None,
            errors: None,
        }
    }

    /// Set the client ID.
    pub fn client_id(mut self, client_id: i64) -> Self {
        self.client_id = client_id;
        self
    }

    /// Set the merchant category code.
    pub fn mcc(mut self, mcc: i64) -> Self {
        self.mcc = Some(mcc);
        self
    }

    /// Set the error types.
    pub fn errors(mut self, errors: &str) -> Self {
        self.errors = Some(errors.to_owned());
        self
    }
}

/// Insert `entry` into the transactions table and return its ID.
///
/// The date is stored with a midnight time component to match the format of
/// the source data.
pub fn insert_ledger_entry(entry: &LedgerEntry, connection: &Connection) -> Result<i64, Error> {
    connection.execute(
        "INSERT INTO transactions (date, client_id, amount, mcc, errors)
        VALUES (?1, ?2, ?3, ?4, ?5)",
        (
            format!("{} 00:00:00", entry.date),
            entry.client_id,
            &entry.amount,
            entry.mcc,
            &entry.errors,
        ),
    )?;

    Ok(connection.last_insert_rowid())
}

/// Insert or replace the description for a merchant category code.
pub fn insert_mcc_code(mcc: i64, description: &str, connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "INSERT OR REPLACE INTO mcc_codes (mcc, description) VALUES (?1, ?2)",
        (mcc, description),
    )?;

    Ok(())
}

/// Label a transaction as fraudulent or legitimate.
pub fn insert_fraud_label(
    transaction_id: i64,
    is_fraud: bool,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "INSERT OR REPLACE INTO fraud_labels (transaction_id, is_fraud) VALUES (?1, ?2)",
        (transaction_id, if is_fraud { "Yes" } else { "No" }),
    )?;

    Ok(())
}
