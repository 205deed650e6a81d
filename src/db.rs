//! Schema for the ledger database.
//!
//! The production database is built once by an external ETL job. These
//! statements mirror its layout so that tests and `create_test_db` can build
//! a compatible database, and so that opening an empty file still yields a
//! queryable (empty) ledger.

use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior};

use crate::ledger::register_amount_function;

/// Create the ledger tables if they do not exist yet and register the SQL
/// functions the ledger queries rely on.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), rusqlite::Error> {
    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_transactions_table(&transaction)?;
    create_mcc_codes_table(&transaction)?;
    create_fraud_labels_table(&transaction)?;

    transaction.commit()?;

    register_amount_function(connection)
}

/// Create the table of card transactions.
///
/// `amount` is stored as text exactly as it appears in the source CSV,
/// e.g. "$-77.00", and `date` as an ISO 8601 date time string.
fn create_transactions_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY,
            date TEXT NOT NULL,
            client_id INTEGER NOT NULL,
            card_id INTEGER,
            amount TEXT NOT NULL,
            use_chip TEXT,
            merchant_id INTEGER,
            merchant_city TEXT,
            merchant_state TEXT,
            zip REAL,
            mcc INTEGER,
            errors TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_transactions_mcc ON transactions(mcc);",
    )
}

/// Create the lookup table from merchant category code to description.
fn create_mcc_codes_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS mcc_codes (
            mcc INTEGER PRIMARY KEY,
            description TEXT NOT NULL
        )",
        (),
    )?;

    Ok(())
}

/// Create the table of fraud labels, keyed by transaction ID.
fn create_fraud_labels_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS fraud_labels (
            transaction_id INTEGER PRIMARY KEY,
            is_fraud TEXT NOT NULL
        )",
        (),
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::initialize;

    #[test]
    fn initialize_creates_ledger_tables() {
        let conn = Connection::open_in_memory().unwrap();

        initialize(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(tables, vec!["fraud_labels", "mcc_codes", "transactions"]);
    }

    #[test]
    fn initialize_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        initialize(&conn).unwrap();
        initialize(&conn).unwrap();
    }
}
