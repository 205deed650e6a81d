//! Ledger-wide totals for the overview page.

use rusqlite::Connection;

use crate::Error;

/// Headline numbers for the whole ledger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverviewTotals {
    /// The sum of every transaction amount.
    pub total_spent: f64,
    /// The number of transactions.
    pub transaction_count: i64,
    /// The number of distinct clients.
    pub unique_clients: i64,
}

/// How much a single client has spent.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSpend {
    /// The client ID.
    pub client_id: i64,
    /// The sum of the client's transaction amounts.
    pub total_spent: f64,
    /// The number of transactions the client made.
    pub transaction_count: i64,
}

/// Get the total spend, transaction count and number of clients.
pub fn get_overview_totals(connection: &Connection) -> Result<OverviewTotals, Error> {
    connection
        .query_row(
            "SELECT
                COALESCE(SUM(parse_amount(amount)), 0.0),
                COUNT(*),
                COUNT(DISTINCT client_id)
            FROM transactions",
            [],
            |row| {
                Ok(OverviewTotals {
                    total_spent: row.get(0)?,
                    transaction_count: row.get(1)?,
                    unique_clients: row.get(2)?,
                })
            },
        )
        .map_err(Error::from)
}

/// Get the `limit` clients that spent the most, biggest spender first.
pub fn top_clients_by_spend(
    limit: usize,
    connection: &Connection,
) -> Result<Vec<ClientSpend>, Error> {
    connection
        .prepare(
            "SELECT
                client_id,
                SUM(parse_amount(amount)) AS total_spent,
                COUNT(*) AS transaction_count
            FROM transactions
            GROUP BY client_id
            ORDER BY total_spent DESC, client_id ASC
            LIMIT ?1",
        )?
        .query_map([limit as i64], |row| {
            Ok(ClientSpend {
                client_id: row.get(0)?,
                total_spent: row.get(1)?,
                transaction_count: row.get(2)?,
            })
        })?
        .map(|maybe_client| maybe_client.map_err(Error::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use time::macros::date;

    use crate::{
        db::initialize,
        ledger::{LedgerEntry, insert_ledger_entry},
    };

    use super::{ClientSpend, OverviewTotals, get_overview_totals, top_clients_by_spend};

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    #[test]
    fn totals_for_empty_ledger_are_zero() {
        let conn = get_test_connection();

        let totals = get_overview_totals(&conn).unwrap();

        assert_eq!(
            totals,
            OverviewTotals {
                total_spent: 0.0,
                transaction_count: 0,
                unique_clients: 0
            }
        );
    }

    #[test]
    fn totals_sum_all_transactions() {
        let conn = get_test_connection();
        let day = date!(2019 - 01 - 05);
        insert_ledger_entry(&LedgerEntry::build("$10.00", day).client_id(1), &conn).unwrap();
        insert_ledger_entry(&LedgerEntry::build("$5.50", day).client_id(1), &conn).unwrap();
        insert_ledger_entry(&LedgerEntry::build("$-2.00", day).client_id(2), &conn).unwrap();

        let totals = get_overview_totals(&conn).unwrap();

        assert_eq!(totals.total_spent, 13.5);
        assert_eq!(totals.transaction_count, 3);
        assert_eq!(totals.unique_clients, 2);
    }

    #[test]
    fn ranks_clients_by_spend() {
        let conn = get_test_connection();
        let day = date!(2019 - 01 - 05);
        insert_ledger_entry(&LedgerEntry::build("$10.00", day).client_id(1), &conn).unwrap();
        insert_ledger_entry(&LedgerEntry::build("$50.00", day).client_id(2), &conn).unwrap();
        insert_ledger_entry(&LedgerEntry::build("$5.00", day).client_id(1), &conn).unwrap();

        let clients = top_clients_by_spend(10, &conn).unwrap();

        assert_eq!(
            clients,
            vec![
                ClientSpend {
                    client_id: 2,
                    total_spent: 50.0,
                    transaction_count: 1
                },
                ClientSpend {
                    client_id: 1,
                    total_spent: 15.0,
                    transaction_count: 2
                },
            ]
        );
    }
}
