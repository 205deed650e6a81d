use rusqlite::Connection;
use time::Date;

use crate::{
    db::initialize,
    ledger::{LedgerEntry, insert_ledger_entry, insert_mcc_code},
    monthly::add_months,
};

pub(crate) fn get_test_connection() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    initialize(&conn).unwrap();
    conn
}

/// Insert one transaction per month for `months` months starting at `start`
/// under a new category.
///
/// Amounts follow a gentle upward trend with a yearly cycle so that both
/// seasonal models can be fitted to the result.
pub(crate) fn seed_monthly_category(
    mcc: i64,
    description: &str,
    base_amount: f64,
    start: Date,
    months: usize,
    conn: &Connection,
) {
    insert_mcc_code(mcc, description, conn).unwrap();

    for i in 0..months {
        let seasonal = [0.0, -3.0, 1.0, 4.0, 2.0, -1.0, 5.0, 3.0, -2.0, 0.0, 6.0, 9.0][i % 12];
        let amount = base_amount + 2.0 * i as f64 + seasonal;
        let entry = LedgerEntry::build(&format!("${amount:.2}"), add_months(start, i))
            .mcc(mcc)
            .client_id((i % 3) as i64);

        insert_ledger_entry(&entry, conn).unwrap();
    }
}
