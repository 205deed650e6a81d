//! Implements a struct that holds the state of the dashboard server.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use rusqlite::Connection;

use crate::{
    Error,
    config::ForecastSettings,
    db::initialize,
    forecast::{DataVersion, ForecastCache},
};

/// The state of the dashboard server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,

    /// The directory holding the precomputed fraud statistics.
    pub data_dir: PathBuf,

    /// The holdout window and horizon used for every forecast.
    pub forecast_settings: ForecastSettings,

    /// The version of the ledger read at startup.
    ///
    /// The ledger is static, so this never changes while the server runs.
    pub data_version: DataVersion,

    /// Monthly series and forecasts computed so far.
    pub forecast_cache: Arc<ForecastCache>,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database so that the ledger
    /// queries can run, even on an empty file.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized or read.
    pub fn new(
        db_connection: Connection,
        data_dir: impl Into<PathBuf>,
        forecast_settings: ForecastSettings,
    ) -> Result<Self, Error> {
        initialize(&db_connection)?;

        let data_version = DataVersion::read(&db_connection)?;
        tracing::info!(
            "Loaded ledger with {} transactions",
            data_version.row_count
        );

        Ok(Self {
            db_connection: Arc::new(Mutex::new(db_connection)),
            data_dir: data_dir.into(),
            forecast_settings,
            data_version,
            forecast_cache: Arc::new(ForecastCache::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use time::macros::date;

    use crate::{
        config::ForecastSettings,
        ledger::{LedgerEntry, insert_ledger_entry},
    };

    use super::AppState;

    #[test]
    fn reads_data_version_on_creation() {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::initialize(&conn).unwrap();
        insert_ledger_entry(&LedgerEntry::build("$1.00", date!(2019 - 01 - 01)), &conn).unwrap();
        insert_ledger_entry(&LedgerEntry::build("$2.00", date!(2019 - 02 - 01)), &conn).unwrap();

        let state = AppState::new(conn, "data", ForecastSettings::default()).unwrap();

        assert_eq!(state.data_version.row_count, 2);
        assert_eq!(state.data_version.max_id, 2);
    }

    #[test]
    fn initializes_empty_database() {
        let conn = Connection::open_in_memory().unwrap();

        let state = AppState::new(conn, "data", ForecastSettings::default()).unwrap();

        assert_eq!(state.data_version.row_count, 0);
    }
}
