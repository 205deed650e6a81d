//! Memoised monthly series and forecast outcomes.
//!
//! Entries are keyed by the scope they cover and the [DataVersion] of the
//! ledger they were computed from. The ledger is static while the server runs,
//! so the version read at startup stays current and nothing is evicted.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, OnceLock},
};

use rusqlite::Connection;

use crate::{Error, ledger::Scope, monthly::MonthlySeries};

use super::{ForecastError, ForecastOutcome};

/// Identifies the contents of the ledger by its size and newest row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataVersion {
    /// The number of transactions.
    pub row_count: i64,
    /// The largest transaction ID, or zero for an empty ledger.
    pub max_id: i64,
}

impl DataVersion {
    /// Read the current version of the ledger.
    pub fn read(connection: &Connection) -> Result<Self, Error> {
        connection
            .query_row(
                "SELECT COUNT(*), COALESCE(MAX(id), 0) FROM transactions",
                [],
                |row| {
                    Ok(DataVersion {
                        row_count: row.get(0)?,
                        max_id: row.get(1)?,
                    })
                },
            )
            .map_err(Error::from)
    }
}

type CacheKey = (Scope, DataVersion);

type OutcomeCell = Arc<OnceLock<Result<Arc<ForecastOutcome>, ForecastError>>>;

/// Caches monthly aggregations and fitted forecasts per scope.
#[derive(Debug, Default)]
pub struct ForecastCache {
    series: Mutex<HashMap<CacheKey, Arc<MonthlySeries>>>,
    outcomes: Mutex<HashMap<CacheKey, OutcomeCell>>,
}

impl ForecastCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the monthly series for `scope`, calling `load` on a miss.
    ///
    /// Errors from `load` are returned and not cached.
    pub fn monthly_series(
        &self,
        scope: &Scope,
        version: DataVersion,
        load: impl FnOnce() -> Result<MonthlySeries, Error>,
    ) -> Result<Arc<MonthlySeries>, Error> {
        let key = (scope.clone(), version);

        if let Some(series) = self.series.lock().map_err(|_| Error::CacheLockError)?.get(&key) {
            tracing::debug!("monthly series cache hit for {scope}");
            return Ok(series.clone());
        }

        tracing::debug!("monthly series cache miss for {scope}");
        let series = Arc::new(load()?);

        self.series
            .lock()
            .map_err(|_| Error::CacheLockError)?
            .insert(key, series.clone());

        Ok(series)
    }

    /// Get the forecast for `scope`, calling `fit` on a miss.
    ///
    /// Pipeline failures are cached alongside successes since refitting the
    /// same data would fail the same way. Concurrent misses on one key share a
    /// single fit, and the map lock is not held while fitting.
    pub fn forecast(
        &self,
        scope: &Scope,
        version: DataVersion,
        fit: impl FnOnce() -> Result<ForecastOutcome, ForecastError>,
    ) -> Result<Arc<ForecastOutcome>, Error> {
        let key = (scope.clone(), version);

        let cell = self
            .outcomes
            .lock()
            .map_err(|_| Error::CacheLockError)?
            .entry(key)
            .or_default()
            .clone();

        if let Some(outcome) = cell.get() {
            tracing::debug!("forecast cache hit for {scope}");
            return outcome.clone().map_err(Error::from);
        }

        cell.get_or_init(|| {
            tracing::debug!("forecast cache miss for {scope}");
            fit().map(Arc::new)
        })
        .clone()
        .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::Cell,
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        thread,
        time::Duration,
    };

    use rusqlite::Connection;
    use time::macros::date;

    use crate::{
        Error,
        config::AGGREGATE_MODEL,
        db::initialize,
        forecast::{ForecastError, ForecastOutcome, Validation},
        ledger::{LedgerEntry, Scope, insert_ledger_entry},
        monthly::{MonthlySeries, MonthlyTotal},
    };

    use super::{DataVersion, ForecastCache};

    const VERSION: DataVersion = DataVersion {
        row_count: 10,
        max_id: 10,
    };

    fn series(total: f64) -> MonthlySeries {
        MonthlySeries::new([MonthlyTotal {
            month: date!(2019 - 01 - 01),
            total,
        }])
    }

    fn outcome() -> ForecastOutcome {
        ForecastOutcome {
            order: AGGREGATE_MODEL,
            series: series(1.0),
            train: MonthlySeries::default(),
            validation: Validation {
                holdout: series(1.0),
                predicted: Vec::new(),
                mae: 0.0,
                mape: Some(0.0),
            },
            projection: Vec::new(),
        }
    }

    #[test]
    fn loads_series_once_per_scope() {
        let cache = ForecastCache::new();
        let calls = Cell::new(0);
        let load = || {
            calls.set(calls.get() + 1);
            Ok(series(5.0))
        };

        let first = cache.monthly_series(&Scope::All, VERSION, load).unwrap();
        let second = cache.monthly_series(&Scope::All, VERSION, load).unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(first, second);
    }

    #[test]
    fn scopes_and_versions_are_cached_separately() {
        let cache = ForecastCache::new();
        let category = Scope::Category("Restaurants".to_owned());
        let newer = DataVersion {
            row_count: 11,
            max_id: 11,
        };

        cache.monthly_series(&Scope::All, VERSION, || Ok(series(1.0))).unwrap();
        let by_category = cache.monthly_series(&category, VERSION, || Ok(series(2.0))).unwrap();
        let by_version = cache.monthly_series(&Scope::All, newer, || Ok(series(3.0))).unwrap();

        assert_eq!(by_category.total(), 2.0);
        assert_eq!(by_version.total(), 3.0);
    }

    #[test]
    fn load_errors_are_not_cached() {
        let cache = ForecastCache::new();

        let failed = cache.monthly_series(&Scope::All, VERSION, || {
            Err(Error::InvalidAmount("abc".to_owned()))
        });
        let retried = cache.monthly_series(&Scope::All, VERSION, || Ok(series(1.0)));

        assert_eq!(failed, Err(Error::InvalidAmount("abc".to_owned())));
        assert!(retried.is_ok());
    }

    #[test]
    fn forecast_results_are_reused() {
        let cache = ForecastCache::new();
        let calls = Cell::new(0);
        let fit = || {
            calls.set(calls.get() + 1);
            Ok(outcome())
        };

        cache.forecast(&Scope::All, VERSION, fit).unwrap();
        cache.forecast(&Scope::All, VERSION, fit).unwrap();

        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn forecast_failures_are_reused() {
        let cache = ForecastCache::new();
        let calls = Cell::new(0);
        let fit = || {
            calls.set(calls.get() + 1);
            Err(ForecastError::EmptyHoldout)
        };

        let first = cache.forecast(&Scope::All, VERSION, fit);
        let second = cache.forecast(&Scope::All, VERSION, fit);

        assert_eq!(calls.get(), 1);
        assert_eq!(first, Err(Error::Forecast(ForecastError::EmptyHoldout)));
        assert_eq!(second, first);
    }

    #[test]
    fn concurrent_misses_fit_once() {
        let cache = ForecastCache::new();
        let calls = AtomicUsize::new(0);
        let fit = || {
            calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            Ok(outcome())
        };

        let outcomes: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| cache.forecast(&Scope::All, VERSION, fit)))
                .collect();

            handles.into_iter().map(|handle| handle.join().unwrap()).collect()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for outcome in &outcomes {
            assert!(Arc::ptr_eq(outcome.as_ref().unwrap(), outcomes[0].as_ref().unwrap()));
        }
    }

    #[test]
    fn fitting_one_scope_does_not_block_another() {
        let cache = ForecastCache::new();
        let category = Scope::Category("Restaurants".to_owned());

        let aggregate = cache.forecast(&Scope::All, VERSION, || {
            assert!(cache.forecast(&category, VERSION, || Ok(outcome())).is_ok());
            Ok(outcome())
        });

        assert!(aggregate.is_ok());
        assert!(cache.forecast(&category, VERSION, || Err(ForecastError::EmptyHoldout)).is_ok());
    }

    #[test]
    fn reads_version_from_ledger() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        assert_eq!(
            DataVersion::read(&conn).unwrap(),
            DataVersion {
                row_count: 0,
                max_id: 0
            }
        );

        insert_ledger_entry(&LedgerEntry::build("$1.00", date!(2019 - 01 - 01)), &conn).unwrap();
        insert_ledger_entry(&LedgerEntry::build("$2.00", date!(2019 - 01 - 02)), &conn).unwrap();

        assert_eq!(
            DataVersion::read(&conn).unwrap(),
            DataVersion {
                row_count: 2,
                max_id: 2
            }
        );
    }
}
