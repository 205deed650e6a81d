//! Spendscope is a web dashboard for exploring a ledger of card transactions.
//!
//! The ledger is a static SQLite database. The dashboard aggregates spending
//! by calendar month, shows where money goes by merchant category, summarises
//! transaction errors and fraud, and forecasts monthly spending with a
//! seasonal ARIMA model that is validated against a holdout year.
//!
//! This library serves the dashboard as server-rendered HTML pages.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use tokio::signal;

mod app_state;
mod categories;
mod charts;
pub mod config;
mod db;
mod endpoints;
pub mod forecast;
mod forecasting;
mod fraud;
pub mod fraud_stats;
mod html;
mod internal_server_error;
pub mod ledger;
pub mod monthly;
mod navigation;
mod not_found;
mod overview;
mod routing;
#[cfg(test)]
mod test_utils;

pub use app_state::AppState;
pub use db::initialize as initialize_db;
pub use routing::build_router;

use crate::{
    forecast::ForecastError, forecasting::explain_forecast_error,
    internal_server_error::InternalServerError, not_found::get_404_not_found_response,
};

/// The prefix of [Error::InvalidAmount]'s message, used to recover the error
/// after it has passed through SQLite as text.
const INVALID_AMOUNT_PREFIX: &str = "could not parse amount: ";

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A ledger amount could not be parsed as a number.
    ///
    /// The amount is never coerced to zero since that would silently skew
    /// every total it contributes to.
    #[error("could not parse amount: {0}")]
    InvalidAmount(String),

    /// The selection matched no transactions, e.g. an unknown category.
    ///
    /// The string describes the selection.
    #[error("there are no transactions for {0}")]
    NoData(String),

    /// The forecast pipeline could not produce a forecast.
    #[error(transparent)]
    Forecast(#[from] ForecastError),

    /// A precomputed statistics file was missing or could not be parsed.
    #[error("Could not parse the CSV file: {0}")]
    InvalidCSV(String),

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// Could not acquire the lock on the forecast cache
    #[error("could not acquire the forecast cache lock")]
    CacheLockError,

    /// The blocking task that fits a forecast panicked or was cancelled.
    #[error("the forecast task did not finish: {0}")]
    ForecastTaskFailed(String),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Errors raised by `parse_amount` inside a query come back as text.
            rusqlite::Error::SqliteFailure(_, Some(ref message))
                if message.starts_with(INVALID_AMOUNT_PREFIX) =>
            {
                Error::InvalidAmount(message[INVALID_AMOUNT_PREFIX.len()..].to_owned())
            }
            rusqlite::Error::UserFunctionError(error) => match error.downcast::<Error>() {
                Ok(error) => *error,
                Err(error) => {
                    tracing::error!("an unhandled SQL function error occurred: {}", error);
                    Error::SqlError(rusqlite::Error::UserFunctionError(error))
                }
            },
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::NotFound => get_404_not_found_response(),
            Error::NoData(selection) => InternalServerError {
                status: StatusCode::NOT_FOUND,
                header: "No Data",
                description: &format!("There are no transactions for {selection}."),
                fix: "Choose a different category from the list.",
            }
            .into_response(),
            Error::InvalidAmount(amount) => {
                tracing::error!("the ledger contains an invalid amount: {amount:?}");
                InternalServerError {
                    description: &format!(
                        "The ledger contains an amount that is not a number: \"{amount}\"."
                    ),
                    fix: "Check the source data and rebuild the database.",
                    ..Default::default()
                }
                .into_response()
            }
            Error::Forecast(error) => {
                tracing::warn!("could not forecast: {error}");
                let (status, fix) = match error {
                    ForecastError::FitFailed(_) | ForecastError::InvalidConfiguration(_) => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Check the server logs for details.",
                    ),
                    _ => (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        "Choose a selection with a longer transaction history.",
                    ),
                };

                InternalServerError {
                    status,
                    header: "No Forecast",
                    description: &explain_forecast_error(&error),
                    fix,
                }
                .into_response()
            }
            Error::DatabaseLockError => InternalServerError::default().into_response(),
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                InternalServerError::default().into_response()
            }
        }
    }
}

#[cfg(test)]
mod error_tests {
    use axum::{http::StatusCode, response::IntoResponse};
    use rusqlite::Connection;

    use crate::{Error, db::initialize, forecast::ForecastError};

    #[test]
    fn amount_error_survives_sqlite() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();

        let error: Error = conn
            .query_row("SELECT parse_amount('twelve dollars')", [], |row| {
                row.get::<_, f64>(0)
            })
            .unwrap_err()
            .into();

        assert_eq!(error, Error::InvalidAmount("twelve dollars".to_owned()));
    }

    #[test]
    fn no_rows_is_not_found() {
        let error: Error = rusqlite::Error::QueryReturnedNoRows.into();

        assert_eq!(error, Error::NotFound);
    }

    #[test]
    fn data_errors_are_not_server_errors() {
        let no_data = Error::NoData("category \"Casinos\"".to_owned()).into_response();
        let short_history = Error::Forecast(ForecastError::InsufficientHistory {
            required: 12,
            available: 3,
        })
        .into_response();

        assert_eq!(no_data.status(), StatusCode::NOT_FOUND);
        assert_eq!(short_history.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn fit_failure_is_server_error() {
        let response =
            Error::Forecast(ForecastError::FitFailed("did not converge".to_owned())).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = Error::ForecastTaskFailed("task panicked".to_owned()).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
