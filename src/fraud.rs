//! The errors and fraud page.
//!
//! Error counts come straight from the ledger. Fraud rates and amounts come
//! from the precomputed files in [crate::fraud_stats].

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use axum::{
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    charts::{DashboardChart, ValueFormat, chart_container, charts_script, horizontal_bar_chart},
    config::{ERROR_TYPE_LIMIT, TOP_CATEGORY_LIMIT},
    endpoints,
    fraud_stats::{
        AverageAmounts, CategoryFraudRate, ErrorFraudRate, load_average_amounts,
        load_fraud_by_category, load_fraud_by_error,
    },
    html::{
        ECHARTS_SCRIPT, HeadElement, PAGE_CONTAINER_STYLE, SECTION_HEADING_STYLE, base,
        format_currency, metric_card,
    },
    ledger::{ErrorCount, get_error_distribution},
    navigation::NavBar,
};

/// The state needed for the errors and fraud page.
#[derive(Debug, Clone)]
pub struct FraudState {
    /// The database connection for reading the ledger.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The directory holding the precomputed fraud statistics.
    pub data_dir: PathBuf,
}

impl FromRef<AppState> for FraudState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            data_dir: state.data_dir.clone(),
        }
    }
}

/// Display the error distribution and the fraud statistics.
///
/// # Errors
/// Returns [Error::InvalidCSV] if a statistics file is missing or malformed.
pub async fn get_fraud_page(State(state): State<FraudState>) -> Result<Response, Error> {
    let error_counts = {
        let connection = state
            .db_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)?;

        get_error_distribution(ERROR_TYPE_LIMIT, &connection)?
    };

    let fraud_by_error = load_fraud_by_error(&state.data_dir)?;
    let amounts = load_average_amounts(&state.data_dir)?;
    let mut fraud_by_category = load_fraud_by_category(&state.data_dir)?;
    fraud_by_category.truncate(TOP_CATEGORY_LIMIT);

    let charts = [
        error_distribution_chart(error_counts),
        fraud_by_error_chart(fraud_by_error),
        fraud_by_category_chart(fraud_by_category),
    ];

    Ok(fraud_view(&charts, &amounts).into_response())
}

fn error_distribution_chart(counts: Vec<ErrorCount>) -> DashboardChart {
    let bars = counts
        .into_iter()
        .map(|count| (count.error, count.transaction_count as f64))
        .collect();

    DashboardChart::new(
        "error-distribution-chart",
        horizontal_bar_chart(
            "Distribution of Transaction Errors",
            "Transactions with a single error type",
            "Transactions",
            bars,
            ValueFormat::Count,
        ),
    )
}

fn fraud_by_error_chart(rates: Vec<ErrorFraudRate>) -> DashboardChart {
    let bars = rates
        .into_iter()
        .map(|rate| (rate.errors, rate.fraud_rate))
        .collect();

    DashboardChart::new(
        "fraud-by-error-chart",
        horizontal_bar_chart(
            "Fraud Rate by Error Type",
            "Share of transactions labelled as fraud",
            "Fraud Rate",
            bars,
            ValueFormat::Percent,
        ),
    )
}

fn fraud_by_category_chart(rates: Vec<CategoryFraudRate>) -> DashboardChart {
    let bars = rates
        .into_iter()
        .map(|rate| (rate.description, rate.fraud_rate))
        .collect();

    DashboardChart::new(
        "fraud-by-category-chart",
        horizontal_bar_chart(
            "Fraud Rate by Merchant Category: Top 10",
            "Share of transactions labelled as fraud",
            "Fraud Rate",
            bars,
            ValueFormat::Percent,
        ),
    )
}

fn fraud_view(charts: &[DashboardChart; 3], amounts: &AverageAmounts) -> Markup {
    let nav_bar = NavBar::new(endpoints::FRAUD_VIEW).into_html();
    let [error_distribution, fraud_by_error, fraud_by_category] = charts;

    let content = html!(
        (nav_bar)

        div class=(PAGE_CONTAINER_STYLE)
        {
            h1 class="text-2xl font-bold mb-2" { "Error & Fraud Analysis" }
            p class="mb-6 text-gray-600 dark:text-gray-400"
            {
                "Transaction errors, their relationship to fraud, and where fraud occurs."
            }

            section class="w-full mb-8"
            {
                (chart_container(error_distribution))
            }

            section class="w-full grid grid-cols-1 lg:grid-cols-4 gap-4 mb-8"
            {
                div class="lg:col-span-3"
                {
                    (chart_container(fraud_by_error))
                }

                div class="flex flex-col gap-4"
                {
                    h3 class=(SECTION_HEADING_STYLE) { "How Much Do Fraudsters Spend?" }

                    (metric_card("Typical Transaction (avg)", &format_currency(amounts.typical)))
                    (metric_card("Fraudulent Transaction (avg)", &format_currency(amounts.fraudulent)))
                }
            }

            section class="w-full"
            {
                (chart_container(fraud_by_category))
            }
        }
    );

    let scripts = [
        HeadElement::ScriptLink(ECHARTS_SCRIPT.to_owned()),
        charts_script(charts),
    ];

    base("Errors & Fraud", &scripts, &content)
}

#[cfg(test)]
mod tests {
    use std::{
        fs,
        path::Path,
        sync::{Arc, Mutex},
    };

    use axum::extract::State;
    use rusqlite::Connection;
    use tempfile::tempdir;
    use time::macros::date;

    use crate::{
        Error,
        fraud_stats::{FRAUD_AMOUNTS_FILE, FRAUD_BY_CATEGORY_FILE, FRAUD_BY_ERROR_FILE},
        ledger::{LedgerEntry, insert_ledger_entry},
        test_utils::{
            assert_chart_exists, assert_metric, assert_status_ok, assert_valid_html,
            get_test_connection, parse_html_document,
        },
    };

    use super::{FraudState, get_fraud_page};

    fn write_statistics(dir: &Path) {
        fs::write(
            dir.join(FRAUD_BY_ERROR_FILE),
            "errors,total_transactions,fraud_count,fraud_rate\n\
            Bad CVV,5000,120,2.4\n\
            ,1000000,1200,0.12\n",
        )
        .unwrap();
        fs::write(
            dir.join(FRAUD_BY_CATEGORY_FILE),
            "description,total_transactions,fraud_count,fraud_rate\n\
            Taxicabs,1500,15,1.0\n",
        )
        .unwrap();
        fs::write(
            dir.join(FRAUD_AMOUNTS_FILE),
            "is_fraud,avg_amount,min_amount,max_amount\n\
            No,42.5,-500.0,6000.0\n\
            Yes,110.25,-80.0,1500.0\n",
        )
        .unwrap();
    }

    fn state_with(conn: Connection, data_dir: &Path) -> FraudState {
        FraudState {
            db_connection: Arc::new(Mutex::new(conn)),
            data_dir: data_dir.to_path_buf(),
        }
    }

    #[tokio::test]
    async fn fraud_page_shows_charts_and_amounts() {
        let dir = tempdir().unwrap();
        write_statistics(dir.path());
        let conn = get_test_connection();
        insert_ledger_entry(
            &LedgerEntry::build("$5.00", date!(2019 - 01 - 01)).errors("Bad PIN"),
            &conn,
        )
        .unwrap();

        let response = get_fraud_page(State(state_with(conn, dir.path())))
            .await
            .unwrap();

        assert_status_ok(&response);
        let html = parse_html_document(response).await;
        assert_valid_html(&html);
        assert_chart_exists(&html, "error-distribution-chart");
        assert_chart_exists(&html, "fraud-by-error-chart");
        assert_chart_exists(&html, "fraud-by-category-chart");
        assert_metric(&html, "Typical Transaction (avg)", "$42.50");
        assert_metric(&html, "Fraudulent Transaction (avg)", "$110.25");
    }

    #[tokio::test]
    async fn missing_statistics_is_an_error() {
        let dir = tempdir().unwrap();

        let result = get_fraud_page(State(state_with(get_test_connection(), dir.path()))).await;

        assert!(matches!(result, Err(Error::InvalidCSV(_))));
    }
}
