//! The overview page: ledger-wide totals, monthly spending and the biggest
//! spenders.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    charts::{DashboardChart, chart_container, charts_script, monthly_line_chart},
    config::TOP_CLIENT_LIMIT,
    endpoints,
    forecast::{DataVersion, ForecastCache},
    html::{
        ECHARTS_SCRIPT, HeadElement, PAGE_CONTAINER_STYLE, SECTION_HEADING_STYLE,
        TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE, base, format_count,
        format_currency, metric_card,
    },
    ledger::{ClientSpend, OverviewTotals, Scope, get_overview_totals, top_clients_by_spend},
    monthly::{MonthlySeries, format_month, load_monthly_series},
    navigation::NavBar,
};

/// The state needed for the overview page.
#[derive(Debug, Clone)]
pub struct OverviewState {
    /// The database connection for reading the ledger.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The ledger version that cached series are keyed by.
    pub data_version: DataVersion,
    /// Monthly series shared with the forecasting page.
    pub forecast_cache: Arc<ForecastCache>,
}

impl FromRef<AppState> for OverviewState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            data_version: state.data_version,
            forecast_cache: state.forecast_cache.clone(),
        }
    }
}

/// Display the ledger-wide totals, the monthly spending chart and the top
/// spenders.
pub async fn get_overview_page(State(state): State<OverviewState>) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let totals = get_overview_totals(&connection)
        .inspect_err(|error| tracing::error!("could not get overview totals: {error}"))?;

    if totals.transaction_count == 0 {
        return Ok(overview_no_data_view().into_response());
    }

    let series = state
        .forecast_cache
        .monthly_series(&Scope::All, state.data_version, || {
            load_monthly_series(&Scope::All, &connection)
        })?;
    let top_clients = top_clients_by_spend(TOP_CLIENT_LIMIT, &connection)?;

    let chart = monthly_spend_chart(&series);

    Ok(overview_view(&totals, &chart, &top_clients).into_response())
}

fn monthly_spend_chart(series: &MonthlySeries) -> DashboardChart {
    let labels = series.months().into_iter().map(format_month).collect();
    let totals = series.values().into_iter().map(Some).collect();

    DashboardChart::new(
        "monthly-spend-chart",
        monthly_line_chart(
            "Monthly Spending Over Time",
            "Total spend per calendar month",
            labels,
            vec![("Total Spend", totals)],
        ),
    )
}

fn overview_no_data_view() -> Markup {
    let nav_bar = NavBar::new(endpoints::OVERVIEW_VIEW).into_html();

    let content = html!(
        (nav_bar)

        div class=(PAGE_CONTAINER_STYLE)
        {
            h2 class="text-xl font-bold" { "Nothing here yet..." }

            p { "The ledger has no transactions. Charts will show up here once the database has been loaded." }
        }
    );

    base("Overview", &[], &content)
}

fn overview_view(
    totals: &OverviewTotals,
    chart: &DashboardChart,
    top_clients: &[ClientSpend],
) -> Markup {
    let nav_bar = NavBar::new(endpoints::OVERVIEW_VIEW).into_html();

    let content = html!(
        (nav_bar)

        div class=(PAGE_CONTAINER_STYLE)
        {
            h1 class="text-2xl font-bold mb-6" { "Spending Overview" }

            section class="w-full grid grid-cols-1 md:grid-cols-3 gap-4 mb-6"
            {
                (metric_card("Total Spend", &format_currency(totals.total_spent)))
                (metric_card("Total Transactions", &format_count(totals.transaction_count)))
                (metric_card("Unique Users", &format_count(totals.unique_clients)))
            }

            section class="w-full mb-6"
            {
                (chart_container(chart))
            }

            section class="w-full"
            {
                h3 class=(SECTION_HEADING_STYLE) { "Top 10 Users by Spend" }

                (top_clients_table(top_clients))
            }
        }
    );

    let scripts = [
        HeadElement::ScriptLink(ECHARTS_SCRIPT.to_owned()),
        charts_script(std::slice::from_ref(chart)),
    ];

    base("Overview", &scripts, &content)
}

fn top_clients_table(clients: &[ClientSpend]) -> Markup {
    html!(
        div class="overflow-x-auto rounded-lg shadow"
        {
            table id="top-clients" class="w-full text-sm text-left text-gray-500 dark:text-gray-400"
            {
                thead class=(TABLE_HEADER_STYLE)
                {
                    tr
                    {
                        th scope="col" class=(TABLE_CELL_STYLE) { "Client ID" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Total Spent" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Total Transactions" }
                    }
                }

                tbody
                {
                    @for client in clients {
                        tr class=(TABLE_ROW_STYLE)
                        {
                            td class=(TABLE_CELL_STYLE) { (client.client_id) }
                            td class=(TABLE_CELL_STYLE) { (format_currency(client.total_spent)) }
                            td class=(TABLE_CELL_STYLE) { (format_count(client.transaction_count)) }
                        }
                    }
                }
            }
        }
    )
}
