//! The categories page: where money goes by merchant category.
//!
//! The page shows the busiest and most expensive categories and a trend chart
//! for one selected category. Changing the selection swaps in a new trend
//! chart with HTMX instead of reloading the page.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Query, State},
    response::{IntoResponse, Response},
};
use axum_htmx::HxRequest;
use maud::{Markup, html};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error,
    charts::{
        DashboardChart, ValueFormat, chart_container, charts_inline_script, charts_script,
        horizontal_bar_chart, monthly_line_chart,
    },
    config::TOP_CATEGORY_LIMIT,
    endpoints,
    forecast::{DataVersion, ForecastCache},
    html::{
        ECHARTS_SCRIPT, FORM_LABEL_STYLE, FORM_SELECT_STYLE, HeadElement, PAGE_CONTAINER_STYLE,
        SECTION_HEADING_STYLE, base, link,
    },
    ledger::{
        CategoryStats, Scope, category_exists, get_category_labels, top_categories_by_average,
        top_categories_by_volume,
    },
    monthly::{MonthlySeries, format_month, load_monthly_series},
    navigation::NavBar,
};

/// The element that HTMX swaps the trend chart into.
const TREND_TARGET: &str = "category-trend";

/// The state needed for the categories page.
#[derive(Debug, Clone)]
pub struct CategoriesState {
    /// The database connection for reading the ledger.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The ledger version that cached series are keyed by.
    pub data_version: DataVersion,
    /// Monthly series shared with the forecasting page.
    pub forecast_cache: Arc<ForecastCache>,
}

impl FromRef<AppState> for CategoriesState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            data_version: state.data_version,
            forecast_cache: state.forecast_cache.clone(),
        }
    }
}

/// The category selected for the trend chart.
#[derive(Debug, Default, Deserialize)]
pub struct CategoryQuery {
    /// The exact MCC description. Defaults to the first category
    /// alphabetically.
    pub category: Option<String>,
}

/// Display the category breakdown, or only the trend chart for HTMX requests.
///
/// # Errors
/// Returns [Error::NoData] if the selected category is unknown or has no
/// transactions.
pub async fn get_categories_page(
    State(state): State<CategoriesState>,
    HxRequest(is_htmx_request): HxRequest,
    Query(query): Query<CategoryQuery>,
) -> Result<Response, Error> {
    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let labels = get_category_labels(&connection)?;

    let selected = match query.category.or_else(|| labels.first().cloned()) {
        Some(selected) => selected,
        None => return Ok(categories_no_data_view().into_response()),
    };

    let trend = category_trend_chart(&selected, &state, &connection)?;

    if is_htmx_request {
        return Ok(trend_partial(&selected, &trend).into_response());
    }

    let by_volume = top_categories_by_volume(TOP_CATEGORY_LIMIT, &connection)?;
    let by_average = top_categories_by_average(TOP_CATEGORY_LIMIT, &connection)?;

    let bar_charts = [volume_chart(by_volume), average_chart(by_average)];

    Ok(categories_view(&bar_charts, &labels, &selected, &trend).into_response())
}

fn category_trend_chart(
    label: &str,
    state: &CategoriesState,
    connection: &Connection,
) -> Result<DashboardChart, Error> {
    let scope = Scope::Category(label.to_owned());

    if !category_exists(label, connection)? {
        tracing::debug!("unknown category requested: {label:?}");
        return Err(Error::NoData(scope.to_string()));
    }

    let series = state
        .forecast_cache
        .monthly_series(&scope, state.data_version, || {
            load_monthly_series(&scope, connection)
        })?;

    if series.is_empty() {
        return Err(Error::NoData(scope.to_string()));
    }

    Ok(trend_chart(label, &series))
}

fn trend_chart(label: &str, series: &MonthlySeries) -> DashboardChart {
    let labels = series.months().into_iter().map(format_month).collect();
    let actual = series.values().into_iter().map(Some).collect();

    DashboardChart::new(
        "category-trend-chart",
        monthly_line_chart(
            &format!("{label} Spending Trend"),
            "Monthly totals with 3 and 12 month moving averages",
            labels,
            vec![
                ("Actual", actual),
                ("3-Month MA", series.rolling_mean(3)),
                ("12-Month MA", series.rolling_mean(12)),
            ],
        ),
    )
}

fn volume_chart(categories: Vec<CategoryStats>) -> DashboardChart {
    let bars = categories
        .into_iter()
        .map(|category| (category.description, category.transaction_count as f64))
        .collect();

    DashboardChart::new(
        "volume-chart",
        horizontal_bar_chart(
            "Top 10 Categories by Transaction Volume",
            "Number of transactions",
            "Transactions",
            bars,
            ValueFormat::Count,
        ),
    )
}

fn average_chart(categories: Vec<CategoryStats>) -> DashboardChart {
    let bars = categories
        .into_iter()
        .map(|category| (category.description, category.average_amount))
        .collect();

    DashboardChart::new(
        "average-chart",
        horizontal_bar_chart(
            "Top 10 Categories by Average Transaction Size",
            "Average transaction amount",
            "Average Transaction",
            bars,
            ValueFormat::Currency,
        ),
    )
}

fn categories_no_data_view() -> Markup {
    let nav_bar = NavBar::new(endpoints::CATEGORIES_VIEW).into_html();
    let overview_link = link(endpoints::OVERVIEW_VIEW, "overview");

    let content = html!(
        (nav_bar)

        div class=(PAGE_CONTAINER_STYLE)
        {
            h2 class="text-xl font-bold" { "Nothing here yet..." }

            p
            {
                "No transactions have a merchant category. Ledger totals are on the "
                (overview_link) " page."
            }
        }
    );

    base("Categories", &[], &content)
}

fn categories_view(
    bar_charts: &[DashboardChart],
    labels: &[String],
    selected: &str,
    trend: &DashboardChart,
) -> Markup {
    let nav_bar = NavBar::new(endpoints::CATEGORIES_VIEW).into_html();

    let content = html!(
        (nav_bar)

        div class=(PAGE_CONTAINER_STYLE)
        {
            h1 class="text-2xl font-bold mb-2" { "Spending by Category" }
            p class="mb-6 text-gray-600 dark:text-gray-400"
            {
                "Breakdown of transaction volume and spend across merchant categories."
            }

            section class="w-full grid grid-cols-1 xl:grid-cols-2 gap-4 mb-8"
            {
                @for chart in bar_charts {
                    (chart_container(chart))
                }
            }

            section class="w-full"
            {
                h3 class=(SECTION_HEADING_STYLE) { "Category Spending Trends" }

                form class="mb-4"
                {
                    label for="category" class=(FORM_LABEL_STYLE) { "Select a category" }

                    select
                        id="category"
                        name="category"
                        class=(FORM_SELECT_STYLE)
                        hx-get=(endpoints::CATEGORIES_VIEW)
                        hx-target={ "#" (TREND_TARGET) }
                        hx-trigger="change"
                        hx-push-url="true"
                        hx-indicator="#trend-indicator"
                    {
                        @for label in labels {
                            option value=(label) selected[label == selected] { (label) }
                        }
                    }

                    span id="trend-indicator" class="htmx-indicator text-sm" { "Loading..." }
                }

                div id=(TREND_TARGET)
                {
                    (trend_partial(selected, trend))
                }
            }
        }
    );

    let scripts = [
        HeadElement::ScriptLink(ECHARTS_SCRIPT.to_owned()),
        charts_script(bar_charts),
    ];

    base("Categories", &scripts, &content)
}

/// The trend chart for `label` with the script that draws it.
fn trend_partial(label: &str, trend: &DashboardChart) -> Markup {
    html!(
        div data-category=(label)
        {
            (chart_container(trend))
            (charts_inline_script(std::slice::from_ref(trend)))
        }
    )
}
