//! The forecasting page.
//!
//! The page validates the aggregate model against the holdout year, shows the
//! projection past the last observed month, and does the same for one of the
//! busiest categories. Forecast failures are data problems more often than
//! not, so they are shown in place of the affected section instead of failing
//! the whole page.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Query, State},
    response::{IntoResponse, Response},
};
use axum_htmx::HxRequest;
use charming::{
    Chart,
    element::{AreaStyle, LineStyle, Symbol},
    series::Line,
};
use maud::{Markup, html};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    categories::CategoryQuery,
    charts::{
        DashboardChart, chart_container, charts_inline_script, charts_script, monthly_line_chart,
    },
    config::{CONFIDENCE_LEVEL, ForecastSettings, TOP_CATEGORY_LIMIT},
    endpoints,
    forecast::{
        DataVersion, ForecastCache, ForecastError, ForecastOutcome, ForecastPoint, run_forecast,
    },
    html::{
        ECHARTS_SCRIPT, FORM_LABEL_STYLE, FORM_SELECT_STYLE, HeadElement, PAGE_CONTAINER_STYLE,
        SECTION_HEADING_STYLE, base, format_currency_rounded, format_percent, metric_card, notice,
    },
    ledger::{Scope, category_exists, top_categories_by_volume},
    monthly::{MonthlySeries, format_month, load_monthly_series},
    navigation::NavBar,
};

/// The element that HTMX swaps the category forecast into.
const CATEGORY_FORECAST_TARGET: &str = "category-forecast";

/// The state needed for the forecasting page.
#[derive(Debug, Clone)]
pub struct ForecastingState {
    /// The database connection for reading the ledger.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The ledger version that cached results are keyed by.
    pub data_version: DataVersion,
    /// Fitted forecasts, so that each scope is only fitted once.
    pub forecast_cache: Arc<ForecastCache>,
    /// The holdout window and horizon.
    pub forecast_settings: ForecastSettings,
}

impl FromRef<AppState> for ForecastingState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            data_version: state.data_version,
            forecast_cache: state.forecast_cache.clone(),
            forecast_settings: state.forecast_settings,
        }
    }
}

/// Describe a forecast failure to the user.
pub(crate) fn explain_forecast_error(error: &ForecastError) -> String {
    match error {
        ForecastError::NoData => "There are no transactions to forecast.".to_owned(),
        ForecastError::InsufficientHistory {
            required,
            available,
        } => format!(
            "The model needs at least {required} months of history before the holdout period, \
            but only {available} are available."
        ),
        ForecastError::EmptyHoldout => "There are no transactions in the holdout period, \
            so the model cannot be validated."
            .to_owned(),
        ForecastError::FitFailed(reason) => {
            format!("The model could not be fitted to this data: {reason}.")
        }
        ForecastError::InvalidConfiguration(reason) => {
            format!("The forecast settings are invalid: {reason}.")
        }
    }
}

/// Display the aggregate forecast and the forecast for one category, or only
/// the category forecast for HTMX requests.
///
/// # Errors
/// Returns [Error::NoData] if the selected category is unknown. Forecast
/// errors are rendered as notices.
pub async fn get_forecast_page(
    State(state): State<ForecastingState>,
    HxRequest(is_htmx_request): HxRequest,
    Query(query): Query<CategoryQuery>,
) -> Result<Response, Error> {
    let (top_categories, selected, category_series, aggregate_series) = {
        let connection = state
            .db_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)?;

        let top_categories: Vec<String> =
            top_categories_by_volume(TOP_CATEGORY_LIMIT, &connection)?
                .into_iter()
                .map(|category| category.description)
                .collect();

        let selected = query.category.or_else(|| top_categories.first().cloned());

        let category_series = match &selected {
            Some(label) => {
                let scope = Scope::Category(label.clone());
                if !category_exists(label, &connection)? {
                    return Err(Error::NoData(scope.to_string()));
                }

                let series = cached_series(&scope, &state, &connection)?;
                Some((scope, series))
            }
            None => None,
        };

        let aggregate_series = (!is_htmx_request)
            .then(|| cached_series(&Scope::All, &state, &connection))
            .transpose()?;

        (top_categories, selected, category_series, aggregate_series)
    };

    let category_section = match (&selected, category_series) {
        (Some(label), Some((scope, series))) => {
            let outcome = forecast_section(forecast_in_background(scope, series, &state).await)?;
            category_forecast_view(label, outcome.as_deref())
        }
        _ => notice(
            "No categories",
            "No transactions have a merchant category, so there is nothing to forecast by industry.",
        ),
    };

    let Some(aggregate_series) = aggregate_series else {
        return Ok(category_section.into_response());
    };

    let aggregate =
        forecast_section(forecast_in_background(Scope::All, aggregate_series, &state).await)?;

    Ok(forecast_view(
        aggregate.as_deref(),
        &top_categories,
        selected.as_deref(),
        &category_section,
    )
    .into_response())
}

/// Get the monthly series for `scope`, from the cache if possible.
fn cached_series(
    scope: &Scope,
    state: &ForecastingState,
    connection: &Connection,
) -> Result<Arc<MonthlySeries>, Error> {
    state
        .forecast_cache
        .monthly_series(scope, state.data_version, || {
            load_monthly_series(scope, connection)
        })
}

/// Get the forecast for `series`, from the cache if possible.
///
/// Fitting is CPU bound, so it runs on the blocking thread pool and never
/// while the database lock is held.
async fn forecast_in_background(
    scope: Scope,
    series: Arc<MonthlySeries>,
    state: &ForecastingState,
) -> Result<Arc<ForecastOutcome>, Error> {
    let cache = state.forecast_cache.clone();
    let version = state.data_version;
    let config = state.forecast_settings.for_scope(&scope);

    tokio::task::spawn_blocking(move || {
        cache.forecast(&scope, version, || run_forecast(&series, &config))
    })
    .await
    .inspect_err(|error| tracing::error!("forecast task failed: {error}"))
    .map_err(|error| Error::ForecastTaskFailed(error.to_string()))?
}

/// Separate forecast failures, which are shown on the page, from every other
/// error.
fn forecast_section(
    result: Result<Arc<ForecastOutcome>, Error>,
) -> Result<Result<Arc<ForecastOutcome>, ForecastError>, Error> {
    match result {
        Ok(outcome) => Ok(Ok(outcome)),
        Err(Error::Forecast(error)) => Ok(Err(error)),
        Err(error) => Err(error),
    }
}

fn validation_chart(outcome: &ForecastOutcome) -> DashboardChart {
    let train_len = outcome.train.len();
    let holdout_len = outcome.validation.holdout.len();
    let labels = outcome.series.months().into_iter().map(format_month).collect();

    let training = outcome
        .train
        .values()
        .into_iter()
        .map(Some)
        .chain(std::iter::repeat_n(None, holdout_len))
        .collect();
    let actual = std::iter::repeat_n(None, train_len)
        .chain(outcome.validation.holdout.values().into_iter().map(Some))
        .collect();
    let forecast = std::iter::repeat_n(None, train_len)
        .chain(outcome.validation.predicted.iter().map(|point| Some(point.value)))
        .collect();

    let holdout_start = outcome
        .validation
        .holdout
        .first_month()
        .map(format_month)
        .unwrap_or_default();

    DashboardChart::new(
        "validation-chart",
        monthly_line_chart(
            "Model Validation: Forecast vs Actual",
            &format!("{} trained before {holdout_start}", outcome.order),
            labels,
            vec![
                ("Training", training),
                ("Actual", actual),
                ("Forecast", forecast),
            ],
        ),
    )
}

/// The observed series followed by the projection and its confidence band.
///
/// The band is drawn by stacking the interval width on top of an invisible
/// lower bound.
fn projection_chart(id: &'static str, title: &str, outcome: &ForecastOutcome) -> DashboardChart {
    let observed = outcome.series.len();
    let horizon = outcome.projection.len();

    let labels = outcome
        .series
        .months()
        .into_iter()
        .chain(outcome.projection.iter().map(|point| point.month))
        .map(format_month)
        .collect();

    let actual = outcome
        .series
        .values()
        .into_iter()
        .map(Some)
        .chain(std::iter::repeat_n(None, horizon))
        .collect();
    let projected = |value: fn(&ForecastPoint) -> f64| -> Vec<Option<f64>> {
        std::iter::repeat_n(None, observed)
            .chain(outcome.projection.iter().map(|point| Some(value(point))))
            .collect()
    };

    let chart: Chart = monthly_line_chart(
        title,
        &format!("{} refitted on all {observed} months", outcome.order),
        labels,
        vec![
            ("Actual", actual),
            ("Forecast", projected(|point| point.value)),
        ],
    );

    let band_name = format!("{:.0}% Confidence Interval", CONFIDENCE_LEVEL * 100.0);

    let chart = chart
        .series(
            Line::new()
                .name("Lower Bound")
                .data(projected(|point| point.lower))
                .stack("confidence-band")
                .symbol(Symbol::None)
                .line_style(LineStyle::new().opacity(0.0)),
        )
        .series(
            Line::new()
                .name(band_name.as_str())
                .data(projected(|point| point.upper - point.lower))
                .stack("confidence-band")
                .symbol(Symbol::None)
                .line_style(LineStyle::new().opacity(0.0))
                .area_style(AreaStyle::new().color("rgba(0, 200, 100, 0.15)")),
        );

    DashboardChart::new(id, chart)
}

fn accuracy_cards(outcome: &ForecastOutcome, label_suffix: &str) -> Markup {
    html!(
        div class="w-full grid grid-cols-1 md:grid-cols-2 gap-4 my-4"
        {
            (metric_card(
                &format!("MAE{label_suffix}"),
                &format_currency_rounded(outcome.validation.mae),
            ))
            (metric_card(
                &format!("MAPE{label_suffix}"),
                &format_percent(outcome.validation.mape),
            ))
        }
    )
}

fn forecast_view(
    aggregate: Result<&ForecastOutcome, &ForecastError>,
    top_categories: &[String],
    selected: Option<&str>,
    category_section: &Markup,
) -> Markup {
    let nav_bar = NavBar::new(endpoints::FORECAST_VIEW).into_html();

    let charts = match aggregate {
        Ok(outcome) => vec![
            validation_chart(outcome),
            projection_chart(
                "projection-chart",
                &format!("{} Month Forecast", outcome.projection.len()),
                outcome,
            ),
        ],
        Err(_) => Vec::new(),
    };

    let content = html!(
        (nav_bar)

        div class=(PAGE_CONTAINER_STYLE)
        {
            h1 class="text-2xl font-bold mb-2" { "Forecasting" }
            p class="mb-6 text-gray-600 dark:text-gray-400"
            {
                "Monthly spending forecast with a seasonal ARIMA model, validated against
                a holdout year and projected forward."
            }

            section id="aggregate-forecast" class="w-full mb-8"
            {
                @match aggregate {
                    Ok(outcome) => {
                        @if let [validation, projection] = charts.as_slice() {
                            (chart_container(validation))

                            (accuracy_cards(outcome, ""))

                            p class="mb-6 text-sm text-gray-600 dark:text-gray-400"
                            {
                                "Average error per month in dollars (MAE) and as a percentage
                                (MAPE). MAPE is n/a when a holdout month has no spending."
                            }

                            (chart_container(projection))

                            p class="text-sm text-gray-600 dark:text-gray-400"
                            {
                                "The model was refitted on the full history before forecasting.
                                The shaded area shows where spending is expected to fall."
                            }
                        }
                    }
                    Err(error) => {
                        (notice("No forecast", &explain_forecast_error(error)))
                    }
                }
            }

            section class="w-full"
            {
                h3 class=(SECTION_HEADING_STYLE) { "Forecast by Industry" }

                @if !top_categories.is_empty() {
                    form class="mb-4"
                    {
                        label for="category" class=(FORM_LABEL_STYLE) { "Select a category" }

                        select
                            id="category"
                            name="category"
                            class=(FORM_SELECT_STYLE)
                            hx-get=(endpoints::FORECAST_VIEW)
                            hx-target={ "#" (CATEGORY_FORECAST_TARGET) }
                            hx-trigger="change"
                            hx-push-url="true"
                            hx-indicator="#forecast-indicator"
                        {
                            @for label in top_categories {
                                option
                                    value=(label)
                                    selected[Some(label.as_str()) == selected]
                                { (label) }
                            }
                        }

                        span id="forecast-indicator" class="htmx-indicator text-sm"
                        {
                            "Fitting model..."
                        }
                    }
                }

                div id=(CATEGORY_FORECAST_TARGET)
                {
                    (category_section)
                }
            }
        }
    );

    let scripts = [
        HeadElement::ScriptLink(ECHARTS_SCRIPT.to_owned()),
        charts_script(&charts),
    ];

    base("Forecasting", &scripts, &content)
}

/// The forecast for one category with the script that draws it.
fn category_forecast_view(
    label: &str,
    outcome: Result<&ForecastOutcome, &ForecastError>,
) -> Markup {
    match outcome {
        Ok(outcome) => {
            let chart = projection_chart(
                "category-forecast-chart",
                &format!("{label} Forecast"),
                outcome,
            );

            html!(
                div data-category=(label)
                {
                    (chart_container(&chart))
                    (accuracy_cards(outcome, " (holdout validation)"))
                    (charts_inline_script(std::slice::from_ref(&chart)))
                }
            )
        }
        Err(error) => html!(
            div data-category=(label)
            {
                (notice(&format!("No forecast for {label}"), &explain_forecast_error(error)))
            }
        ),
    }
}
