//! Validate a model on a holdout window, then project forward.

use time::Date;

use crate::{
    config::MINIMUM_TRAINING_MONTHS,
    monthly::{MonthlySeries, next_month},
};

use super::{
    ForecastError, ModelOrder,
    metrics::{mean_absolute_error, mean_absolute_percentage_error},
    sarima::{FittedSarima, Prediction},
};

/// How to run the forecast pipeline for one series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastConfig {
    /// The model to fit.
    pub order: ModelOrder,
    /// Months on or after this date form the holdout window.
    pub holdout_start: Date,
    /// How many months to project past the last observation.
    pub horizon: usize,
    /// The coverage of the projection intervals, e.g. 0.95.
    pub confidence_level: f64,
}

/// A forecast for one month.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastPoint {
    /// The first day of the month.
    pub month: Date,
    /// The point forecast.
    pub value: f64,
    /// The lower bound of the confidence interval.
    pub lower: f64,
    /// The upper bound of the confidence interval.
    pub upper: f64,
}

/// How well the model trained before the holdout predicted the holdout.
#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    /// The observed holdout months.
    pub holdout: MonthlySeries,
    /// The forecast for each holdout month.
    pub predicted: Vec<ForecastPoint>,
    /// Mean absolute error in dollars.
    pub mae: f64,
    /// Mean absolute percentage error, `None` if any holdout month is zero.
    pub mape: Option<f64>,
}

/// Everything the forecast page shows for one series.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastOutcome {
    /// The model that was fitted.
    pub order: ModelOrder,
    /// The series the models were fitted on, one sample per month.
    pub series: MonthlySeries,
    /// The months before the holdout window.
    pub train: MonthlySeries,
    /// The holdout scores.
    pub validation: Validation,
    /// The forecast for the months after the last observation.
    pub projection: Vec<ForecastPoint>,
}

/// Run the forecast pipeline on `series`.
///
/// Missing months are filled with zero before splitting so that the model
/// sees one sample per month. The series is split at
/// `config.holdout_start`, a model is fitted on the months before it and
/// scored on the months after it, then a second model is fitted on the whole
/// series to project `config.horizon` months past the last observation.
///
/// # Errors
/// - [ForecastError::NoData] if `series` is empty. No model is fitted.
/// - [ForecastError::InsufficientHistory] if there is less than one seasonal
///   cycle before the holdout, or too little for the model order.
/// - [ForecastError::EmptyHoldout] if nothing falls in the holdout window.
/// - [ForecastError::FitFailed] if either fit fails.
pub fn run_forecast(
    series: &MonthlySeries,
    config: &ForecastConfig,
) -> Result<ForecastOutcome, ForecastError> {
    let series = series.with_gaps_filled();
    let Some(last_month) = series.last_month() else {
        return Err(ForecastError::NoData);
    };

    let (train, holdout) = series.split_at(config.holdout_start);

    if train.len() < MINIMUM_TRAINING_MONTHS {
        return Err(ForecastError::InsufficientHistory {
            required: MINIMUM_TRAINING_MONTHS,
            available: train.len(),
        });
    }

    if holdout.is_empty() {
        return Err(ForecastError::EmptyHoldout);
    }

    let validation_model = FittedSarima::fit(config.order, &train.values())?;
    let predicted = label_months(
        holdout.months(),
        validation_model.forecast(holdout.len(), config.confidence_level)?,
    );

    let actual = holdout.values();
    let predicted_values: Vec<f64> = predicted.iter().map(|point| point.value).collect();
    let mae = mean_absolute_error(&actual, &predicted_values);
    let mape = mean_absolute_percentage_error(&actual, &predicted_values);

    let production_model = FittedSarima::fit(config.order, &series.values())?;
    let projection_months =
        std::iter::successors(Some(next_month(last_month)), |month| Some(next_month(*month)))
            .take(config.horizon);
    let projection = label_months(
        projection_months,
        production_model.forecast(config.horizon, config.confidence_level)?,
    );

    tracing::debug!(
        "{} validated on {} months: MAE {mae:.2}, MAPE {mape:?}",
        config.order,
        holdout.len()
    );

    Ok(ForecastOutcome {
        order: config.order,
        series,
        train,
        validation: Validation {
            holdout,
            predicted,
            mae,
            mape,
        },
        projection,
    })
}

fn label_months(
    months: impl IntoIterator<Item = Date>,
    predictions: Vec<Prediction>,
) -> Vec<ForecastPoint> {
    months
        .into_iter()
        .zip(predictions)
        .map(|(month, prediction)| ForecastPoint {
            month,
            value: prediction.value,
            lower: prediction.lower,
            upper: prediction.upper,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use time::{Date, macros::date};

    use crate::{
        config::{AGGREGATE_MODEL, CATEGORY_MODEL, CONFIDENCE_LEVEL, FORECAST_HORIZON},
        forecast::{ForecastError, ModelOrder},
        monthly::{MonthlySeries, MonthlyTotal, add_months, next_month},
    };

    use super::{ForecastConfig, run_forecast};

    fn config(order: ModelOrder) -> ForecastConfig {
        ForecastConfig {
            order,
            holdout_start: date!(2019 - 01 - 01),
            horizon: FORECAST_HORIZON,
            confidence_level: CONFIDENCE_LEVEL,
        }
    }

    fn series_from(start: Date, values: impl IntoIterator<Item = f64>) -> MonthlySeries {
        MonthlySeries::new(
            values
                .into_iter()
                .enumerate()
                .map(|(i, total)| MonthlyTotal {
                    month: add_months(start, i),
                    total,
                }),
        )
    }

    fn seasonal_trend(months: usize) -> Vec<f64> {
        (0..months)
            .map(|t| {
                let angle = 2.0 * std::f64::consts::PI * (t % 12) as f64 / 12.0;
                5000.0 + 40.0 * t as f64 + 300.0 * angle.sin()
            })
            .collect()
    }

    #[test]
    fn constant_spending_scores_perfectly() {
        let series = series_from(date!(2017 - 01 - 01), vec![1000.0; 36]);

        let outcome = run_forecast(&series, &config(AGGREGATE_MODEL)).unwrap();

        assert!(outcome.validation.mae.abs() < 0.05, "{}", outcome.validation.mae);
        let mape = outcome.validation.mape.unwrap();
        assert!(mape.abs() < 0.005, "{mape}");
        assert_eq!(outcome.train.len(), 24);
        assert_eq!(outcome.validation.holdout.len(), 12);
    }

    #[test]
    fn projection_follows_last_observation() {
        let series = series_from(date!(2017 - 01 - 01), vec![1000.0; 36]);

        let outcome = run_forecast(&series, &config(AGGREGATE_MODEL)).unwrap();

        assert_eq!(outcome.projection.len(), FORECAST_HORIZON);
        assert_eq!(outcome.projection[0].month, date!(2020 - 01 - 01));
        assert!(outcome.projection.windows(2).all(|pair| next_month(pair[0].month) == pair[1].month));

        let last_holdout = outcome.validation.holdout.last_month().unwrap();
        assert!(outcome.projection.iter().all(|point| point.month > last_holdout));
    }

    #[test]
    fn validation_forecast_covers_holdout_months() {
        let series = series_from(date!(2017 - 01 - 01), vec![1000.0; 36]);

        let outcome = run_forecast(&series, &config(AGGREGATE_MODEL)).unwrap();

        let predicted_months: Vec<_> = outcome
            .validation
            .predicted
            .iter()
            .map(|point| point.month)
            .collect();
        assert_eq!(predicted_months, outcome.validation.holdout.months());
    }

    #[test]
    fn bounds_contain_point_forecast() {
        let series = series_from(date!(2016 - 01 - 01), seasonal_trend(48));

        let outcome = run_forecast(&series, &config(CATEGORY_MODEL)).unwrap();

        for point in outcome.projection.iter().chain(&outcome.validation.predicted) {
            assert!(point.lower <= point.value, "{point:?}");
            assert!(point.value <= point.upper, "{point:?}");
        }
    }

    #[test]
    fn trending_category_forecast_keeps_rising() {
        let series = series_from(date!(2016 - 01 - 01), seasonal_trend(48));

        let outcome = run_forecast(&series, &config(CATEGORY_MODEL)).unwrap();

        assert!(outcome.validation.mae < 1e-3, "{}", outcome.validation.mae);

        let values = series.values();
        let recent_mean = values[values.len() - 12..].iter().sum::<f64>() / 12.0;
        let projected_mean =
            outcome.projection.iter().map(|point| point.value).sum::<f64>() / 12.0;
        assert!(projected_mean > recent_mean);
    }

    #[test]
    fn trending_total_forecast_keeps_rising() {
        let series = series_from(date!(2016 - 01 - 01), seasonal_trend(48));

        let outcome = run_forecast(&series, &config(AGGREGATE_MODEL)).unwrap();

        // The holdout year sits 480 above the year before it.
        assert!(outcome.validation.mae < 100.0, "{}", outcome.validation.mae);

        let values = series.values();
        let last_year = &values[values.len() - 12..];
        let recent_mean = last_year.iter().sum::<f64>() / 12.0;
        let projected_mean =
            outcome.projection.iter().map(|point| point.value).sum::<f64>() / 12.0;
        assert!(projected_mean > recent_mean, "{projected_mean} <= {recent_mean}");
        for (point, previous) in outcome.projection.iter().zip(last_year) {
            assert!(point.value > *previous, "{point:?} vs {previous}");
        }
    }

    #[test]
    fn empty_series_has_no_data() {
        let result = run_forecast(&MonthlySeries::default(), &config(AGGREGATE_MODEL));

        assert_eq!(result, Err(ForecastError::NoData));
    }

    #[test]
    fn short_training_window_is_rejected() {
        let series = series_from(date!(2018 - 06 - 01), vec![1000.0; 13]);

        let result = run_forecast(&series, &config(AGGREGATE_MODEL));

        assert_eq!(
            result,
            Err(ForecastError::InsufficientHistory {
                required: 12,
                available: 7
            })
        );
    }

    #[test]
    fn category_model_needs_more_than_one_cycle() {
        let series = series_from(date!(2018 - 01 - 01), vec![1000.0; 24]);

        let result = run_forecast(&series, &config(CATEGORY_MODEL));

        assert!(matches!(
            result,
            Err(ForecastError::InsufficientHistory { available: 12, .. })
        ));
    }

    #[test]
    fn series_ending_before_holdout_is_rejected() {
        let series = series_from(date!(2016 - 01 - 01), vec![1000.0; 36]);

        let result = run_forecast(&series, &config(AGGREGATE_MODEL));

        assert_eq!(result, Err(ForecastError::EmptyHoldout));
    }

    #[test]
    fn missing_holdout_month_makes_mape_undefined() {
        let points = (0..36)
            .map(|i| MonthlyTotal {
                month: add_months(date!(2017 - 01 - 01), i),
                total: 1000.0,
            })
            .filter(|point| point.month != date!(2019 - 03 - 01));
        let series = MonthlySeries::new(points);

        let outcome = run_forecast(&series, &config(AGGREGATE_MODEL)).unwrap();

        assert_eq!(outcome.validation.holdout.len(), 12);
        assert_eq!(outcome.validation.mape, None);
        assert!((outcome.validation.mae - 1000.0 / 12.0).abs() < 0.05);
    }
}
