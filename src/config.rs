//! Named settings for the dashboard and the forecast pipeline.

use time::{Date, Month, macros::date};

use crate::{
    Error,
    forecast::{ForecastConfig, ForecastError, ModelOrder},
    ledger::Scope,
};

/// The default first year of the holdout window, the final year of the ledger.
pub const DEFAULT_HOLDOUT_YEAR: i32 = 2019;

/// The first month of the default holdout window.
pub const DEFAULT_HOLDOUT_START: Date = date!(2019 - 01 - 01);

/// How many months to project past the last observation.
pub const FORECAST_HORIZON: usize = 12;

/// The number of months in one seasonal cycle.
pub const SEASONAL_PERIOD: usize = 12;

/// The minimum number of months before the holdout boundary.
pub const MINIMUM_TRAINING_MONTHS: usize = SEASONAL_PERIOD;

/// The coverage of forecast intervals.
pub const CONFIDENCE_LEVEL: f64 = 0.95;

/// The model for the whole ledger, SARIMA(1,0,1)(1,0,1,12).
pub const AGGREGATE_MODEL: ModelOrder = ModelOrder {
    p: 1,
    d: 0,
    q: 1,
    seasonal_p: 1,
    seasonal_d: 0,
    seasonal_q: 1,
    period: SEASONAL_PERIOD,
};

/// The model for a single category, SARIMA(1,1,1)(1,1,1,12).
pub const CATEGORY_MODEL: ModelOrder = ModelOrder {
    p: 1,
    d: 1,
    q: 1,
    seasonal_p: 1,
    seasonal_d: 1,
    seasonal_q: 1,
    period: SEASONAL_PERIOD,
};

/// How many categories the ranking charts and the forecast selector show.
pub const TOP_CATEGORY_LIMIT: usize = 10;

/// How many clients the overview table shows.
pub const TOP_CLIENT_LIMIT: usize = 10;

/// How many error types the error distribution chart shows.
pub const ERROR_TYPE_LIMIT: usize = 10;

/// The forecast settings chosen when the server starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastSettings {
    /// The first month of the holdout window.
    pub holdout_start: Date,
    /// How many months to project.
    pub horizon: usize,
}

impl ForecastSettings {
    /// Create settings with a holdout window starting in January of
    /// `holdout_year`.
    ///
    /// # Errors
    /// Returns an error if the year is out of range or `horizon` is zero.
    pub fn new(holdout_year: i32, horizon: usize) -> Result<Self, Error> {
        let holdout_start = Date::from_calendar_date(holdout_year, Month::January, 1)
            .map_err(|error| ForecastError::InvalidConfiguration(error.to_string()))?;

        if horizon == 0 {
            return Err(ForecastError::InvalidConfiguration(
                "the forecast horizon must be at least one month".to_owned(),
            )
            .into());
        }

        Ok(Self {
            holdout_start,
            horizon,
        })
    }

    /// The pipeline configuration for `scope`.
    ///
    /// The whole ledger is modelled without differencing while single
    /// categories, which trend more, use first and seasonal differences.
    pub fn for_scope(&self, scope: &Scope) -> ForecastConfig {
        let order = match scope {
            Scope::All => AGGREGATE_MODEL,
            Scope::Category(_) => CATEGORY_MODEL,
        };

        ForecastConfig {
            order,
            holdout_start: self.holdout_start,
            horizon: self.horizon,
            confidence_level: CONFIDENCE_LEVEL,
        }
    }
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            holdout_start: DEFAULT_HOLDOUT_START,
            horizon: FORECAST_HORIZON,
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use crate::{Error, forecast::ForecastError, ledger::Scope};

    use super::{
        AGGREGATE_MODEL, CATEGORY_MODEL, DEFAULT_HOLDOUT_YEAR, FORECAST_HORIZON, ForecastSettings,
    };

    #[test]
    fn default_matches_named_constants() {
        let settings = ForecastSettings::new(DEFAULT_HOLDOUT_YEAR, FORECAST_HORIZON).unwrap();

        assert_eq!(settings, ForecastSettings::default());
        assert_eq!(settings.holdout_start, date!(2019 - 01 - 01));
    }

    #[test]
    fn chooses_model_by_scope() {
        let settings = ForecastSettings::default();

        assert_eq!(settings.for_scope(&Scope::All).order, AGGREGATE_MODEL);
        assert_eq!(
            settings
                .for_scope(&Scope::Category("Restaurants".to_owned()))
                .order,
            CATEGORY_MODEL
        );
    }

    #[test]
    fn rejects_zero_horizon() {
        let result = ForecastSettings::new(2019, 0);

        assert!(matches!(
            result,
            Err(Error::Forecast(ForecastError::InvalidConfiguration(_)))
        ));
    }
}
