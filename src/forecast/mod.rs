//! Seasonal ARIMA forecasting of monthly totals.
//!
//! The pipeline in [run_forecast] validates a model against a holdout year,
//! then refits on the whole series and projects forward with a confidence
//! band. The model itself lives in [sarima] and is estimated by conditional
//! sum of squares, minimised with the simplex method in [optimizer].

mod cache;
mod metrics;
mod optimizer;
mod pipeline;
mod sarima;

pub use cache::{DataVersion, ForecastCache};
pub use metrics::{mean_absolute_error, mean_absolute_percentage_error};
pub use pipeline::{ForecastConfig, ForecastOutcome, ForecastPoint, Validation, run_forecast};
pub use sarima::{FittedSarima, Prediction};

use std::fmt::Display;

/// The orders of a seasonal ARIMA model, written (p,d,q)(P,D,Q,s).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelOrder {
    /// Non-seasonal autoregressive order.
    pub p: usize,
    /// Non-seasonal differencing order.
    pub d: usize,
    /// Non-seasonal moving average order.
    pub q: usize,
    /// Seasonal autoregressive order.
    pub seasonal_p: usize,
    /// Seasonal differencing order.
    pub seasonal_d: usize,
    /// Seasonal moving average order.
    pub seasonal_q: usize,
    /// The number of samples in one season, e.g. 12 for monthly data.
    pub period: usize,
}

impl ModelOrder {
    /// The number of ARMA coefficients to estimate.
    pub fn parameter_count(&self) -> usize {
        self.p + self.q + self.seasonal_p + self.seasonal_q
    }

    /// How many leading samples are consumed by differencing.
    pub fn differencing_lag(&self) -> usize {
        self.d + self.period * self.seasonal_d
    }

    /// How many leading samples are only used as history when estimating.
    ///
    /// A differenced series starts near zero, so zero pre-sample values are a
    /// fair guess for it. An undifferenced series starts at its level, so its
    /// first `p + P·s` samples are conditioned on instead.
    pub fn conditioning_samples(&self) -> usize {
        if self.d == 0 && self.seasonal_d == 0 {
            self.p + self.period * self.seasonal_p
        } else {
            0
        }
    }

    fn has_seasonal_terms(&self) -> bool {
        self.seasonal_p + self.seasonal_d + self.seasonal_q > 0
    }
}

impl Display for ModelOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SARIMA({},{},{})({},{},{},{})",
            self.p, self.d, self.q, self.seasonal_p, self.seasonal_d, self.seasonal_q, self.period
        )
    }
}

/// The ways the forecast pipeline can fail.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ForecastError {
    /// The series has no observations, so there is nothing to fit.
    #[error("there is no data to forecast")]
    NoData,

    /// The training window is too short for the model.
    #[error("at least {required} months of history are needed before the holdout, got {available}")]
    InsufficientHistory {
        /// The minimum number of training months.
        required: usize,
        /// The number of training months that were available.
        available: usize,
    },

    /// No observations fall on or after the holdout boundary.
    #[error("there are no observations in the holdout period")]
    EmptyHoldout,

    /// The optimiser did not converge or the objective was not finite.
    #[error("the model could not be fitted: {0}")]
    FitFailed(String),

    /// The model order or forecast settings are not usable.
    #[error("invalid forecast configuration: {0}")]
    InvalidConfiguration(String),
}
