//! Seasonal ARIMA estimation and forecasting.
//!
//! The model for a series `y` is
//!
//! ```text
//! φ(B) Φ(Bˢ) (1 - B)ᵈ (1 - Bˢ)ᴰ y = θ(B) Θ(Bˢ) ε
//! ```
//!
//! with no constant term. Coefficients are estimated by minimising the
//! conditional sum of squared one-step errors. Pre-sample errors are zero, and
//! pre-sample values are zero for differenced models. Undifferenced models
//! condition on their first `p + P·s` samples instead, see
//! [ModelOrder::conditioning_samples].

use statrs::distribution::{ContinuousCDF, Normal};

use super::{
    ForecastError, ModelOrder,
    optimizer::{NelderMeadOptions, minimize},
};

/// A forecast value with its confidence interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// The point forecast.
    pub value: f64,
    /// The lower bound of the interval.
    pub lower: f64,
    /// The upper bound of the interval.
    pub upper: f64,
}

/// The estimated coefficients, each in (-1, 1).
#[derive(Debug, Clone, PartialEq)]
struct Coefficients {
    ar: Vec<f64>,
    ma: Vec<f64>,
    seasonal_ar: Vec<f64>,
    seasonal_ma: Vec<f64>,
}

impl Coefficients {
    /// Map unconstrained optimiser parameters onto (-1, 1) with `tanh`.
    fn from_unconstrained(order: &ModelOrder, parameters: &[f64]) -> Self {
        let mut values = parameters.iter().map(|parameter| parameter.tanh());

        Self {
            ar: values.by_ref().take(order.p).collect(),
            ma: values.by_ref().take(order.q).collect(),
            seasonal_ar: values.by_ref().take(order.seasonal_p).collect(),
            seasonal_ma: values.by_ref().take(order.seasonal_q).collect(),
        }
    }

    /// The expanded AR and MA lag polynomials, constant term first.
    fn polynomials(&self, period: usize) -> (Vec<f64>, Vec<f64>) {
        let ar = multiply(
            &lag_polynomial(&self.ar, -1.0, 1),
            &lag_polynomial(&self.seasonal_ar, -1.0, period),
        );
        let ma = multiply(
            &lag_polynomial(&self.ma, 1.0, 1),
            &lag_polynomial(&self.seasonal_ma, 1.0, period),
        );

        (ar, ma)
    }
}

/// A seasonal ARIMA model fitted to a series.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedSarima {
    order: ModelOrder,
    coefficients: Coefficients,
    sigma2: f64,
    history: Vec<f64>,
    /// One-step errors aligned with `history`, zero where differencing
    /// consumed the sample or the sample was conditioned on.
    residuals: Vec<f64>,
}

impl FittedSarima {
    /// Estimate a model of the given `order` from `data`.
    ///
    /// # Errors
    /// - [ForecastError::NoData] if `data` is empty.
    /// - [ForecastError::InsufficientHistory] if there are not more samples
    ///   left after differencing and conditioning than there are
    ///   coefficients.
    /// - [ForecastError::InvalidConfiguration] for seasonal terms without a
    ///   seasonal period.
    /// - [ForecastError::FitFailed] if the data is not finite or the optimiser
    ///   does not converge.
    pub fn fit(order: ModelOrder, data: &[f64]) -> Result<Self, ForecastError> {
        if order.has_seasonal_terms() && order.period < 2 {
            return Err(ForecastError::InvalidConfiguration(format!(
                "{order} has seasonal terms but no seasonal period"
            )));
        }

        if data.is_empty() {
            return Err(ForecastError::NoData);
        }

        if data.iter().any(|value| !value.is_finite()) {
            return Err(ForecastError::FitFailed(
                "the series contains non-finite values".to_owned(),
            ));
        }

        let lag = order.differencing_lag();
        let conditioned = order.conditioning_samples();
        let required = lag + conditioned + order.parameter_count() + 1;
        if data.len() < required {
            return Err(ForecastError::InsufficientHistory {
                required,
                available: data.len(),
            });
        }

        let differenced = difference(data, &differencing_polynomial(&order));

        let objective = |parameters: &[f64]| {
            let (ar, ma) =
                Coefficients::from_unconstrained(&order, parameters).polynomials(order.period);
            mean_square(&one_step_errors(&differenced, &ar, &ma, conditioned)[conditioned..])
        };

        let scale = differenced
            .iter()
            .fold(0.0_f64, |largest, value| largest.max(value.abs()));
        let options = NelderMeadOptions {
            absolute_tolerance: 1e-14 * (1.0 + scale * scale),
            ..Default::default()
        };

        let initial = vec![0.0; order.parameter_count()];
        let first_pass = minimize(objective, &initial, &options);
        // A fresh simplex around the first minimum guards against early collapse.
        let minimum = minimize(objective, &first_pass.point, &options);
        let iterations = first_pass.iterations + minimum.iterations;

        if !minimum.value.is_finite() {
            return Err(ForecastError::FitFailed(format!(
                "the objective for {order} is not finite"
            )));
        }

        if !minimum.converged {
            return Err(ForecastError::FitFailed(format!(
                "{order} did not converge after {iterations} iterations"
            )));
        }

        let coefficients = Coefficients::from_unconstrained(&order, &minimum.point);
        let (ar, ma) = coefficients.polynomials(order.period);
        let mut residuals = vec![0.0; lag];
        residuals.extend(one_step_errors(&differenced, &ar, &ma, conditioned));

        tracing::debug!(
            "fitted {order} on {} samples in {iterations} iterations: \
            φ = {:?}, θ = {:?}, Φ = {:?}, Θ = {:?}, σ² = {}",
            data.len(),
            coefficients.ar,
            coefficients.ma,
            coefficients.seasonal_ar,
            coefficients.seasonal_ma,
            minimum.value
        );

        Ok(Self {
            order,
            coefficients,
            sigma2: minimum.value,
            history: data.to_vec(),
            residuals,
        })
    }

    /// The non-seasonal AR coefficients φ.
    pub fn ar(&self) -> &[f64] {
        &self.coefficients.ar
    }

    /// The estimated variance of the one-step errors.
    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    /// Forecast `steps` samples past the end of the fitted series.
    ///
    /// Each interval is `value ± z·σₕ` where `z` is the standard normal
    /// quantile for `confidence` and `σₕ²` is the h-step error variance.
    ///
    /// # Errors
    /// Returns [ForecastError::InvalidConfiguration] if `confidence` is not
    /// strictly between 0 and 1.
    pub fn forecast(&self, steps: usize, confidence: f64) -> Result<Vec<Prediction>, ForecastError> {
        if !(confidence > 0.0 && confidence < 1.0) {
            return Err(ForecastError::InvalidConfiguration(format!(
                "confidence level must be between 0 and 1, got {confidence}"
            )));
        }

        let z = Normal::new(0.0, 1.0)
            .map_err(|error| ForecastError::InvalidConfiguration(error.to_string()))?
            .inverse_cdf(0.5 + confidence / 2.0);

        let (ar, ma) = self.coefficients.polynomials(self.order.period);
        let integrated_ar = multiply(&ar, &differencing_polynomial(&self.order));

        let mut extended = self.history.clone();
        let observed = extended.len();
        let mut errors = self.residuals.clone();
        errors.resize(observed + steps, 0.0);

        for t in observed..observed + steps {
            let autoregressive: f64 = (1..integrated_ar.len().min(t + 1))
                .map(|i| -integrated_ar[i] * extended[t - i])
                .sum();
            let moving_average: f64 = (1..ma.len().min(t + 1))
                .map(|j| ma[j] * errors[t - j])
                .sum();

            extended.push(autoregressive + moving_average);
        }

        let weights = psi_weights(&integrated_ar, &ma, steps);
        let mut cumulative_weight = 0.0;

        Ok(extended[observed..]
            .iter()
            .zip(weights)
            .map(|(&value, weight)| {
                cumulative_weight += weight * weight;
                let half_width = z * (self.sigma2 * cumulative_weight).sqrt();

                Prediction {
                    value,
                    lower: value - half_width,
                    upper: value + half_width,
                }
            })
            .collect())
    }
}

/// `1 + sign·c₁·Bᵖ + sign·c₂·B²ᵖ + ...` for coefficients `c` and period `p`.
fn lag_polynomial(coefficients: &[f64], sign: f64, period: usize) -> Vec<f64> {
    let mut polynomial = vec![0.0; coefficients.len() * period + 1];
    polynomial[0] = 1.0;

    for (i, coefficient) in coefficients.iter().enumerate() {
        polynomial[(i + 1) * period] = sign * coefficient;
    }

    polynomial
}

/// `(1 - B)ᵈ (1 - Bˢ)ᴰ`.
fn differencing_polynomial(order: &ModelOrder) -> Vec<f64> {
    let first = std::iter::repeat_n(lag_polynomial(&[1.0], -1.0, 1), order.d);
    let seasonal = std::iter::repeat_n(
        lag_polynomial(&[1.0], -1.0, order.period),
        order.seasonal_d,
    );

    first
        .chain(seasonal)
        .fold(vec![1.0], |product, factor| multiply(&product, &factor))
}

fn multiply(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut product = vec![0.0; a.len() + b.len() - 1];

    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            product[i + j] += x * y;
        }
    }

    product
}

/// Apply a differencing polynomial, dropping the samples it has no history for.
fn difference(data: &[f64], polynomial: &[f64]) -> Vec<f64> {
    let lag = polynomial.len() - 1;

    (lag..data.len())
        .map(|t| {
            polynomial
                .iter()
                .enumerate()
                .map(|(i, coefficient)| coefficient * data[t - i])
                .sum()
        })
        .collect()
}

/// The errors `e` solving `ar(B) w = ma(B) e` with zero pre-sample values.
///
/// The first `conditioned` samples only serve as history, their errors are
/// zero.
fn one_step_errors(series: &[f64], ar: &[f64], ma: &[f64], conditioned: usize) -> Vec<f64> {
    let mut errors: Vec<f64> = vec![0.0; conditioned.min(series.len())];
    errors.reserve(series.len() - errors.len());

    for t in errors.len()..series.len() {
        let filtered: f64 = (0..ar.len().min(t + 1)).map(|i| ar[i] * series[t - i]).sum();
        let moving_average: f64 = (1..ma.len().min(t + 1))
            .map(|j| ma[j] * errors[t - j])
            .sum();

        errors.push(filtered - moving_average);
    }

    errors
}

fn mean_square(values: &[f64]) -> f64 {
    values.iter().map(|value| value * value).sum::<f64>() / values.len() as f64
}

/// The first `count` weights of the MA(∞) representation `ma(B) / ar(B)`.
fn psi_weights(ar: &[f64], ma: &[f64], count: usize) -> Vec<f64> {
    let mut weights: Vec<f64> = Vec::with_capacity(count);

    for j in 0..count {
        if j == 0 {
            weights.push(1.0);
            continue;
        }

        let moving_average = ma.get(j).copied().unwrap_or(0.0);
        let autoregressive: f64 = (1..ar.len().min(j + 1))
            .map(|i| -ar[i] * weights[j - i])
            .sum();

        weights.push(moving_average + autoregressive);
    }

    weights
}

#[cfg(test)]
mod tests {
    use crate::{
        config::{AGGREGATE_MODEL, CATEGORY_MODEL},
        forecast::{ForecastError, ModelOrder},
    };

    use super::{FittedSarima, differencing_polynomial, lag_polynomial, multiply, psi_weights};

    const AR1: ModelOrder = ModelOrder {
        p: 1,
        d: 0,
        q: 0,
        seasonal_p: 0,
        seasonal_d: 0,
        seasonal_q: 0,
        period: 0,
    };

    /// Deterministic noise in [-1, 1) from a linear congruential generator.
    fn noise(count: usize) -> Vec<f64> {
        let mut state: u64 = 42;
        (0..count)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                (state >> 11) as f64 / (1u64 << 53) as f64 * 2.0 - 1.0
            })
            .collect()
    }

    fn ar1_series(phi: f64, count: usize) -> Vec<f64> {
        let mut previous = 0.0;
        noise(count)
            .into_iter()
            .map(|error| {
                previous = phi * previous + error;
                previous
            })
            .collect()
    }

    fn seasonal_trend(months: usize) -> Vec<f64> {
        (0..months)
            .map(|t| {
                let angle = 2.0 * std::f64::consts::PI * (t % 12) as f64 / 12.0;
                1000.0 + 25.0 * t as f64 + 200.0 * angle.sin()
            })
            .collect()
    }

    #[test]
    fn expands_seasonal_polynomials() {
        let product = multiply(
            &lag_polynomial(&[0.5], -1.0, 1),
            &lag_polynomial(&[0.3], -1.0, 3),
        );

        let expected = [1.0, -0.5, 0.0, -0.3, 0.15];
        assert_eq!(product.len(), expected.len());
        for (got, want) in product.iter().zip(expected) {
            assert!((got - want).abs() < 1e-12, "{product:?}");
        }
    }

    #[test]
    fn differencing_polynomial_for_category_model() {
        let polynomial = differencing_polynomial(&CATEGORY_MODEL);

        let mut expected = vec![0.0; 14];
        expected[0] = 1.0;
        expected[1] = -1.0;
        expected[12] = -1.0;
        expected[13] = 1.0;
        assert_eq!(polynomial, expected);
    }

    #[test]
    fn psi_weights_of_ar1_are_powers() {
        let weights = psi_weights(&[1.0, -0.5], &[1.0], 4);

        assert_eq!(weights, vec![1.0, 0.5, 0.25, 0.125]);
    }

    #[test]
    fn recovers_ar1_coefficient() {
        let series = ar1_series(0.6, 1000);

        let model = FittedSarima::fit(AR1, &series).unwrap();

        assert!((model.ar()[0] - 0.6).abs() < 0.1, "phi = {}", model.ar()[0]);
        // Uniform noise on [-1, 1) has variance 1/3.
        assert!((model.sigma2() - 1.0 / 3.0).abs() < 0.05, "{}", model.sigma2());
    }

    #[test]
    fn constant_series_forecasts_constant() {
        let series = vec![1000.0; 36];

        let model = FittedSarima::fit(AGGREGATE_MODEL, &series).unwrap();
        let forecast = model.forecast(12, 0.95).unwrap();

        assert_eq!(forecast.len(), 12);
        for prediction in forecast {
            assert!((prediction.value - 1000.0).abs() < 0.05, "{prediction:?}");
            assert!((prediction.upper - prediction.lower).abs() < 1.0, "{prediction:?}");
        }
    }

    #[test]
    fn undifferenced_forecast_is_not_pulled_to_the_mean() {
        let full = seasonal_trend(48);
        let (history, future) = full.split_at(36);

        let model = FittedSarima::fit(AGGREGATE_MODEL, history).unwrap();
        let forecast = model.forecast(12, 0.95).unwrap();

        // Every month should beat the same month a year earlier, which a
        // forecast reverting to the historical mean would not.
        for (h, prediction) in forecast.iter().enumerate() {
            assert!(prediction.value > history[24 + h], "month {h}: {prediction:?}");
            assert!((prediction.value - future[h]).abs() < 50.0, "month {h}: {prediction:?}");
        }
    }

    #[test]
    fn undifferenced_model_needs_a_season_of_history_to_condition_on() {
        let result = FittedSarima::fit(AGGREGATE_MODEL, &[1000.0; 17]);

        assert_eq!(
            result,
            Err(ForecastError::InsufficientHistory {
                required: 18,
                available: 17
            })
        );
    }

    #[test]
    fn forecast_continues_trend_with_seasonal_differencing() {
        let full = seasonal_trend(36);
        let (history, future) = full.split_at(24);

        let model = FittedSarima::fit(CATEGORY_MODEL, history).unwrap();
        let forecast = model.forecast(12, 0.95).unwrap();

        for (prediction, actual) in forecast.iter().zip(future) {
            assert!((prediction.value - actual).abs() < 1e-3, "{prediction:?} vs {actual}");
        }

        let recent_mean = history[12..].iter().sum::<f64>() / 12.0;
        let forecast_mean = forecast.iter().map(|p| p.value).sum::<f64>() / 12.0;
        assert!(forecast_mean > recent_mean);
    }

    #[test]
    fn intervals_contain_point_and_widen() {
        let series = ar1_series(0.5, 200);
        let model = FittedSarima::fit(AR1, &series).unwrap();

        let forecast = model.forecast(6, 0.95).unwrap();

        for prediction in &forecast {
            assert!(prediction.lower <= prediction.value);
            assert!(prediction.value <= prediction.upper);
        }
        for pair in forecast.windows(2) {
            assert!(pair[1].upper - pair[1].lower >= pair[0].upper - pair[0].lower);
        }

        let first_half_width = (forecast[0].upper - forecast[0].lower) / 2.0;
        let expected = 1.959964 * model.sigma2().sqrt();
        assert!((first_half_width - expected).abs() < 1e-4);
    }

    #[test]
    fn rejects_short_series() {
        let result = FittedSarima::fit(CATEGORY_MODEL, &[1.0, 2.0, 3.0, 4.0, 5.0]);

        assert_eq!(
            result,
            Err(ForecastError::InsufficientHistory {
                required: 18,
                available: 5
            })
        );
    }

    #[test]
    fn rejects_empty_series() {
        assert_eq!(
            FittedSarima::fit(AGGREGATE_MODEL, &[]),
            Err(ForecastError::NoData)
        );
    }

    #[test]
    fn rejects_non_finite_values() {
        let mut series = vec![1.0; 24];
        series[3] = f64::NAN;

        let result = FittedSarima::fit(AGGREGATE_MODEL, &series);

        assert!(matches!(result, Err(ForecastError::FitFailed(_))));
    }

    #[test]
    fn rejects_invalid_confidence() {
        let model = FittedSarima::fit(AGGREGATE_MODEL, &[1000.0; 24]).unwrap();

        assert!(matches!(
            model.forecast(3, 1.0),
            Err(ForecastError::InvalidConfiguration(_))
        ));
    }
}
