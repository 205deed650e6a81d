//! Forecast accuracy scores.

/// The mean of `|actual - predicted|`.
///
/// Pairs are matched by position and any unmatched tail is ignored. Returns
/// NaN when there are no pairs.
pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> f64 {
    let (sum, count) = actual
        .iter()
        .zip(predicted)
        .fold((0.0, 0usize), |(sum, count), (a, p)| {
            (sum + (a - p).abs(), count + 1)
        });

    sum / count as f64
}

/// The mean of `|actual - predicted| / actual` as a percentage.
///
/// Returns `None` when any actual value is exactly zero, since the ratio is
/// undefined, or when there are no pairs. Negative actual values are scored
/// by magnitude so the result is never negative.
pub fn mean_absolute_percentage_error(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = actual
        .iter()
        .copied()
        .zip(predicted.iter().copied())
        .collect();

    if pairs.is_empty() || pairs.iter().any(|(a, _)| *a == 0.0) {
        return None;
    }

    let sum: f64 = pairs.iter().map(|(a, p)| ((a - p) / a).abs()).sum();

    Some(sum / pairs.len() as f64 * 100.0)
}
