//! Monthly aggregation of ledger amounts.
//!
//! A [MonthlySeries] holds one total per calendar month, in chronological
//! order, with no duplicate months. Months are represented as a [Date] on the
//! first day of the month.
//!
//! Months without any transactions are absent from an aggregated series.
//! Callers that need one sample per calendar month, such as the seasonal
//! model, must ask for that explicitly with [MonthlySeries::with_gaps_filled].

use std::collections::BTreeMap;

use rusqlite::Connection;
use time::{Date, Duration};

use crate::{
    Error,
    ledger::{Scope, get_monthly_totals},
};

/// The total amount for one calendar month.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthlyTotal {
    /// The first day of the month.
    pub month: Date,
    /// The sum of all amounts in the month.
    pub total: f64,
}

/// Chronologically ordered monthly totals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonthlySeries {
    points: Vec<MonthlyTotal>,
}

impl MonthlySeries {
    /// Build a series from arbitrary points.
    ///
    /// Each point's date is truncated to its month, points in the same month
    /// are summed and the result is sorted.
    pub fn new(points: impl IntoIterator<Item = MonthlyTotal>) -> Self {
        let mut totals: BTreeMap<Date, f64> = BTreeMap::new();

        for point in points {
            *totals.entry(first_of_month(point.month)).or_insert(0.0) += point.total;
        }

        Self {
            points: totals
                .into_iter()
                .map(|(month, total)| MonthlyTotal { month, total })
                .collect(),
        }
    }

    /// The monthly totals in chronological order.
    pub fn points(&self) -> &[MonthlyTotal] {
        &self.points
    }

    /// The months in chronological order.
    pub fn months(&self) -> Vec<Date> {
        self.points.iter().map(|point| point.month).collect()
    }

    /// The totals in chronological order.
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|point| point.total).collect()
    }

    /// The number of months in the series.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the series has no months.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The earliest month, if any.
    pub fn first_month(&self) -> Option<Date> {
        self.points.first().map(|point| point.month)
    }

    /// The latest month, if any.
    pub fn last_month(&self) -> Option<Date> {
        self.points.last().map(|point| point.month)
    }

    /// The sum of every monthly total.
    pub fn total(&self) -> f64 {
        self.points.iter().map(|point| point.total).sum()
    }

    /// Insert a zero total for every month missing between the first and
    /// last month, so that there is exactly one sample per calendar month.
    pub fn with_gaps_filled(&self) -> Self {
        let (Some(first), Some(last)) = (self.first_month(), self.last_month()) else {
            return Self::default();
        };

        let mut points = Vec::with_capacity(self.points.len());
        let mut observed = self.points.iter().peekable();
        let mut month = first;

        while month <= last {
            let total = match observed.peek() {
                Some(point) if point.month == month => {
                    let total = point.total;
                    observed.next();
                    total
                }
                _ => 0.0,
            };

            points.push(MonthlyTotal { month, total });
            month = next_month(month);
        }

        Self { points }
    }

    /// Split the series into the months strictly before `boundary` and the
    /// months from `boundary` onwards.
    pub fn split_at(&self, boundary: Date) -> (Self, Self) {
        let boundary = first_of_month(boundary);
        let (before, after): (Vec<_>, Vec<_>) = self
            .points
            .iter()
            .copied()
            .partition(|point| point.month < boundary);

        (Self { points: before }, Self { points: after })
    }

    /// The trailing mean over `window` months for each point.
    ///
    /// The first `window - 1` entries are `None` since the window is not full.
    pub fn rolling_mean(&self, window: usize) -> Vec<Option<f64>> {
        if window == 0 {
            return vec![None; self.points.len()];
        }

        let values = self.values();

        (0..values.len())
            .map(|end| {
                (end + 1 >= window).then(|| {
                    let start = end + 1 - window;
                    values[start..=end].iter().sum::<f64>() / window as f64
                })
            })
            .collect()
    }
}

/// Aggregate the ledger amounts in `scope` into a monthly series.
///
/// An unknown or unmatched category yields an empty series.
///
/// # Errors
/// Returns [Error::InvalidAmount] if any matching amount cannot be parsed.
pub fn load_monthly_series(scope: &Scope, connection: &Connection) -> Result<MonthlySeries, Error> {
    Ok(MonthlySeries::new(get_monthly_totals(scope, connection)?))
}

/// Truncate `date` to the first day of its month.
pub fn first_of_month(date: Date) -> Date {
    date - Duration::days(i64::from(date.day()) - 1)
}

/// The first day of the month after `date`'s month.
pub fn next_month(date: Date) -> Date {
    // 31 days after the 1st always lands early in the following month.
    first_of_month(first_of_month(date) + Duration::days(31))
}

/// The first day of the month `count` months after `date`'s month.
pub fn add_months(date: Date, count: usize) -> Date {
    (0..count).fold(first_of_month(date), |month, _| next_month(month))
}

/// Format a month as "YYYY-MM" for chart axes and tables.
pub fn format_month(month: Date) -> String {
    format!("{}-{:02}", month.year(), u8::from(month.month()))
}
