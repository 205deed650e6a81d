//! Derivative-free minimisation with the Nelder–Mead simplex method.

/// Settings for [minimize].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NelderMeadOptions {
    /// Distance from the starting point to the other vertices of the initial simplex.
    pub initial_step: f64,
    /// Give up after this many iterations.
    pub max_iterations: usize,
    /// Converged when the spread of objective values across the simplex is
    /// at most `relative_tolerance * |best| + absolute_tolerance`.
    pub relative_tolerance: f64,
    /// See `relative_tolerance`.
    pub absolute_tolerance: f64,
    /// Converged when every vertex is within this distance of the best vertex
    /// in every coordinate.
    pub point_tolerance: f64,
}

impl Default for NelderMeadOptions {
    fn default() -> Self {
        Self {
            initial_step: 0.5,
            max_iterations: 5_000,
            relative_tolerance: 1e-10,
            absolute_tolerance: 1e-12,
            point_tolerance: 1e-9,
        }
    }
}

/// The result of [minimize].
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    /// The best point found.
    pub point: Vec<f64>,
    /// The objective at `point`.
    pub value: f64,
    /// How many iterations were run.
    pub iterations: usize,
    /// Whether a tolerance was met before the iteration limit.
    pub converged: bool,
}

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Minimise `objective` starting from `start`.
///
/// NaN objective values are treated as +infinity so that the ordering of
/// vertices is always well defined.
pub fn minimize<F>(objective: F, start: &[f64], options: &NelderMeadOptions) -> Minimum
where
    F: Fn(&[f64]) -> f64,
{
    let evaluate = |point: &[f64]| {
        let value = objective(point);
        if value.is_nan() { f64::INFINITY } else { value }
    };

    let dimensions = start.len();
    if dimensions == 0 {
        return Minimum {
            point: Vec::new(),
            value: evaluate(start),
            iterations: 0,
            converged: true,
        };
    }

    let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(dimensions + 1);
    simplex.push((start.to_vec(), evaluate(start)));
    for i in 0..dimensions {
        let mut vertex = start.to_vec();
        vertex[i] += options.initial_step;
        let value = evaluate(&vertex);
        simplex.push((vertex, value));
    }

    let mut iterations = 0;
    let mut converged = false;

    while iterations < options.max_iterations {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));

        if has_converged(&simplex, options) {
            converged = true;
            break;
        }

        iterations += 1;

        let worst = dimensions;
        let centroid = centroid(&simplex[..worst]);

        let reflected = along(&centroid, &simplex[worst].0, -REFLECTION);
        let reflected_value = evaluate(&reflected);

        if reflected_value < simplex[0].1 {
            let expanded = along(&centroid, &simplex[worst].0, -EXPANSION);
            let expanded_value = evaluate(&expanded);

            simplex[worst] = if expanded_value < reflected_value {
                (expanded, expanded_value)
            } else {
                (reflected, reflected_value)
            };
            continue;
        }

        if reflected_value < simplex[worst - 1].1 {
            simplex[worst] = (reflected, reflected_value);
            continue;
        }

        let (contracted, contracted_value) = if reflected_value < simplex[worst].1 {
            let outside = along(&centroid, &reflected, CONTRACTION);
            let value = evaluate(&outside);
            (outside, value)
        } else {
            let inside = along(&centroid, &simplex[worst].0, CONTRACTION);
            let value = evaluate(&inside);
            (inside, value)
        };

        if contracted_value < reflected_value.min(simplex[worst].1) {
            simplex[worst] = (contracted, contracted_value);
            continue;
        }

        let best = simplex[0].0.clone();
        for vertex in simplex.iter_mut().skip(1) {
            let shrunk = along(&best, &vertex.0, SHRINK);
            let value = evaluate(&shrunk);
            *vertex = (shrunk, value);
        }
    }

    simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
    let (point, value) = simplex.swap_remove(0);

    Minimum {
        point,
        value,
        iterations,
        converged,
    }
}

fn has_converged(sorted_simplex: &[(Vec<f64>, f64)], options: &NelderMeadOptions) -> bool {
    let best = &sorted_simplex[0];
    let worst = &sorted_simplex[sorted_simplex.len() - 1];

    if !best.1.is_finite() {
        return false;
    }

    let value_spread = worst.1 - best.1;
    if value_spread <= options.relative_tolerance * best.1.abs() + options.absolute_tolerance {
        return true;
    }

    sorted_simplex.iter().skip(1).all(|(vertex, _)| {
        vertex
            .iter()
            .zip(&best.0)
            .all(|(a, b)| (a - b).abs() <= options.point_tolerance)
    })
}

fn centroid(vertices: &[(Vec<f64>, f64)]) -> Vec<f64> {
    let dimensions = vertices[0].0.len();
    let mut centre = vec![0.0; dimensions];

    for (vertex, _) in vertices {
        for (sum, coordinate) in centre.iter_mut().zip(vertex) {
            *sum += coordinate;
        }
    }

    centre
        .into_iter()
        .map(|sum| sum / vertices.len() as f64)
        .collect()
}

/// The point `origin + scale * (towards - origin)`.
fn along(origin: &[f64], towards: &[f64], scale: f64) -> Vec<f64> {
    origin
        .iter()
        .zip(towards)
        .map(|(o, t)| o + scale * (t - o))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{NelderMeadOptions, minimize};

    #[test]
    fn minimises_quadratic_bowl() {
        let objective = |x: &[f64]| (x[0] - 3.0).powi(2) + 2.0 * (x[1] + 1.0).powi(2);

        let minimum = minimize(objective, &[0.0, 0.0], &NelderMeadOptions::default());

        assert!(minimum.converged);
        assert!((minimum.point[0] - 3.0).abs() < 1e-3, "{minimum:?}");
        assert!((minimum.point[1] + 1.0).abs() < 1e-3, "{minimum:?}");
        assert!(minimum.value < 1e-6);
    }

    #[test]
    fn minimises_rosenbrock() {
        let objective =
            |x: &[f64]| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2);
        let options = NelderMeadOptions {
            relative_tolerance: 1e-14,
            absolute_tolerance: 1e-16,
            ..Default::default()
        };

        let minimum = minimize(objective, &[-1.2, 1.0], &options);

        assert!((minimum.point[0] - 1.0).abs() < 1e-2, "{minimum:?}");
        assert!((minimum.point[1] - 1.0).abs() < 1e-2, "{minimum:?}");
    }

    #[test]
    fn flat_objective_converges_immediately() {
        let minimum = minimize(|_| 0.0, &[0.0, 0.0, 0.0], &NelderMeadOptions::default());

        assert!(minimum.converged);
        assert_eq!(minimum.iterations, 0);
    }

    #[test]
    fn reports_iteration_limit() {
        let options = NelderMeadOptions {
            max_iterations: 3,
            ..Default::default()
        };

        let minimum = minimize(|x: &[f64]| (x[0] - 100.0).powi(2), &[0.0], &options);

        assert!(!minimum.converged);
        assert_eq!(minimum.iterations, 3);
    }

    #[test]
    fn nan_values_are_avoided() {
        let objective = |x: &[f64]| if x[0] < 0.0 { f64::NAN } else { (x[0] - 1.0).powi(2) };

        let minimum = minimize(objective, &[0.5], &NelderMeadOptions::default());

        assert!(minimum.value.is_finite());
        assert!((minimum.point[0] - 1.0).abs() < 1e-3);
    }
}
