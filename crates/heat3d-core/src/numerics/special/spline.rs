//! Piecewise-cubic interpolants with constant extrapolation.
//!
//! Both interpolants are stored in Hermite form (knot values plus knot
//! slopes); they differ only in how the slopes are chosen.

use super::tridiagonal::{thomas_solve, TridiagonalError};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SplineError {
    #[error("spline requires at least 1 knot")]
    Empty,
    #[error("spline input length mismatch: x={x}, y={y}")]
    LengthMismatch { x: usize, y: usize },
    #[error("spline vector '{field}' must contain finite values, index {index} got {value}")]
    NonFiniteValue {
        field: &'static str,
        index: usize,
        value: f64,
    },
    #[error(
        "spline knots must be strictly increasing, index {index} has {current} after {previous}"
    )]
    NonIncreasingKnots {
        index: usize,
        previous: f64,
        current: f64,
    },
    #[error(transparent)]
    Tridiagonal(#[from] TridiagonalError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CubicSpline {
    knots: Vec<f64>,
    values: Vec<f64>,
    slopes: Vec<f64>,
}

impl CubicSpline {
    /// Interpolating C2 spline with not-a-knot end conditions.
    ///
    /// Three knots give the interpolating parabola, two the straight line and
    /// one a constant.
    pub fn interpolating(x: &[f64], y: &[f64]) -> Result<Self, SplineError> {
        validate(x, y)?;
        let slopes = match x.len() {
            1 => vec![0.0],
            2 => {
                let secant = (y[1] - y[0]) / (x[1] - x[0]);
                vec![secant, secant]
            }
            3 => parabola_slopes(x, y),
            _ => not_a_knot_slopes(x, y)?,
        };
        Ok(Self {
            knots: x.to_vec(),
            values: y.to_vec(),
            slopes,
        })
    }

    /// Shape-preserving PCHIP interpolant (Fritsch-Butland slopes).
    pub fn monotone(x: &[f64], y: &[f64]) -> Result<Self, SplineError> {
        validate(x, y)?;
        let slopes = match x.len() {
            1 => vec![0.0],
            2 => {
                let secant = (y[1] - y[0]) / (x[1] - x[0]);
                vec![secant, secant]
            }
            _ => pchip_slopes(x, y),
        };
        Ok(Self {
            knots: x.to_vec(),
            values: y.to_vec(),
            slopes,
        })
    }

    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    pub fn domain(&self) -> (f64, f64) {
        (self.knots[0], self.knots[self.knots.len() - 1])
    }

    /// Value at `x`; the end values are held outside the knot range and for
    /// NaN input.
    pub fn evaluate(&self, x: f64) -> f64 {
        let last = self.knots.len() - 1;
        if x.is_nan() || x <= self.knots[0] {
            return self.values[0];
        }
        if x >= self.knots[last] {
            return self.values[last];
        }

        let upper = self.knots.partition_point(|&knot| knot <= x).min(last);
        let lower = upper - 1;
        let h = self.knots[upper] - self.knots[lower];
        let secant = (self.values[upper] - self.values[lower]) / h;
        let s0 = self.slopes[lower];
        let s1 = self.slopes[upper];

        let t = x - self.knots[lower];
        let cubic = (s0 + s1 - 2.0 * secant) / (h * h);
        let quadratic = (secant - s0) / h - cubic * h;
        ((cubic * t + quadratic) * t + s0) * t + self.values[lower]
    }

    pub fn evaluate_many(&self, x: &[f64]) -> Vec<f64> {
        x.iter().map(|&value| self.evaluate(value)).collect()
    }
}

fn validate(x: &[f64], y: &[f64]) -> Result<(), SplineError> {
    if x.len() != y.len() {
        return Err(SplineError::LengthMismatch {
            x: x.len(),
            y: y.len(),
        });
    }
    if x.is_empty() {
        return Err(SplineError::Empty);
    }
    for (field, values) in [("x", x), ("y", y)] {
        if let Some((index, &value)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(SplineError::NonFiniteValue {
                field,
                index,
                value,
            });
        }
    }
    for index in 1..x.len() {
        if x[index] <= x[index - 1] {
            return Err(SplineError::NonIncreasingKnots {
                index,
                previous: x[index - 1],
                current: x[index],
            });
        }
    }
    Ok(())
}

fn intervals(x: &[f64], y: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let dx: Vec<f64> = x.windows(2).map(|pair| pair[1] - pair[0]).collect();
    let secants = y
        .windows(2)
        .zip(&dx)
        .map(|(pair, h)| (pair[1] - pair[0]) / h)
        .collect();
    (dx, secants)
}

fn parabola_slopes(x: &[f64], y: &[f64]) -> Vec<f64> {
    let (_, secants) = intervals(x, y);
    let curvature = (secants[1] - secants[0]) / (x[2] - x[0]);
    x.iter()
        .map(|&xi| secants[0] + curvature * (2.0 * xi - x[0] - x[1]))
        .collect()
}

fn not_a_knot_slopes(x: &[f64], y: &[f64]) -> Result<Vec<f64>, SplineError> {
    let n = x.len();
    let (dx, secants) = intervals(x, y);
    let mut sub = vec![0.0; n];
    let mut main = vec![0.0; n];
    let mut sup = vec![0.0; n];
    let mut rhs = vec![0.0; n];

    for row in 1..n - 1 {
        sub[row] = dx[row];
        main[row] = 2.0 * (dx[row - 1] + dx[row]);
        sup[row] = dx[row - 1];
        rhs[row] = 3.0 * (dx[row] * secants[row - 1] + dx[row - 1] * secants[row]);
    }

    let span = x[2] - x[0];
    main[0] = dx[1];
    sup[0] = span;
    rhs[0] = ((dx[0] + 2.0 * span) * dx[1] * secants[0] + dx[0] * dx[0] * secants[1]) / span;

    let span = x[n - 1] - x[n - 3];
    main[n - 1] = dx[n - 3];
    sub[n - 1] = span;
    rhs[n - 1] = (dx[n - 2] * dx[n - 2] * secants[n - 3]
        + (2.0 * span + dx[n - 2]) * dx[n - 3] * secants[n - 2])
        / span;

    Ok(thomas_solve(&sub, &main, &sup, &rhs)?)
}

fn pchip_slopes(x: &[f64], y: &[f64]) -> Vec<f64> {
    let n = x.len();
    let (dx, secants) = intervals(x, y);
    let mut slopes = vec![0.0; n];

    for k in 1..n - 1 {
        let (m0, m1) = (secants[k - 1], secants[k]);
        if m0 * m1 <= 0.0 {
            continue;
        }
        let w1 = 2.0 * dx[k] + dx[k - 1];
        let w2 = dx[k] + 2.0 * dx[k - 1];
        slopes[k] = (w1 + w2) / (w1 / m0 + w2 / m1);
    }

    slopes[0] = pchip_end_slope(dx[0], dx[1], secants[0], secants[1]);
    slopes[n - 1] = pchip_end_slope(dx[n - 2], dx[n - 3], secants[n - 2], secants[n - 3]);
    slopes
}

fn pchip_end_slope(h0: f64, h1: f64, m0: f64, m1: f64) -> f64 {
    let slope = ((2.0 * h0 + h1) * m0 - h0 * m1) / (h0 + h1);
    if slope.signum() != m0.signum() || m0 == 0.0 {
        0.0
    } else if m0.signum() != m1.signum() && slope.abs() > 3.0 * m0.abs() {
        3.0 * m0
    } else {
        slope
    }
}

#[cfg(test)]
mod tests {
    use super::{CubicSpline, SplineError};
    use crate::numerics::linear_grid;

    #[test]
    fn interpolating_spline_reproduces_cubics() {
        let x = [0.0, 0.3, 0.7, 1.0, 1.6, 2.0];
        let f = |x: f64| 0.5 * x * x * x - x * x + 2.0 * x - 1.0;
        let y: Vec<f64> = x.iter().map(|&x| f(x)).collect();
        let spline = CubicSpline::interpolating(&x, &y).expect("spline");
        for x in linear_grid(0.0, 2.0, 41).expect("grid") {
            assert!(
                (spline.evaluate(x) - f(x)).abs() < 1.0e-12,
                "mismatch at {x}"
            );
        }
    }

    #[test]
    fn interpolating_spline_hits_knots_and_holds_ends() {
        let x = linear_grid(0.0, 1.1, 8).expect("grid");
        let y = [2.0, 1.9, 1.7, 1.4, 1.0, 0.5, 0.2, 0.1];
        let spline = CubicSpline::interpolating(&x, &y).expect("spline");
        for (xi, yi) in x.iter().zip(y) {
            assert!((spline.evaluate(*xi) - yi).abs() < 1.0e-12);
        }
        assert_eq!(spline.evaluate(-5.0), 2.0);
        assert_eq!(spline.evaluate(3.0), 0.1);
        assert_eq!(spline.evaluate(f64::NAN), 2.0);
    }

    #[test]
    fn short_inputs_degrade_to_low_order_fits() {
        let constant = CubicSpline::interpolating(&[1.0], &[4.0]).expect("constant");
        assert_eq!(constant.evaluate(0.0), 4.0);
        assert_eq!(constant.evaluate(7.0), 4.0);

        let line = CubicSpline::interpolating(&[0.0, 2.0], &[1.0, 5.0]).expect("line");
        assert!((line.evaluate(0.5) - 2.0).abs() < 1.0e-15);

        let parabola =
            CubicSpline::interpolating(&[0.0, 1.0, 3.0], &[0.0, 1.0, 9.0]).expect("parabola");
        assert!((parabola.evaluate(2.0) - 4.0).abs() < 1.0e-12);
    }

    #[test]
    fn monotone_spline_does_not_overshoot_steps() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y = [0.0, 0.0, 1.0, 1.0, 1.0];
        let spline = CubicSpline::monotone(&x, &y).expect("pchip");
        let mut previous = f64::NEG_INFINITY;
        for x in linear_grid(0.0, 4.0, 81).expect("grid") {
            let value = spline.evaluate(x);
            assert!((0.0..=1.0).contains(&value));
            assert!(value >= previous - 1.0e-15);
            previous = value;
        }
    }

    #[test]
    fn rejects_unsorted_and_non_finite_knots() {
        assert!(matches!(
            CubicSpline::interpolating(&[0.0, 1.0, 1.0], &[0.0, 1.0, 2.0]),
            Err(SplineError::NonIncreasingKnots { index: 2, .. })
        ));
        assert!(matches!(
            CubicSpline::monotone(&[0.0, f64::INFINITY], &[0.0, 1.0]),
            Err(SplineError::NonFiniteValue { field: "x", .. })
        ));
        assert_eq!(
            CubicSpline::interpolating(&[], &[]).expect_err("empty"),
            SplineError::Empty
        );
    }
}
