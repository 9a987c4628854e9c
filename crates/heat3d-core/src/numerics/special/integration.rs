#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimpsonError {
    #[error("simpson integration requires at least 2 samples, got {actual}")]
    InsufficientPoints { actual: usize },
    #[error("simpson input length mismatch: x={x}, y={y}")]
    LengthMismatch { x: usize, y: usize },
    #[error("simpson abscissa interval {index} has zero width")]
    DegenerateInterval { index: usize },
    #[error("simpson vector '{field}' must contain finite values, index {index} got {value}")]
    NonFiniteValue {
        field: &'static str,
        index: usize,
        value: f64,
    },
}

/// Composite Simpson's rule on an arbitrary (possibly non-uniform, possibly
/// descending) abscissa.
///
/// An even sample count integrates the first `n-1` samples with Simpson's
/// rule and closes the last interval with Cartwright's correction, so the
/// result stays exact for quadratics.
pub fn simpson(y: &[f64], x: &[f64]) -> Result<f64, SimpsonError> {
    validate(y, x)?;
    let n = y.len();
    if n == 2 {
        return Ok(0.5 * (x[1] - x[0]) * (y[0] + y[1]));
    }
    if n % 2 == 1 {
        return Ok(simpson_odd(y, x));
    }

    let head = simpson_odd(&y[..n - 1], &x[..n - 1]);
    let h0 = x[n - 2] - x[n - 3];
    let h1 = x[n - 1] - x[n - 2];
    let alpha = (2.0 * h1 * h1 + 3.0 * h0 * h1) / (6.0 * (h0 + h1));
    let beta = (h1 * h1 + 3.0 * h0 * h1) / (6.0 * h0);
    let eta = h1 * h1 * h1 / (6.0 * h0 * (h0 + h1));
    Ok(head + alpha * y[n - 1] + beta * y[n - 2] - eta * y[n - 3])
}

fn simpson_odd(y: &[f64], x: &[f64]) -> f64 {
    let mut total = 0.0;
    for start in (0..y.len() - 2).step_by(2) {
        let h0 = x[start + 1] - x[start];
        let h1 = x[start + 2] - x[start + 1];
        let hsum = h0 + h1;
        let hprod = h0 * h1;
        let h0divh1 = h0 / h1;
        total += hsum / 6.0
            * (y[start] * (2.0 - 1.0 / h0divh1)
                + y[start + 1] * (hsum * hsum / hprod)
                + y[start + 2] * (2.0 - h0divh1));
    }
    total
}

fn validate(y: &[f64], x: &[f64]) -> Result<(), SimpsonError> {
    if y.len() != x.len() {
        return Err(SimpsonError::LengthMismatch {
            x: x.len(),
            y: y.len(),
        });
    }
    if y.len() < 2 {
        return Err(SimpsonError::InsufficientPoints { actual: y.len() });
    }
    for (field, values) in [("x", x), ("y", y)] {
        if let Some((index, &value)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(SimpsonError::NonFiniteValue {
                field,
                index,
                value,
            });
        }
    }
    if let Some(index) = x.windows(2).position(|pair| pair[1] == pair[0]) {
        return Err(SimpsonError::DegenerateInterval { index });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{simpson, SimpsonError};
    use crate::numerics::linear_grid;

    #[test]
    fn integrates_quadratics_exactly_for_odd_and_even_counts() {
        for count in [3_usize, 4, 9, 10, 1000] {
            let x = linear_grid(0.0, 2.0, count).expect("grid");
            let y: Vec<f64> = x.iter().map(|x| 3.0 * x * x - x + 1.0).collect();
            let integral = simpson(&y, &x).expect("integral");
            assert!((integral - 8.0).abs() < 1.0e-10, "count={count}: {integral}");
        }
    }

    #[test]
    fn integrates_on_non_uniform_descending_grid() {
        let x = [1.0, 0.9, 0.7, 0.6, 0.3, 0.0];
        let y: Vec<f64> = x.iter().map(|x| x * x).collect();
        let integral = simpson(&y, &x).expect("integral");
        assert!((integral + 1.0 / 3.0).abs() < 1.0e-12);
    }

    #[test]
    fn two_samples_fall_back_to_trapezoid() {
        let integral = simpson(&[1.0, 3.0], &[0.0, 0.5]).expect("integral");
        assert!((integral - 1.0).abs() < 1.0e-15);
    }

    #[test]
    fn rejects_invalid_inputs() {
        assert_eq!(
            simpson(&[1.0], &[0.0]).expect_err("too short"),
            SimpsonError::InsufficientPoints { actual: 1 }
        );
        assert_eq!(
            simpson(&[1.0, 2.0, 3.0], &[0.0, 0.0, 1.0]).expect_err("degenerate"),
            SimpsonError::DegenerateInterval { index: 0 }
        );
        assert!(matches!(
            simpson(&[1.0, f64::NAN], &[0.0, 1.0]),
            Err(SimpsonError::NonFiniteValue { field: "y", index: 1, .. })
        ));
    }
}
