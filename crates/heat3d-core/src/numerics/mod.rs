pub mod special;

pub use special::{
    exp_erfc, erfc, simpson, thomas_solve, CubicSpline, SimpsonError, SplineError,
    TridiagonalError,
};

fn kahan_add(sum: &mut f64, correction: &mut f64, value: f64) {
    let corrected = value - *correction;
    let next = *sum + corrected;
    *correction = (next - *sum) - corrected;
    *sum = next;
}

pub fn stable_sum(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut correction = 0.0;

    for &value in values {
        kahan_add(&mut sum, &mut correction, value);
    }

    sum
}

pub fn stable_mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(stable_sum(values) / values.len() as f64)
}

pub fn linear_grid(start: f64, end: f64, count: usize) -> Option<Vec<f64>> {
    if count < 2 {
        return None;
    }

    let step = (end - start) / ((count - 1) as f64);
    let mut grid = Vec::with_capacity(count);
    for index in 0..count {
        grid.push(start + step * (index as f64));
    }

    if let Some(last) = grid.last_mut() {
        *last = end;
    }

    Some(grid)
}

/// Index of the first maximum, ignoring NaN entries.
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, &value) in values.iter().enumerate() {
        if value.is_nan() {
            continue;
        }
        match best {
            Some((_, current)) if value <= current => {}
            _ => best = Some((index, value)),
        }
    }
    best.map(|(index, _)| index)
}

/// Index of the first entry closest to `target`.
pub fn argmin_distance(values: &[f64], target: f64) -> Option<usize> {
    let distances: Vec<f64> = values.iter().map(|value| (value - target).abs()).collect();
    let mut best: Option<(usize, f64)> = None;
    for (index, distance) in distances.into_iter().enumerate() {
        if distance.is_nan() {
            continue;
        }
        match best {
            Some((_, current)) if distance >= current => {}
            _ => best = Some((index, distance)),
        }
    }
    best.map(|(index, _)| index)
}

pub fn max_finite(values: &[f64]) -> Option<f64> {
    argmax(values).map(|index| values[index])
}
