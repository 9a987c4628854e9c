//! Thomas algorithm for tridiagonal systems.

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TridiagonalError {
    #[error("tridiagonal system must have at least one row")]
    Empty,
    #[error("tridiagonal band length mismatch: sub={sub}, main={main}, sup={sup}, rhs={rhs}")]
    LengthMismatch {
        sub: usize,
        main: usize,
        sup: usize,
        rhs: usize,
    },
    #[error("tridiagonal system is singular at row {row}")]
    SingularPivot { row: usize },
}

/// Solves `A x = d` for a tridiagonal `A`.
///
/// - `sub`: sub-diagonal, `sub[0]` unused
/// - `main`: main diagonal
/// - `sup`: super-diagonal, `sup[n-1]` unused
pub fn thomas_solve(
    sub: &[f64],
    main: &[f64],
    sup: &[f64],
    rhs: &[f64],
) -> Result<Vec<f64>, TridiagonalError> {
    let n = rhs.len();
    if n == 0 {
        return Err(TridiagonalError::Empty);
    }
    if sub.len() != n || main.len() != n || sup.len() != n {
        return Err(TridiagonalError::LengthMismatch {
            sub: sub.len(),
            main: main.len(),
            sup: sup.len(),
            rhs: n,
        });
    }

    let mut c_prime = vec![0.0; n];
    let mut d_prime = vec![0.0; n];

    if main[0] == 0.0 || !main[0].is_finite() {
        return Err(TridiagonalError::SingularPivot { row: 0 });
    }
    c_prime[0] = sup[0] / main[0];
    d_prime[0] = rhs[0] / main[0];

    for row in 1..n {
        let pivot = main[row] - sub[row] * c_prime[row - 1];
        if pivot == 0.0 || !pivot.is_finite() {
            return Err(TridiagonalError::SingularPivot { row });
        }
        if row < n - 1 {
            c_prime[row] = sup[row] / pivot;
        }
        d_prime[row] = (rhs[row] - sub[row] * d_prime[row - 1]) / pivot;
    }

    let mut x = vec![0.0; n];
    x[n - 1] = d_prime[n - 1];
    for row in (0..n - 1).rev() {
        x[row] = d_prime[row] - c_prime[row] * x[row + 1];
    }

    Ok(x)
}
