use crate::polynomial::Polynomial;
use anyhow::{bail, Result};
use nalgebra::DMatrix;
use num_complex::Complex64;

/// Roots of a polynomial of any degree as eigenvalues of its companion matrix.
///
/// Imaginary parts smaller than `threshold` in magnitude are snapped to zero so
/// that real roots classify as real.
pub fn companion_roots(polynomial: &Polynomial, threshold: f64) -> Result<Vec<Complex64>> {
    let degree = polynomial.degree();
    if degree == 0 {
        return Ok(Vec::new());
    }

    let matrix = companion_matrix(polynomial);
    let eigenvalues = matrix.complex_eigenvalues();

    let mut roots = Vec::with_capacity(degree);
    for (idx, lambda) in eigenvalues.iter().enumerate() {
        if !lambda.re.is_finite() || !lambda.im.is_finite() {
            bail!(
                "Companion matrix eigenvalue {} is not finite ({}).",
                idx,
                lambda
            );
        }
        let im = if lambda.im.abs() < threshold {
            0.0
        } else {
            lambda.im
        };
        roots.push(Complex64::new(lambda.re, im));
    }
    Ok(roots)
}

/// Frobenius companion matrix of the monic version of `polynomial`.
/// First row holds the negated normalized coefficients, the subdiagonal holds ones.
pub fn companion_matrix(polynomial: &Polynomial) -> DMatrix<f64> {
    let degree = polynomial.degree();
    let coefficients = polynomial.coefficients();
    let lead = polynomial.leading_coefficient();

    let mut matrix = DMatrix::zeros(degree, degree);
    for j in 0..degree {
        matrix[(0, j)] = -coefficients[j + 1] / lead;
    }
    for i in 1..degree {
        matrix[(i, i - 1)] = 1.0;
    }
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complex::{count_real, is_real};

    #[test]
    fn companion_matrix_has_monic_first_row() {
        let p = Polynomial::new(vec![2.0, -4.0, 6.0]).unwrap();
        let matrix = companion_matrix(&p);
        assert_eq!(matrix.nrows(), 2);
        assert_eq!(matrix[(0, 0)], 2.0);
        assert_eq!(matrix[(0, 1)], -3.0);
        assert_eq!(matrix[(1, 0)], 1.0);
        assert_eq!(matrix[(1, 1)], 0.0);
    }

    #[test]
    fn companion_roots_of_quartic_with_real_roots() {
        let p = Polynomial::from_roots(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        let mut roots = companion_roots(&p, 1e-4).expect("roots should compute");
        assert!(roots.iter().all(is_real));
        roots.sort_by(|a, b| a.re.partial_cmp(&b.re).unwrap());
        for (root, expected) in roots.iter().zip([1.0, 2.0, 3.0, 4.0]) {
            assert!((root.re - expected).abs() < 1e-8);
        }
    }

    #[test]
    fn companion_roots_keep_complex_pairs() {
        // (x^2 + 1)(x^2 - 4)
        let p = Polynomial::new(vec![1.0, 0.0, -3.0, 0.0, -4.0]).unwrap();
        let roots = companion_roots(&p, 1e-4).expect("roots should compute");
        assert_eq!(roots.len(), 4);
        assert_eq!(count_real(&roots), 2);
        for root in &roots {
            assert!(p.evaluate(*root).norm() < 1e-8);
        }
    }

    #[test]
    fn companion_roots_of_constant_are_empty() {
        let roots = companion_roots(&Polynomial::constant(5.0).unwrap(), 1e-4).unwrap();
        assert!(roots.is_empty());
    }
}
