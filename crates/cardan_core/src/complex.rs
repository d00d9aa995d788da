//! Root values and their serializable form.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Builds a root on the real axis. The imaginary part is exactly zero.
pub fn real_root(value: f64) -> Complex64 {
    Complex64::new(value, 0.0)
}

/// Builds a complex-conjugate pair, the `+im` member first.
pub fn conjugate_pair(re: f64, im: f64) -> [Complex64; 2] {
    [Complex64::new(re, im), Complex64::new(re, -im)]
}

/// A root is real iff its imaginary part is exactly zero.
pub fn is_real(value: &Complex64) -> bool {
    value.im == 0.0
}

/// Counts the real members of a root set.
pub fn count_real(values: &[Complex64]) -> usize {
    values.iter().filter(|v| is_real(v)).count()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComplexNumber {
    pub re: f64,
    pub im: f64,
}

impl From<Complex64> for ComplexNumber {
    fn from(value: Complex64) -> Self {
        Self {
            re: value.re,
            im: value.im,
        }
    }
}

impl From<ComplexNumber> for Complex64 {
    fn from(value: ComplexNumber) -> Self {
        Complex64::new(value.re, value.im)
    }
}
