use num_traits::Num;
use std::fmt::Debug;
use std::ops::Neg;

/// A trait for types a polynomial can be evaluated at.
/// Must support ring arithmetic, negation, debug printing, and conversion from f64.
/// Both `f64` and `Complex64` qualify.
pub trait Scalar: Num + Copy + Neg<Output = Self> + From<f64> + Debug + 'static {}

impl<T: Num + Copy + Neg<Output = T> + From<f64> + Debug + 'static> Scalar for T {}

/// Represents a function of one variable that can be evaluated at any `Scalar`.
pub trait UnivariateFunction<T: Scalar> {
    /// Upper bound on the polynomial degree of the function.
    fn degree(&self) -> usize;

    /// Evaluates the function at `x`.
    fn evaluate(&self, x: T) -> T;
}
