//! Dense univariate polynomials with real coefficients.
//!
//! Coefficients are stored highest degree first, so `[a, b, c, d]` is
//! `a*x^3 + b*x^2 + c*x + d`. Leading zeros are trimmed on construction;
//! the zero polynomial is stored as `[0.0]`.

use crate::companion::companion_roots;
use crate::solvers::{solve_cubic, SolverSettings};
use crate::traits::{Scalar, UnivariateFunction};
use anyhow::Result;
use log::debug;
use num_complex::Complex64;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolynomialError {
    #[error("A polynomial needs at least one coefficient.")]
    Empty,
    #[error("Coefficient {index} is not finite ({value}).")]
    NonFiniteCoefficient { index: usize, value: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    coefficients: Vec<f64>,
}

impl Polynomial {
    pub fn new(coefficients: Vec<f64>) -> Result<Self, PolynomialError> {
        if coefficients.is_empty() {
            return Err(PolynomialError::Empty);
        }
        let polynomial = Self { coefficients };
        polynomial.check_finite()?;
        Ok(Self::trimmed(polynomial.coefficients))
    }

    pub fn zero() -> Self {
        Self {
            coefficients: vec![0.0],
        }
    }

    pub fn constant(value: f64) -> Result<Self, PolynomialError> {
        Self::new(vec![value])
    }

    /// `value * x^power`
    pub fn monomial(value: f64, power: usize) -> Result<Self, PolynomialError> {
        let mut coefficients = vec![0.0; power + 1];
        coefficients[0] = value;
        Self::new(coefficients)
    }

    /// Monic polynomial with the given real roots.
    /// Fails if a root is not finite or the expanded coefficients overflow.
    pub fn from_roots(roots: &[f64]) -> Result<Self, PolynomialError> {
        let product = roots.iter().fold(Self::one(), |acc, &root| {
            &acc * &Self::trimmed(vec![1.0, -root])
        });
        Self::new(product.coefficients)
    }

    fn one() -> Self {
        Self {
            coefficients: vec![1.0],
        }
    }

    fn trimmed(mut coefficients: Vec<f64>) -> Self {
        let first_nonzero = coefficients
            .iter()
            .position(|&c| c != 0.0)
            .unwrap_or(coefficients.len().saturating_sub(1));
        coefficients.drain(..first_nonzero);
        if coefficients.is_empty() {
            coefficients.push(0.0);
        }
        Self { coefficients }
    }

    /// Builds from lowest-degree-first coefficients.
    fn from_ascending(mut ascending: Vec<f64>) -> Self {
        ascending.reverse();
        Self::trimmed(ascending)
    }

    fn ascending(&self) -> impl Iterator<Item = f64> + '_ {
        self.coefficients.iter().rev().copied()
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Degree of the polynomial. Constants, including zero, have degree 0.
    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    pub fn leading_coefficient(&self) -> f64 {
        self.coefficients[0]
    }

    pub fn is_zero(&self) -> bool {
        self.coefficients.len() == 1 && self.coefficients[0] == 0.0
    }

    /// Horner evaluation at any scalar, real or complex.
    pub fn evaluate<T: Scalar>(&self, x: T) -> T {
        self.coefficients
            .iter()
            .fold(T::zero(), |acc, &c| acc * x + T::from(c))
    }

    /// Evaluates the polynomial and its derivative in one Horner pass.
    pub fn evaluate_with_derivative<T: Scalar>(&self, x: T) -> (T, T) {
        let mut value = T::zero();
        let mut derivative = T::zero();
        for &c in &self.coefficients {
            derivative = derivative * x + value;
            value = value * x + T::from(c);
        }
        (value, derivative)
    }

    pub fn derivative(&self) -> Self {
        let degree = self.degree();
        if degree == 0 {
            return Self::zero();
        }
        let coefficients = self.coefficients[..degree]
            .iter()
            .enumerate()
            .map(|(i, &c)| c * (degree - i) as f64)
            .collect();
        Self::trimmed(coefficients)
    }

    pub fn scale(&self, factor: f64) -> Result<Self, PolynomialError> {
        Self::new(self.coefficients.iter().map(|c| c * factor).collect())
    }

    /// First coefficient that is not finite, if any.
    ///
    /// `new` rejects these, but `+`, `-`, `*` and `pow` can still overflow.
    pub fn check_finite(&self) -> Result<(), PolynomialError> {
        match self.coefficients.iter().position(|c| !c.is_finite()) {
            Some(index) => Err(PolynomialError::NonFiniteCoefficient {
                index,
                value: self.coefficients[index],
            }),
            None => Ok(()),
        }
    }

    pub fn pow(&self, exponent: u32) -> Self {
        let mut result = Self::one();
        for _ in 0..exponent {
            result = &result * self;
        }
        result
    }

    /// All roots, counted with multiplicity.
    ///
    /// Constants have no roots. Degrees one to three use the closed-form solvers,
    /// anything higher goes through the companion matrix.
    pub fn roots(&self, settings: &SolverSettings) -> Result<Vec<Complex64>> {
        self.check_finite()?;
        match self.coefficients.as_slice() {
            [_] => Ok(Vec::new()),
            &[b, c] => Ok(solve_cubic(0.0, 0.0, b, c, settings.threshold)),
            &[b, c, d] => Ok(solve_cubic(0.0, b, c, d, settings.threshold)),
            &[a, b, c, d] => Ok(solve_cubic(a, b, c, d, settings.threshold)),
            _ => {
                debug!(
                    "degree {} exceeds closed forms; using companion matrix",
                    self.degree()
                );
                companion_roots(self, settings.threshold)
            }
        }
    }
}

impl<T: Scalar> UnivariateFunction<T> for Polynomial {
    fn degree(&self) -> usize {
        Polynomial::degree(self)
    }

    fn evaluate(&self, x: T) -> T {
        Polynomial::evaluate(self, x)
    }
}

impl Add for &Polynomial {
    type Output = Polynomial;

    fn add(self, rhs: Self) -> Polynomial {
        let len = self.coefficients.len().max(rhs.coefficients.len());
        let mut sum = vec![0.0; len];
        for (i, c) in self.ascending().enumerate() {
            sum[i] += c;
        }
        for (i, c) in rhs.ascending().enumerate() {
            sum[i] += c;
        }
        Polynomial::from_ascending(sum)
    }
}

impl Sub for &Polynomial {
    type Output = Polynomial;

    fn sub(self, rhs: Self) -> Polynomial {
        self + &(-rhs)
    }
}

impl Mul for &Polynomial {
    type Output = Polynomial;

    fn mul(self, rhs: Self) -> Polynomial {
        let mut product = vec![0.0; self.coefficients.len() + rhs.coefficients.len() - 1];
        for (i, a) in self.ascending().enumerate() {
            for (j, b) in rhs.ascending().enumerate() {
                product[i + j] += a * b;
            }
        }
        Polynomial::from_ascending(product)
    }
}

impl Neg for &Polynomial {
    type Output = Polynomial;

    fn neg(self) -> Polynomial {
        Polynomial {
            coefficients: self.coefficients.iter().map(|c| -c).collect(),
        }
    }
}

impl Add for Polynomial {
    type Output = Polynomial;

    fn add(self, rhs: Polynomial) -> Polynomial {
        &self + &rhs
    }
}

impl Sub for Polynomial {
    type Output = Polynomial;

    fn sub(self, rhs: Polynomial) -> Polynomial {
        &self - &rhs
    }
}

impl Mul for Polynomial {
    type Output = Polynomial;

    fn mul(self, rhs: Polynomial) -> Polynomial {
        &self * &rhs
    }
}

impl Neg for Polynomial {
    type Output = Polynomial;

    fn neg(self) -> Polynomial {
        -&self
    }
}

impl fmt::Display for Polynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return write!(f, "0");
        }
        let degree = self.degree();
        let mut first = true;
        for (i, &c) in self.coefficients.iter().enumerate() {
            if c == 0.0 {
                continue;
            }
            let power = degree - i;
            let magnitude = c.abs();
            if first {
                if c < 0.0 {
                    write!(f, "-")?;
                }
            } else {
                write!(f, " {} ", if c < 0.0 { '-' } else { '+' })?;
            }
            first = false;

            if magnitude != 1.0 || power == 0 {
                write!(f, "{magnitude}")?;
                if power > 0 {
                    write!(f, "*")?;
                }
            }
            match power {
                0 => {}
                1 => write!(f, "x")?,
                _ => write!(f, "x^{power}")?,
            }
        }
        Ok(())
    }
}
