//! The `cardan_core` crate provides closed-form root finding for polynomials.
//! Everything is synchronous and free of side effects apart from `log` output.
//!
//! Key components:
//! - **Traits**: `Scalar` (f64 or Complex64), `UnivariateFunction` (anything evaluable in one variable).
//! - **Solvers**: linear, quadratic and Cardano cubic solvers that degrade to lower degree as leading coefficients vanish.
//! - **Polynomial**: coefficient storage, Horner evaluation and arithmetic; degree dispatch to the solvers.
//! - **Companion**: eigenvalue fallback for degrees above three.
//! - **Expression**: a parser, expander and bytecode VM for polynomials written as text.
//! - **Analysis**: Newton polishing and residual reports.

pub mod analysis;
pub mod companion;
pub mod complex;
pub mod expression;
pub mod polynomial;
pub mod solvers;
pub mod traits;

pub use complex::ComplexNumber;
pub use polynomial::Polynomial;
pub use solvers::{solve_cubic, solve_linear, solve_quadratic, SolverSettings, DEFAULT_THRESHOLD};
