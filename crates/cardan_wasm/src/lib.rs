//! WASM bindings for the cardan core library.

mod polisher;
mod polynomial;

pub use polisher::WasmRootPolisherRunner;
pub use polynomial::WasmPolynomial;

use cardan_core::complex::ComplexNumber;
use cardan_core::solvers::{self, SolverSettings};
use num_complex::Complex64;
use serde_wasm_bindgen::to_value;
use wasm_bindgen::prelude::*;

pub(crate) fn solver_settings(threshold: f64) -> Result<SolverSettings, String> {
    if !(threshold >= 0.0) || !threshold.is_finite() {
        return Err(format!(
            "threshold must be a finite non-negative number (got {}).",
            threshold
        ));
    }
    Ok(SolverSettings { threshold })
}

pub(crate) fn to_wire(roots: &[Complex64]) -> Vec<ComplexNumber> {
    roots.iter().copied().map(ComplexNumber::from).collect()
}

fn roots_to_value(roots: &[Complex64]) -> Result<JsValue, JsValue> {
    to_value(&to_wire(roots)).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

#[wasm_bindgen]
pub fn solve_linear(a: f64, b: f64) -> Result<JsValue, JsValue> {
    roots_to_value(&solvers::solve_linear(a, b))
}

#[wasm_bindgen]
pub fn solve_quadratic(a: f64, b: f64, c: f64, threshold: f64) -> Result<JsValue, JsValue> {
    let settings = solver_settings(threshold).map_err(|e| JsValue::from_str(&e))?;
    roots_to_value(&solvers::solve_quadratic(a, b, c, settings.threshold))
}

#[wasm_bindgen]
pub fn solve_cubic(a: f64, b: f64, c: f64, d: f64, threshold: f64) -> Result<JsValue, JsValue> {
    let settings = solver_settings(threshold).map_err(|e| JsValue::from_str(&e))?;
    roots_to_value(&solvers::solve_cubic(a, b, c, d, settings.threshold))
}

/// Coefficients are highest degree first.
#[wasm_bindgen]
pub fn solve_polynomial(coefficients: Vec<f64>, threshold: f64) -> Result<JsValue, JsValue> {
    let settings = solver_settings(threshold).map_err(|e| JsValue::from_str(&e))?;
    let roots = solvers::solve_polynomial(&coefficients, &settings)
        .map_err(|e| JsValue::from_str(&format!("Root solve failed: {:#}", e)))?;
    roots_to_value(&roots)
}

#[cfg(test)]
mod tests {
    use super::{solver_settings, to_wire, WasmPolynomial};
    use cardan_core::complex::ComplexNumber;
    use num_complex::Complex64;

    #[test]
    fn solver_settings_accept_zero_and_reject_invalid_thresholds() {
        assert_eq!(solver_settings(0.0).unwrap().threshold, 0.0);
        assert_eq!(solver_settings(1e-4).unwrap().threshold, 1e-4);
        assert!(solver_settings(-1.0).unwrap_err().contains("threshold"));
        assert!(solver_settings(f64::NAN).is_err());
        assert!(solver_settings(f64::INFINITY).is_err());
    }

    #[test]
    fn to_wire_keeps_component_order() {
        let wire = to_wire(&[Complex64::new(1.0, -2.0), Complex64::new(0.5, 0.0)]);
        assert_eq!(
            wire,
            vec![
                ComplexNumber { re: 1.0, im: -2.0 },
                ComplexNumber { re: 0.5, im: 0.0 }
            ]
        );
    }

    #[test]
    fn wasm_polynomial_from_coefficients_exposes_polynomial() {
        let Ok(mut polynomial) = WasmPolynomial::from_coefficients(vec![0.0, 1.0, -3.0, 2.0], 1e-4)
        else {
            panic!("coefficients should be accepted");
        };
        assert_eq!(polynomial.degree(), 2);
        assert_eq!(polynomial.coefficients(), vec![1.0, -3.0, 2.0]);
        assert_eq!(polynomial.get_threshold(), 1e-4);
        assert_eq!(polynomial.to_display_string(), "x^2 - 3*x + 2");

        assert!(polynomial.set_threshold(0.0).is_ok());
        assert_eq!(polynomial.get_threshold(), 0.0);
    }
}
