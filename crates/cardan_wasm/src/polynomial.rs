//! Polynomial wrapper exposed to JavaScript.

use crate::{solver_settings, to_wire};
use cardan_core::analysis::{analyze_roots, NewtonSettings};
use cardan_core::expression::PolynomialExpression;
use cardan_core::solvers::SolverSettings;
use cardan_core::traits::UnivariateFunction;
use cardan_core::Polynomial;
use js_sys::Float64Array;
use num_complex::Complex64;
use serde_wasm_bindgen::to_value;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct WasmPolynomial {
    pub(crate) polynomial: Polynomial,
    expression: Option<PolynomialExpression>,
    pub(crate) settings: SolverSettings,
}

pub(crate) fn build_from_expression(
    source: &str,
    variable: &str,
    params: &[f64],
    param_names: &[String],
    threshold: f64,
) -> Result<(PolynomialExpression, SolverSettings), String> {
    let settings = solver_settings(threshold)?;
    let expression = PolynomialExpression::parse(source, variable, param_names, params)
        .map_err(|e| format!("Failed to parse polynomial: {}", e))?;
    Ok((expression, settings))
}

pub(crate) fn newton_settings(max_steps: u32, damping: f64) -> NewtonSettings {
    NewtonSettings {
        max_steps: max_steps as usize,
        damping,
        ..NewtonSettings::default()
    }
}

#[wasm_bindgen]
impl WasmPolynomial {
    #[wasm_bindgen(constructor)]
    pub fn new(
        expression: &str,
        variable: &str,
        params: Vec<f64>,
        param_names: Vec<String>,
        threshold: f64,
    ) -> Result<WasmPolynomial, JsValue> {
        console_error_panic_hook::set_once();

        let (expression, settings) =
            build_from_expression(expression, variable, &params, &param_names, threshold)
                .map_err(|e| JsValue::from_str(&e))?;

        Ok(WasmPolynomial {
            polynomial: expression.polynomial.clone(),
            expression: Some(expression),
            settings,
        })
    }

    /// Coefficients are highest degree first.
    pub fn from_coefficients(coefficients: Vec<f64>, threshold: f64) -> Result<WasmPolynomial, JsValue> {
        console_error_panic_hook::set_once();

        let settings = solver_settings(threshold).map_err(|e| JsValue::from_str(&e))?;
        let polynomial = Polynomial::new(coefficients)
            .map_err(|e| JsValue::from_str(&format!("Invalid coefficients: {}", e)))?;

        Ok(WasmPolynomial {
            polynomial,
            expression: None,
            settings,
        })
    }

    pub fn degree(&self) -> usize {
        self.polynomial.degree()
    }

    pub fn coefficients(&self) -> Vec<f64> {
        self.polynomial.coefficients().to_vec()
    }

    pub fn set_threshold(&mut self, threshold: f64) -> Result<(), JsValue> {
        self.settings = solver_settings(threshold).map_err(|e| JsValue::from_str(&e))?;
        Ok(())
    }

    pub fn get_threshold(&self) -> f64 {
        self.settings.threshold
    }

    #[wasm_bindgen(js_name = toString)]
    pub fn to_display_string(&self) -> String {
        self.polynomial.to_string()
    }

    /// Evaluates at `re + i*im`, returning `[re, im]`.
    /// Polynomials built from text are evaluated exactly as written.
    pub fn evaluate(&self, re: f64, im: f64) -> Float64Array {
        let z = Complex64::new(re, im);
        let value = match &self.expression {
            Some(expression) => expression.evaluate(z),
            None => self.polynomial.evaluate(z),
        };
        Float64Array::from(&[value.re, value.im][..])
    }

    pub fn roots(&self) -> Result<JsValue, JsValue> {
        let roots = self
            .polynomial
            .roots(&self.settings)
            .map_err(|e| JsValue::from_str(&format!("Root solve failed: {:#}", e)))?;
        to_value(&to_wire(&roots))
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    pub fn analyze(&self, polish: bool, max_steps: u32, damping: f64) -> Result<JsValue, JsValue> {
        let newton = polish.then(|| newton_settings(max_steps, damping));
        let report = analyze_roots(&self.polynomial, &self.settings, newton)
            .map_err(|e| JsValue::from_str(&format!("Root analysis failed: {:#}", e)))?;
        to_value(&report).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }
}
