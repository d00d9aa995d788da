//! Stepped Newton polishing runner.

use crate::polynomial::{newton_settings, WasmPolynomial};
use cardan_core::analysis::{NewtonPolisher, NewtonSettings, RootReport};
use cardan_core::solvers::SolverSettings;
use cardan_core::Polynomial;
use serde::Serialize;
use serde_wasm_bindgen::to_value;
use wasm_bindgen::prelude::*;

/// Progress payload for the stepped polisher.
#[derive(Debug, Serialize)]
struct PolishProgress {
    done: bool,
    root_index: usize,
    root_count: usize,
    iterations: usize,
    max_steps: usize,
    residual_norm: f64,
}

struct PolisherState {
    polynomial: Polynomial,
    polishers: Vec<NewtonPolisher>,
    current: usize,
    settings: NewtonSettings,
}

impl PolisherState {
    fn new(
        polynomial: &Polynomial,
        solver: &SolverSettings,
        settings: NewtonSettings,
    ) -> anyhow::Result<Self> {
        settings.validate()?;
        let polishers = polynomial
            .roots(solver)?
            .into_iter()
            .map(|root| NewtonPolisher::new(polynomial, root, settings))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let mut state = Self {
            polynomial: polynomial.clone(),
            polishers,
            current: 0,
            settings,
        };
        state.skip_finished();
        Ok(state)
    }

    fn is_done(&self) -> bool {
        self.current >= self.polishers.len()
    }

    fn skip_finished(&mut self) {
        while self
            .polishers
            .get(self.current)
            .is_some_and(|polisher| polisher.is_done())
        {
            self.current += 1;
        }
    }

    /// Runs up to `batch_size` Newton steps across the remaining roots.
    fn advance(&mut self, batch_size: usize) {
        for _ in 0..batch_size {
            let Some(polisher) = self.polishers.get_mut(self.current) else {
                break;
            };
            polisher.step();
            self.skip_finished();
        }
    }

    fn progress(&self) -> PolishProgress {
        let active = self
            .polishers
            .get(self.current)
            .or_else(|| self.polishers.last());
        PolishProgress {
            done: self.is_done(),
            root_index: self.current.min(self.polishers.len().saturating_sub(1)),
            root_count: self.polishers.len(),
            iterations: active.map_or(0, |p| p.iterations()),
            max_steps: self.settings.max_steps,
            residual_norm: active.map_or(0.0, |p| p.best_residual()),
        }
    }

    fn report(&self) -> RootReport {
        let roots: Vec<_> = self.polishers.iter().map(|p| p.root()).collect();
        RootReport::from_roots(&self.polynomial, &roots, true)
    }
}

#[wasm_bindgen]
pub struct WasmRootPolisherRunner {
    state: Option<PolisherState>,
}

#[wasm_bindgen]
impl WasmRootPolisherRunner {
    #[wasm_bindgen(constructor)]
    pub fn new(
        polynomial: &WasmPolynomial,
        max_steps: u32,
        damping: f64,
    ) -> Result<WasmRootPolisherRunner, JsValue> {
        console_error_panic_hook::set_once();

        let state = PolisherState::new(
            &polynomial.polynomial,
            &polynomial.settings,
            newton_settings(max_steps, damping),
        )
        .map_err(|e| JsValue::from_str(&format!("Polisher setup failed: {:#}", e)))?;

        Ok(WasmRootPolisherRunner { state: Some(state) })
    }

    pub fn is_done(&self) -> bool {
        self.state.as_ref().map_or(true, |state| state.is_done())
    }

    pub fn run_steps(&mut self, batch_size: u32) -> Result<JsValue, JsValue> {
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| JsValue::from_str("Runner not initialized"))?;

        state.advance(batch_size as usize);

        to_value(&state.progress())
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    pub fn get_progress(&self) -> Result<JsValue, JsValue> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| JsValue::from_str("Runner not initialized"))?;

        to_value(&state.progress())
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    pub fn get_result(&self) -> Result<JsValue, JsValue> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| JsValue::from_str("Runner not initialized"))?;

        if !state.is_done() {
            return Err(JsValue::from_str("Root polishing has not finished yet."));
        }

        to_value(&state.report())
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }
}
