use crate::complex::{is_real, ComplexNumber};
use crate::polynomial::Polynomial;
use crate::solvers::SolverSettings;
use crate::traits::UnivariateFunction;
use anyhow::{bail, Context, Result};
use log::{debug, warn};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NewtonSettings {
    pub max_steps: usize,
    pub damping: f64,
    pub tolerance: f64,
}

impl Default for NewtonSettings {
    fn default() -> Self {
        Self {
            max_steps: 25,
            damping: 1.0,
            tolerance: 1e-12,
        }
    }
}

impl NewtonSettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            bail!("max_steps must be greater than zero.");
        }
        if !(self.damping > 0.0) {
            bail!("damping must be positive.");
        }
        if !(self.tolerance > 0.0) {
            bail!("tolerance must be positive.");
        }
        Ok(())
    }
}

/// Newton iteration on a single root, advanced one step at a time.
///
/// Real starting points are iterated in real arithmetic so they stay real.
/// The best iterate seen so far is what `root` reports, so polishing never
/// increases the residual.
#[derive(Debug, Clone)]
pub struct NewtonPolisher {
    polynomial: Polynomial,
    settings: NewtonSettings,
    current: Complex64,
    best: Complex64,
    best_residual: f64,
    residual_norm: f64,
    iterations: usize,
    done: bool,
}

impl NewtonPolisher {
    pub fn new(polynomial: &Polynomial, start: Complex64, settings: NewtonSettings) -> Result<Self> {
        settings.validate()?;
        if !start.re.is_finite() || !start.im.is_finite() {
            bail!("Starting point {} is not finite.", start);
        }
        let residual_norm = polynomial.evaluate(start).norm();
        Ok(Self {
            polynomial: polynomial.clone(),
            settings,
            current: start,
            best: start,
            best_residual: residual_norm,
            residual_norm,
            iterations: 0,
            done: residual_norm <= settings.tolerance || polynomial.degree() == 0,
        })
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Residual of the most recent iterate.
    pub fn residual_norm(&self) -> f64 {
        self.residual_norm
    }

    /// Residual of the best iterate.
    pub fn best_residual(&self) -> f64 {
        self.best_residual
    }

    pub fn root(&self) -> Complex64 {
        self.best
    }

    pub fn converged(&self) -> bool {
        self.best_residual <= self.settings.tolerance
    }

    /// Performs one damped Newton step. Does nothing once done.
    pub fn step(&mut self) {
        if self.done {
            return;
        }

        let next = if is_real(&self.current) {
            let x = self.current.re;
            let (value, derivative) = self.polynomial.evaluate_with_derivative(x);
            if derivative == 0.0 {
                debug!("zero derivative at {x}; stopping Newton iteration");
                self.done = true;
                return;
            }
            Complex64::new(x - self.settings.damping * value / derivative, 0.0)
        } else {
            let (value, derivative) = self.polynomial.evaluate_with_derivative(self.current);
            if derivative.norm() == 0.0 {
                debug!("zero derivative at {}; stopping Newton iteration", self.current);
                self.done = true;
                return;
            }
            self.current - value / derivative * self.settings.damping
        };

        self.iterations += 1;
        if !next.re.is_finite() || !next.im.is_finite() {
            debug!("non-finite Newton iterate; keeping best root {}", self.best);
            self.done = true;
            return;
        }

        self.current = next;
        self.residual_norm = self.polynomial.evaluate(next).norm();
        if self.residual_norm < self.best_residual {
            self.best = next;
            self.best_residual = self.residual_norm;
        }

        if self.residual_norm <= self.settings.tolerance || self.iterations >= self.settings.max_steps {
            self.done = true;
        }
    }

    /// Steps until done and returns the best root.
    pub fn run(&mut self) -> Complex64 {
        while !self.done {
            self.step();
        }
        self.best
    }
}

/// Refines an approximate root of `polynomial` with damped Newton iterations.
pub fn polish_root(polynomial: &Polynomial, root: Complex64, settings: NewtonSettings) -> Result<Complex64> {
    let mut polisher = NewtonPolisher::new(polynomial, root, settings)?;
    let polished = polisher.run();
    if !polisher.converged() {
        warn!(
            "Newton polishing stopped after {} steps (|p(z)| = {:e})",
            polisher.iterations(),
            polisher.best_residual()
        );
    }
    Ok(polished)
}

/// |f(z)| at each root.
pub fn residual_norms<F: UnivariateFunction<Complex64>>(function: &F, roots: &[Complex64]) -> Vec<f64> {
    roots.iter().map(|&z| function.evaluate(z).norm()).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootEntry {
    pub value: ComplexNumber,
    pub is_real: bool,
    pub residual: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootReport {
    pub coefficients: Vec<f64>,
    pub degree: usize,
    pub roots: Vec<RootEntry>,
    pub max_residual: f64,
    pub polished: bool,
}

impl RootReport {
    /// Builds the report for roots that have already been computed.
    pub fn from_roots(polynomial: &Polynomial, roots: &[Complex64], polished: bool) -> Self {
        let residuals = residual_norms(polynomial, roots);
        let max_residual = residuals.iter().copied().fold(0.0, f64::max);
        let entries = roots
            .iter()
            .zip(residuals)
            .map(|(root, residual)| RootEntry {
                value: ComplexNumber::from(*root),
                is_real: is_real(root),
                residual,
            })
            .collect();

        Self {
            coefficients: polynomial.coefficients().to_vec(),
            degree: polynomial.degree(),
            roots: entries,
            max_residual,
            polished,
        }
    }

    pub fn values(&self) -> Vec<Complex64> {
        self.roots.iter().map(|entry| entry.value.into()).collect()
    }
}

/// Solves `polynomial`, optionally polishes every root, and reports residuals.
pub fn analyze_roots(
    polynomial: &Polynomial,
    solver: &SolverSettings,
    newton: Option<NewtonSettings>,
) -> Result<RootReport> {
    let mut roots = polynomial
        .roots(solver)
        .with_context(|| format!("Failed to solve {}.", polynomial))?;

    if let Some(settings) = newton {
        for (idx, root) in roots.iter_mut().enumerate() {
            *root = polish_root(polynomial, *root, settings)
                .with_context(|| format!("Failed to polish root {}.", idx))?;
        }
    }

    Ok(RootReport::from_roots(polynomial, &roots, newton.is_some()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solvers::solve_cubic;

    fn assert_err_contains<T: std::fmt::Debug>(result: Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err:#}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    #[test]
    fn newton_settings_reject_invalid_values() {
        let p = Polynomial::from_roots(&[1.0]).unwrap();
        let start = Complex64::new(0.5, 0.0);
        let bad = |settings: NewtonSettings| NewtonPolisher::new(&p, start, settings);
        assert_err_contains(
            bad(NewtonSettings { max_steps: 0, ..NewtonSettings::default() }),
            "max_steps",
        );
        assert_err_contains(
            bad(NewtonSettings { damping: 0.0, ..NewtonSettings::default() }),
            "damping must be positive",
        );
        assert_err_contains(
            bad(NewtonSettings { tolerance: f64::NAN, ..NewtonSettings::default() }),
            "tolerance must be positive",
        );
        assert_err_contains(
            NewtonPolisher::new(&p, Complex64::new(f64::NAN, 0.0), NewtonSettings::default()),
            "not finite",
        );
    }

    #[test]
    fn polish_root_refines_real_root_and_keeps_it_real() {
        let p = Polynomial::from_roots(&[1.0, 2.0, 3.0]).unwrap();
        let polished = polish_root(&p, Complex64::new(2.1, 0.0), NewtonSettings::default())
            .expect("polish should run");
        assert!(is_real(&polished));
        assert!((polished.re - 2.0).abs() < 1e-10);
    }

    #[test]
    fn polish_root_refines_complex_root() {
        let p = Polynomial::new(vec![1.0, 2.0, 5.0]).unwrap();
        let polished = polish_root(&p, Complex64::new(-0.9, 2.1), NewtonSettings::default())
            .expect("polish should run");
        assert!((polished - Complex64::new(-1.0, 2.0)).norm() < 1e-10);
    }

    #[test]
    fn polishing_never_increases_residual() {
        // A double root converges slowly; a single step cap cannot make things worse.
        let p = Polynomial::from_roots(&[1.0, 1.0, -2.0]).unwrap();
        let settings = NewtonSettings { max_steps: 1, damping: 1.7, ..NewtonSettings::default() };
        for start in [0.3, 0.99, 1.4, -1.8, 5.0] {
            let start = Complex64::new(start, 0.0);
            let before = p.evaluate(start).norm();
            let after = p.evaluate(polish_root(&p, start, settings).unwrap()).norm();
            assert!(after <= before, "residual grew from {before} to {after}");
        }
    }

    #[test]
    fn polisher_steps_until_done() {
        let p = Polynomial::from_roots(&[3.0]).unwrap();
        let mut polisher =
            NewtonPolisher::new(&p, Complex64::new(10.0, 0.0), NewtonSettings::default()).unwrap();
        assert!(!polisher.is_done());
        polisher.step();
        // Newton is exact on a linear polynomial.
        assert!(polisher.is_done());
        assert_eq!(polisher.iterations(), 1);
        assert_eq!(polisher.root(), Complex64::new(3.0, 0.0));
        assert!(polisher.converged());
        polisher.step();
        assert_eq!(polisher.iterations(), 1);
    }

    #[test]
    fn polisher_stops_on_zero_derivative() {
        let p = Polynomial::new(vec![1.0, 0.0, 1.0]).unwrap();
        let mut polisher =
            NewtonPolisher::new(&p, Complex64::new(0.0, 0.0), NewtonSettings::default()).unwrap();
        polisher.step();
        assert!(polisher.is_done());
        assert_eq!(polisher.iterations(), 0);
        assert!(!polisher.converged());
    }

    #[test]
    fn residual_norms_evaluate_each_root() {
        let p = Polynomial::from_roots(&[1.0, 2.0, 3.0]).unwrap();
        let roots = solve_cubic(1.0, -6.0, 11.0, -6.0, 1e-4);
        let residuals = residual_norms(&p, &roots);
        assert_eq!(residuals.len(), 3);
        assert!(residuals.iter().all(|r| *r < 1e-9));
    }

    #[test]
    fn analyze_roots_reports_classification_and_residuals() {
        let p = Polynomial::new(vec![1.0, 0.0, 1.0, -10.0]).unwrap();
        let report = analyze_roots(&p, &SolverSettings::default(), Some(NewtonSettings::default()))
            .expect("analysis should succeed");
        assert_eq!(report.degree, 3);
        assert_eq!(report.coefficients, vec![1.0, 0.0, 1.0, -10.0]);
        assert!(report.polished);
        assert_eq!(report.roots.iter().filter(|r| r.is_real).count(), 1);
        assert!(report.max_residual < 1e-9);
        assert_eq!(report.values().len(), 3);

        let unpolished = analyze_roots(&p, &SolverSettings::default(), None).unwrap();
        assert!(!unpolished.polished);
        assert!(unpolished.max_residual < 1e-9);
    }

    #[test]
    fn analyze_roots_of_constant_is_empty() {
        let report = analyze_roots(&Polynomial::constant(2.0).unwrap(), &SolverSettings::default(), None)
            .unwrap();
        assert!(report.roots.is_empty());
        assert_eq!(report.max_residual, 0.0);
    }
}
