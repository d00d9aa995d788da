use crate::complex::{conjugate_pair, real_root};
use crate::polynomial::Polynomial;
use anyhow::Result;
use log::{debug, trace};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Discriminants closer to zero than this are treated as exactly zero.
pub const DEFAULT_THRESHOLD: f64 = 0.0001;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverSettings {
    pub threshold: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Solves a*x + b = 0.
/// Returns no roots when `a == 0`, whatever `b` is.
pub fn solve_linear(a: f64, b: f64) -> Vec<Complex64> {
    if a == 0.0 {
        debug!("linear coefficient vanished; no unique root");
        return Vec::new();
    }
    vec![real_root(-b / a)]
}

/// Solves a*x^2 + b*x + c = 0.
/// A repeated root is returned twice; complex roots come as a conjugate pair.
///
/// When `b^2 - 4ac` overflows for finite inputs, the monic form is rescaled so
/// the largest root is of order one; `threshold` then applies to the rescaled
/// discriminant.
pub fn solve_quadratic(a: f64, b: f64, c: f64, threshold: f64) -> Vec<Complex64> {
    if a == 0.0 {
        debug!("quadratic coefficient vanished; solving as linear");
        return solve_linear(b, c);
    }

    let d = b * b - 4.0 * a * c;
    if d.is_finite() || !(a.is_finite() && b.is_finite() && c.is_finite()) {
        return quadratic_roots(a, b, d, threshold);
    }

    let (p1, p0) = (b / a, c / a);
    let scale = root_scale(&[p1, p0]);
    if !scale.is_finite() || scale == 0.0 {
        return quadratic_roots(a, b, d, threshold);
    }
    debug!("quadratic discriminant overflowed; rescaling by {scale:e}");
    let (p1, p0) = (p1 / scale, p0 / scale / scale);
    quadratic_roots(1.0, p1, p1 * p1 - 4.0 * p0, threshold)
        .into_iter()
        .map(|z| z * scale)
        .collect()
}

fn quadratic_roots(a: f64, b: f64, d: f64, threshold: f64) -> Vec<Complex64> {
    let d = snap_to_zero(d, threshold);
    let two_a = 2.0 * a;

    if d > 0.0 {
        let sqrt_d = d.sqrt();
        vec![real_root((-b + sqrt_d) / two_a), real_root((-b - sqrt_d) / two_a)]
    } else if d == 0.0 {
        let root = real_root(-b / two_a);
        vec![root, root]
    } else {
        conjugate_pair(-b / two_a, (-d).sqrt() / two_a).to_vec()
    }
}

/// Solves a*x^3 + b*x^2 + c*x + d = 0 with Cardano's method.
/// Always yields three roots (counted with multiplicity) when `a != 0`.
///
/// The Cardano terms grow like the cube of the monic coefficients. If they
/// overflow, the monic cubic is rescaled so its roots are of order one, solved,
/// and scaled back; `threshold` then applies to the rescaled discriminant.
/// Roots whose magnitude itself exceeds `f64` range still come back non-finite.
pub fn solve_cubic(a: f64, b: f64, c: f64, d: f64, threshold: f64) -> Vec<Complex64> {
    if a == 0.0 {
        debug!("cubic coefficient vanished; solving as quadratic");
        return solve_quadratic(b, c, d, threshold);
    }

    // Monic form x^3 + p2*x^2 + p1*x + p0
    let (p2, p1, p0) = (b / a, c / a, d / a);
    let roots = monic_cubic_roots(p2, p1, p0, threshold);
    if roots.iter().all(|z| z.is_finite()) {
        return roots;
    }

    let scale = root_scale(&[p2, p1, p0]);
    if !scale.is_finite() || scale == 0.0 {
        return roots;
    }
    debug!("cubic terms overflowed; rescaling by {scale:e}");
    monic_cubic_roots(
        p2 / scale,
        p1 / scale / scale,
        p0 / scale / scale / scale,
        threshold,
    )
    .into_iter()
    .map(|z| z * scale)
    .collect()
}

fn monic_cubic_roots(p2: f64, p1: f64, p0: f64, threshold: f64) -> Vec<Complex64> {
    let shift = p2 / 3.0;

    let q = (3.0 * p1 - p2 * p2) / 9.0;
    let r = (9.0 * p2 * p1 - 27.0 * p0 - 2.0 * p2 * p2 * p2) / 54.0;
    let disc = snap_to_zero(q * q * q + r * r, threshold);

    if disc > 0.0 {
        // One real root and a conjugate pair.
        let sqrt_disc = disc.sqrt();
        let s = (r + sqrt_disc).cbrt();
        let t = (r - sqrt_disc).cbrt();

        let mut roots = Vec::with_capacity(3);
        roots.push(real_root(s + t - shift));
        roots.extend(conjugate_pair(
            -shift - 0.5 * (s + t),
            0.5 * 3.0_f64.sqrt() * (s - t),
        ));
        roots
    } else if q >= 0.0 {
        // Only reachable when q and r both vanish up to snapping.
        let s = r.cbrt();
        vec![
            real_root(2.0 * s - shift),
            real_root(-s - shift),
            real_root(-s - shift),
        ]
    } else {
        // Snapping can push the ratio just outside [-1, 1].
        let ratio = (r / (-q * q * q).sqrt()).clamp(-1.0, 1.0);
        let theta = ratio.acos();
        let scale = 2.0 * (-q).sqrt();
        (0..3)
            .map(|k| {
                let phase = (theta + 2.0 * PI * k as f64) / 3.0;
                real_root(scale * phase.cos() - shift)
            })
            .collect()
    }
}

/// Bound on root magnitude of a monic polynomial, given its lower coefficients
/// highest degree first: the largest `|p_k|^(1/k)`.
fn root_scale(lower: &[f64]) -> f64 {
    lower
        .iter()
        .enumerate()
        .map(|(i, p)| p.abs().powf(1.0 / (i + 1) as f64))
        .fold(0.0, f64::max)
}

/// Finds every root of the polynomial with the given coefficients, highest degree first.
/// Degrees up to three use the closed forms; higher degrees fall back to the companion matrix.
pub fn solve_polynomial(coefficients: &[f64], settings: &SolverSettings) -> Result<Vec<Complex64>> {
    let polynomial = Polynomial::new(coefficients.to_vec())?;
    polynomial.roots(settings)
}

fn snap_to_zero(value: f64, threshold: f64) -> f64 {
    if value != 0.0 && value.abs() < threshold {
        trace!("discriminant {value:e} snapped to zero (threshold {threshold:e})");
        0.0
    } else {
        value
    }
}
