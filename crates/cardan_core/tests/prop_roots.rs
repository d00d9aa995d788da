//! Property-based tests for the closed-form solvers using proptest.
//!
//! Covers: linear and quadratic solutions, discriminant snapping, cubic degradation, real-root recovery,
//! companion-matrix agreement, and expression round trips.

use cardan_core::companion::companion_roots;
use cardan_core::complex::is_real;
use cardan_core::expression::parse_polynomial;
use cardan_core::{solve_cubic, solve_linear, solve_quadratic, Polynomial, DEFAULT_THRESHOLD};
use num_complex::Complex64;
use proptest::prelude::*;

fn sorted_real_parts(roots: &[Complex64]) -> Vec<f64> {
    let mut values: Vec<f64> = roots.iter().map(|z| z.re).collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    values
}

fn bits(roots: &[Complex64]) -> Vec<(u64, u64)> {
    roots.iter().map(|z| (z.re.to_bits(), z.im.to_bits())).collect()
}

fn nonzero() -> impl Strategy<Value = f64> {
    prop_oneof![-100.0..-0.01f64, 0.01..100.0f64]
}

// ── Linear ───────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn linear_has_exactly_one_root(a in nonzero(), b in -100.0..100.0f64) {
        let roots = solve_linear(a, b);
        prop_assert_eq!(roots.len(), 1);
        prop_assert_eq!(roots[0], Complex64::new(-b / a, 0.0));
    }

    #[test]
    fn linear_without_slope_is_empty(b in -100.0..100.0f64) {
        prop_assert!(solve_linear(0.0, b).is_empty());
    }
}

// ── Quadratic ────────────────────────────────────────────────────────

proptest! {
    /// Well separated real roots are recovered exactly up to rounding.
    #[test]
    fn quadratic_recovers_real_roots(
        a in 0.5..5.0f64,
        r1 in -10.0..10.0f64,
        r2 in -10.0..10.0f64,
    ) {
        prop_assume!((r1 - r2).abs() > 0.1);
        let b = -a * (r1 + r2);
        let c = a * r1 * r2;
        let roots = solve_quadratic(a, b, c, DEFAULT_THRESHOLD);
        prop_assert!(roots.iter().all(is_real));
        let found = sorted_real_parts(&roots);
        let expected = sorted_real_parts(&[Complex64::new(r1, 0.0), Complex64::new(r2, 0.0)]);
        for (f, e) in found.iter().zip(expected.iter()) {
            prop_assert!((f - e).abs() < 1e-8, "expected {}, got {}", e, f);
        }
    }

    /// Complex pairs share a real part and satisfy the equation.
    #[test]
    fn quadratic_complex_roots_satisfy_equation(
        re in -10.0..10.0f64,
        im in 0.1..10.0f64,
        a in 0.5..5.0f64,
    ) {
        // a (x - (re + i im)) (x - (re - i im))
        let b = -2.0 * a * re;
        let c = a * (re * re + im * im);
        let roots = solve_quadratic(a, b, c, DEFAULT_THRESHOLD);
        prop_assert_eq!(roots.len(), 2);
        prop_assert_eq!(roots[0].re, roots[1].re);
        prop_assert_eq!(roots[0].im, -roots[1].im);
        for z in roots {
            let value = z * z * a + z * b + c;
            prop_assert!(value.norm() < 1e-8 * (1.0 + c.abs()), "residual {} at {}", value, z);
        }
    }

    /// A discriminant inside the threshold collapses to one repeated real root.
    #[test]
    fn quadratic_snapped_discriminant_gives_equal_real_roots(
        a in nonzero(),
        b in -10.0..10.0f64,
        epsilon in -0.9 * DEFAULT_THRESHOLD..0.9 * DEFAULT_THRESHOLD,
    ) {
        // b^2 - 4ac = epsilon, up to rounding far below the threshold.
        let c = (b * b - epsilon) / (4.0 * a);
        prop_assume!((b * b - 4.0 * a * c).abs() < DEFAULT_THRESHOLD);
        let roots = solve_quadratic(a, b, c, DEFAULT_THRESHOLD);
        prop_assert_eq!(roots.len(), 2);
        prop_assert_eq!(roots[0], roots[1]);
        prop_assert!(roots.iter().all(is_real));
    }
}

// ── Cubic ────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn cubic_without_leading_term_matches_quadratic(
        b in -100.0..100.0f64,
        c in -100.0..100.0f64,
        d in -100.0..100.0f64,
    ) {
        prop_assert_eq!(
            bits(&solve_cubic(0.0, b, c, d, DEFAULT_THRESHOLD)),
            bits(&solve_quadratic(b, c, d, DEFAULT_THRESHOLD))
        );
    }

    #[test]
    fn cubic_is_deterministic(
        a in -100.0..100.0f64,
        b in -100.0..100.0f64,
        c in -100.0..100.0f64,
        d in -100.0..100.0f64,
    ) {
        prop_assert_eq!(
            bits(&solve_cubic(a, b, c, d, DEFAULT_THRESHOLD)),
            bits(&solve_cubic(a, b, c, d, DEFAULT_THRESHOLD))
        );
    }

    /// Three separated real roots come back real and in place.
    #[test]
    fn cubic_recovers_three_real_roots(
        r1 in -5.0..5.0f64,
        r2 in -5.0..5.0f64,
        r3 in -5.0..5.0f64,
    ) {
        prop_assume!((r1 - r2).abs() > 0.5 && (r2 - r3).abs() > 0.5 && (r1 - r3).abs() > 0.5);
        let p = Polynomial::from_roots(&[r1, r2, r3]).unwrap();
        let k = p.coefficients();
        let roots = solve_cubic(k[0], k[1], k[2], k[3], DEFAULT_THRESHOLD);
        prop_assert!(roots.iter().all(is_real));

        let mut expected = vec![r1, r2, r3];
        expected.sort_by(|a, b| a.partial_cmp(b).unwrap());
        for (found, e) in sorted_real_parts(&roots).iter().zip(expected.iter()) {
            prop_assert!((found - e).abs() < 1e-6, "expected {}, got {}", e, found);
        }
    }

    /// The closed form and the companion matrix agree on cubics with a conjugate pair.
    #[test]
    fn cubic_matches_companion_roots(
        r in -5.0..5.0f64,
        re in -5.0..5.0f64,
        im in 0.5..5.0f64,
    ) {
        let pair = Polynomial::new(vec![1.0, -2.0 * re, re * re + im * im]).unwrap();
        let p = &Polynomial::from_roots(&[r]).unwrap() * &pair;
        let k = p.coefficients();
        let closed = solve_cubic(k[0], k[1], k[2], k[3], DEFAULT_THRESHOLD);
        let eigen = companion_roots(&p, DEFAULT_THRESHOLD).unwrap();
        prop_assert_eq!(closed.iter().filter(|z| is_real(z)).count(), 1);
        for z in &closed {
            let nearest = eigen
                .iter()
                .map(|w| (w - z).norm())
                .fold(f64::INFINITY, f64::min);
            prop_assert!(nearest < 1e-6, "closed-form root {} has no companion match", z);
        }
    }
}

// ── Expressions ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn display_parses_back_to_the_same_polynomial(
        coefficients in prop::collection::vec(-100.0..100.0f64, 1..6),
    ) {
        let p = Polynomial::new(coefficients).unwrap();
        let parsed = parse_polynomial(&p.to_string(), "x", &[], &[]).unwrap();
        prop_assert_eq!(parsed, p);
    }
}
