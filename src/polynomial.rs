//! Univariate polynomial kernel
//!
//! Small, allocation-conscious routines over coefficient slices in
//! ascending-degree order (`f[i]` is the coefficient of `Xⁱ`). The effective
//! degree may be below `len − 1`; trailing zeros are allowed everywhere.
//!
//! Buffers are explicit: routines either work in place, consume their input,
//! or write into a caller-provided output vector. None of them allocate
//! behind the caller's back beyond growing those buffers.

#![forbid(unsafe_code)]

use ark_ff::{One, Zero};

use crate::F;

/// Evaluate `f` at `x` with Horner's rule, from the top coefficient down.
pub fn eval(f: &[F], x: F) -> F {
    let mut y = F::zero();
    for coeff in f.iter().rev() {
        y = y * x + coeff;
    }
    y
}

/// Multiply every coefficient of `f` by `gamma`, in place.
#[inline]
pub fn scale(f: &mut [F], gamma: F) {
    for coeff in f.iter_mut() {
        *coeff *= gamma;
    }
}

/// Replace `f` by `f·(X − a)`, growing the buffer by one coefficient.
///
/// The new top coefficient equals the old top, each middle coefficient
/// becomes `f[i−1] − a·f[i]` (on the old values), and the constant term
/// becomes `−a·f[0]`. `f` must be non-empty.
pub fn mul_by_linear_factor(f: &mut Vec<F>, a: F) {
    debug_assert!(!f.is_empty());
    let len = f.len();
    f.push(f[len - 1]);
    for i in (1..len).rev() {
        f[i] = f[i - 1] - a * f[i];
    }
    f[0] *= -a;
}

/// Build the vanishing polynomial `∏ᵢ (X − xᵢ)` of the given points.
///
/// The result is monic of length `points.len() + 1`. The points are expected
/// to be pairwise distinct; with repeated points the product simply has a
/// repeated root, which callers of the opening protocols must rule out
/// themselves.
pub fn vanishing(points: &[F]) -> Vec<F> {
    let mut res = Vec::with_capacity(points.len() + 1);
    res.push(F::one());
    for &x in points {
        mul_by_linear_factor(&mut res, x);
    }
    res
}

/// Schoolbook product of `f` and `g`, written into `buf`.
///
/// `buf` is cleared and resized to `len(f) + len(g) − 1`; it must not alias
/// either input (the borrow checker enforces this). The outer loop runs over
/// `g`, so pass the shorter factor as `g` when the sizes are lopsided.
pub fn mul<'a>(f: &[F], g: &[F], buf: &'a mut Vec<F>) -> &'a [F] {
    debug_assert!(!f.is_empty() && !g.is_empty());
    buf.clear();
    buf.resize(f.len() + g.len() - 1, F::zero());
    for (j, gj) in g.iter().enumerate() {
        if gj.is_zero() {
            continue;
        }
        for (i, fi) in f.iter().enumerate() {
            buf[i + j] += *fi * gj;
        }
    }
    buf
}

/// Exact division `f / g` for monic `g` dividing `f`.
///
/// Runs synthetic division in place on `f` and returns the quotient, which
/// occupies `f[len(g)−1..]` once the low part (the remainder slots) has been
/// drained. Consumes `f`; pass a copy if the dividend must be preserved.
///
/// When the precondition fails (non-monic `g`, or `g ∤ f`) the output is
/// garbage; this is an internal primitive, only called where divisibility
/// holds by construction.
pub fn div_exact(mut f: Vec<F>, g: &[F]) -> Vec<F> {
    let m = g.len();
    debug_assert!(m >= 1 && f.len() >= m);
    debug_assert!(g[m - 1].is_one());
    for i in (m - 1..f.len()).rev() {
        let c = f[i];
        if c.is_zero() {
            continue;
        }
        for j in 1..m {
            let t = c * g[m - 1 - j];
            f[i - j] -= t;
        }
    }
    f.drain(..m - 1);
    f
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ff::UniformRand;
    use rand::{rngs::StdRng, SeedableRng};

    fn rand_poly(len: usize, rng: &mut StdRng) -> Vec<F> {
        (0..len).map(|_| F::rand(rng)).collect()
    }

    #[test]
    fn horner_matches_naive_sum() {
        let mut rng = StdRng::from_seed([1u8; 32]);
        let f = rand_poly(9, &mut rng);
        let x = F::rand(&mut rng);
        let mut naive = F::zero();
        let mut xi = F::one();
        for &c in &f {
            naive += c * xi;
            xi *= x;
        }
        assert_eq!(eval(&f, x), naive);
    }

    #[test]
    fn linear_factor_has_the_root() {
        let mut rng = StdRng::from_seed([2u8; 32]);
        let mut f = rand_poly(6, &mut rng);
        let a = F::rand(&mut rng);
        let before = eval(&f, F::from(11u64));
        mul_by_linear_factor(&mut f, a);
        assert_eq!(f.len(), 7);
        assert_eq!(eval(&f, a), F::zero());
        // f(11) picked up exactly a factor (11 − a).
        assert_eq!(eval(&f, F::from(11u64)), before * (F::from(11u64) - a));
    }

    #[test]
    fn vanishing_is_monic_and_vanishes() {
        let points: Vec<F> = [3u64, 7, 12, 25].iter().map(|&x| F::from(x)).collect();
        let z = vanishing(&points);
        assert_eq!(z.len(), points.len() + 1);
        assert_eq!(z[points.len()], F::one());
        for &x in &points {
            assert_eq!(eval(&z, x), F::zero());
        }
        assert_ne!(eval(&z, F::from(4u64)), F::zero());
    }

    #[test]
    fn mul_then_div_roundtrips() {
        let mut rng = StdRng::from_seed([3u8; 32]);
        let q = rand_poly(12, &mut rng);
        let g = vanishing(&[F::from(5u64), F::from(6u64), F::from(8u64)]);
        let mut buf = Vec::new();
        let f = mul(&q, &g, &mut buf).to_vec();
        assert_eq!(f.len(), q.len() + g.len() - 1);
        let back = div_exact(f, &g);
        assert_eq!(back, q);
    }

    #[test]
    fn scale_multiplies_each_coefficient() {
        let mut f: Vec<F> = (1..=4u64).map(F::from).collect();
        scale(&mut f, F::from(3u64));
        let expect: Vec<F> = [3u64, 6, 9, 12].iter().map(|&x| F::from(x)).collect();
        assert_eq!(f, expect);
    }
}
