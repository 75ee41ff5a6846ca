//! Batched multi-point opening proofs (Shplonk)
//!
//! Opens `n` committed polynomials `fᵢ` at `n` pairwise-distinct points `xᵢ`
//! with a proof of two group elements, following Boneh–Drake–Fisch–Gabizon–
//! Williamson (ePrint 2020/081).
//!
//! The prover folds all openings into
//! `f̂(X) = Σᵢ γⁱ·Z_{T∖xᵢ}(X)·(fᵢ(X) − rᵢ)` with `rᵢ = fᵢ(xᵢ)` and commits to
//! `W = f̂ / Z_T`; a second challenge `z` then reduces everything to a single
//! polynomial `L` vanishing at `z`, committed as `W′ = L/(X−z)`. The verifier
//! rebuilds the scalar weights `γⁱ·Z_{T∖xᵢ}(z)` and checks one fixed-Q
//! pairing equation.
//!
//! Transcript schedule: label `"gamma"` binds the points, the digests and any
//! caller-supplied context bytes, in that order; label `"z"` binds the
//! commitment to `W` alone. The chained transcript makes `z` commit to the
//! whole `"gamma"` schedule as well.

#![forbid(unsafe_code)]

use ark_bn254::{Bn254, G1Projective};
use ark_ec::{pairing::Pairing, AffineRepr, CurveGroup, Group, VariableBaseMSM};
use ark_ff::{One, PrimeField, Zero};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use tracing::debug;

use crate::kzg::{self, KzgError, ProvingKey, VerifyingKey};
use crate::polynomial;
use crate::transcript::{Transcript, TranscriptError};
use crate::{F, G1};

/// Errors raised by the batched opening protocol.
#[derive(Debug, thiserror::Error)]
pub enum ShplonkError {
    #[error("number of polynomials, digests, claimed values and points must match")]
    InvalidNumberOfPoints,
    #[error("opening proof verification failed")]
    InvalidOpeningProof,
    #[error(transparent)]
    Transcript(#[from] TranscriptError),
    #[error(transparent)]
    Kzg(#[from] KzgError),
}

/// Batched opening proof: two quotient commitments and the claimed values
/// `fᵢ(xᵢ)`, in input order.
#[derive(Clone, Debug, PartialEq, Eq, CanonicalSerialize, CanonicalDeserialize)]
pub struct OpeningProof {
    /// Commitment to `f̂ / Z_T`.
    pub w: G1,
    /// Commitment to `L / (X − z)`.
    pub w_prime: G1,
    /// Claimed evaluations, one per (polynomial, point) pair.
    pub claimed_values: Vec<F>,
}

/// Bind points, digests and context bytes under `label` (in that order) and
/// derive the label's challenge as a field element.
fn derive_challenge(
    transcript: &mut Transcript,
    label: &str,
    points: &[F],
    digests: &[G1],
    extra_data: &[&[u8]],
) -> Result<F, TranscriptError> {
    let mut buf = Vec::with_capacity(48);
    for point in points {
        buf.clear();
        point.serialize_compressed(&mut buf).expect("serialize scalar");
        transcript.bind(label, &buf)?;
    }
    for digest in digests {
        buf.clear();
        digest.serialize_compressed(&mut buf).expect("serialize G1");
        transcript.bind(label, &buf)?;
    }
    for blob in extra_data {
        transcript.bind(label, blob)?;
    }
    transcript.challenge_scalar(label)
}

/// `Z_{T∖xᵢ}(z) = ∏_{j≠i} (z − xⱼ)`.
fn vanishing_without_at(points: &[F], i: usize, z: F) -> F {
    let mut acc = F::one();
    for (j, xj) in points.iter().enumerate() {
        if j != i {
            acc *= z - xj;
        }
    }
    acc
}

/// Open `polynomials[i]` at `points[i]` for all i, batched into one proof.
///
/// `digests` must be the KZG commitments of the polynomials (they are only
/// bound into the transcript here, not recomputed) and the points must be
/// pairwise distinct. `extra_data` is caller context mixed into the `"gamma"`
/// challenge; verifiers must supply the same bytes.
pub fn batch_open(
    polynomials: &[Vec<F>],
    digests: &[G1],
    points: &[F],
    pk: &ProvingKey,
    extra_data: &[&[u8]],
) -> Result<OpeningProof, ShplonkError> {
    let n = polynomials.len();
    if n == 0 || digests.len() != n || points.len() != n {
        return Err(ShplonkError::InvalidNumberOfPoints);
    }
    debug!(polynomials = n, "building batched opening proof");

    let mut transcript = Transcript::new(["gamma", "z"]);
    let gamma = derive_challenge(&mut transcript, "gamma", points, digests, extra_data)?;

    let claimed_values: Vec<F> = polynomials
        .iter()
        .zip(points)
        .map(|(f, &x)| polynomial::eval(f, x))
        .collect();

    let max_len = polynomials.iter().map(Vec::len).max().expect("n > 0");

    // f̂(X) = Σᵢ γⁱ·Z_{T∖xᵢ}(X)·(fᵢ(X) − rᵢ), accumulated summand by summand.
    let mut f_hat = vec![F::zero(); (max_len + n - 1).max(n + 1)];
    let mut scratch = Vec::new();
    let mut gamma_i = F::one();
    for i in 0..n {
        let others: Vec<F> = points[..i]
            .iter()
            .chain(&points[i + 1..])
            .copied()
            .collect();
        let z_without_i = polynomial::vanishing(&others);

        let mut shifted = polynomials[i].clone();
        shifted[0] -= claimed_values[i];
        polynomial::scale(&mut shifted, gamma_i);

        let summand = polynomial::mul(&shifted, &z_without_i, &mut scratch);
        for (acc, c) in f_hat.iter_mut().zip(summand) {
            *acc += c;
        }
        gamma_i *= gamma;
    }

    // Each summand is divisible by (X − xᵢ) through (fᵢ − rᵢ) and by the
    // remaining factors through Z_{T∖xᵢ}, so Z_T divides f̂ exactly.
    let z_t = polynomial::vanishing(points);
    let w_poly = polynomial::div_exact(f_hat, &z_t);
    let w = kzg::commit(&w_poly, pk)?;

    let mut buf = Vec::with_capacity(48);
    w.serialize_compressed(&mut buf).expect("serialize G1");
    transcript.bind("z", &buf)?;
    let z = transcript.challenge_scalar("z")?;

    // L(X) = Σᵢ γⁱ·Z_{T∖xᵢ}(z)·(fᵢ(X) − rᵢ) − Z_T(z)·W(X), zero at z.
    let mut l_poly = vec![F::zero(); max_len.max(w_poly.len()).max(2)];
    let mut gamma_i = F::one();
    for i in 0..n {
        let weight = gamma_i * vanishing_without_at(points, i, z);
        for (acc, c) in l_poly.iter_mut().zip(&polynomials[i]) {
            *acc += weight * c;
        }
        l_poly[0] -= weight * claimed_values[i];
        gamma_i *= gamma;
    }
    let zt_at_z = polynomial::eval(&z_t, z);
    for (acc, c) in l_poly.iter_mut().zip(&w_poly) {
        *acc -= zt_at_z * c;
    }

    let w_prime_poly = polynomial::div_exact(l_poly, &[-z, F::one()]);
    let w_prime = kzg::commit(&w_prime_poly, pk)?;

    Ok(OpeningProof {
        w,
        w_prime,
        claimed_values,
    })
}

/// Verify a batched opening proof against the digests and points.
pub fn batch_verify(
    proof: &OpeningProof,
    digests: &[G1],
    points: &[F],
    vk: &VerifyingKey,
    extra_data: &[&[u8]],
) -> Result<(), ShplonkError> {
    let n = digests.len();
    if n == 0 || points.len() != n || proof.claimed_values.len() != n {
        return Err(ShplonkError::InvalidNumberOfPoints);
    }
    debug!(digests = n, "verifying batched opening proof");

    let mut transcript = Transcript::new(["gamma", "z"]);
    let gamma = derive_challenge(&mut transcript, "gamma", points, digests, extra_data)?;
    let mut buf = Vec::with_capacity(48);
    proof.w.serialize_compressed(&mut buf).expect("serialize G1");
    transcript.bind("z", &buf)?;
    let z = transcript.challenge_scalar("z")?;

    let mut weights = Vec::with_capacity(n);
    let mut gamma_i = F::one();
    for i in 0..n {
        weights.push(gamma_i * vanishing_without_at(points, i, z));
        gamma_i *= gamma;
    }
    let mut zt_at_z = F::one();
    for xj in points {
        zt_at_z *= z - xj;
    }

    // F = Σᵢ wᵢ·Comᵢ − (Σᵢ wᵢ·rᵢ)·G₁ − Z_T(z)·W
    let mut weighted_values = F::zero();
    for (wi, ri) in weights.iter().zip(&proof.claimed_values) {
        weighted_values += *wi * ri;
    }
    let folded = G1Projective::msm_unchecked(digests, &weights)
        - vk.g1.into_group().mul_bigint(weighted_values.into_bigint())
        - proof.w.into_group().mul_bigint(zt_at_z.into_bigint());

    // e(−(F + z·W′), [1]₂) · e(W′, [τ]₂) == 1
    let p0 = -(folded + proof.w_prime.into_group().mul_bigint(z.into_bigint()));
    let mlo = Bn254::multi_miller_loop(
        [p0.into_affine(), proof.w_prime],
        [vk.lines()[0].clone(), vk.lines()[1].clone()],
    );
    match Bn254::final_exponentiation(mlo) {
        Some(out) if out.0.is_one() => Ok(()),
        _ => Err(ShplonkError::InvalidOpeningProof),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn keys(max_degree: usize) -> (ProvingKey, VerifyingKey) {
        let mut rng = StdRng::from_seed([42u8; 32]);
        kzg::setup(max_degree, &mut rng)
    }

    fn commit_all(polys: &[Vec<F>], pk: &ProvingKey) -> Vec<G1> {
        polys
            .iter()
            .map(|f| kzg::commit(f, pk).unwrap())
            .collect()
    }

    #[test]
    fn single_polynomial_roundtrip() {
        let (pk, vk) = keys(4);
        // f(X) = X² + 2X + 3, f(5) = 38.
        let polys = vec![vec![F::from(3u64), F::from(2u64), F::from(1u64)]];
        let points = vec![F::from(5u64)];
        let digests = commit_all(&polys, &pk);

        let proof = batch_open(&polys, &digests, &points, &pk, &[]).unwrap();
        assert_eq!(proof.claimed_values, vec![F::from(38u64)]);
        batch_verify(&proof, &digests, &points, &vk, &[]).unwrap();
    }

    #[test]
    fn two_polynomials_and_a_tampered_value() {
        let (pk, vk) = keys(4);
        // f₀(X) = X + 1, f₁(X) = X²; f₀(2) = 3, f₁(3) = 9.
        let polys = vec![
            vec![F::from(1u64), F::from(1u64)],
            vec![F::from(0u64), F::from(0u64), F::from(1u64)],
        ];
        let points = vec![F::from(2u64), F::from(3u64)];
        let digests = commit_all(&polys, &pk);

        let proof = batch_open(&polys, &digests, &points, &pk, &[]).unwrap();
        assert_eq!(proof.claimed_values, vec![F::from(3u64), F::from(9u64)]);
        batch_verify(&proof, &digests, &points, &vk, &[]).unwrap();

        let mut bad = proof.clone();
        bad.claimed_values[0] = F::from(4u64);
        assert!(matches!(
            batch_verify(&bad, &digests, &points, &vk, &[]),
            Err(ShplonkError::InvalidOpeningProof)
        ));
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let (pk, vk) = keys(4);
        let polys = vec![
            vec![F::from(1u64), F::from(1u64)],
            vec![F::from(2u64), F::from(5u64)],
        ];
        let points = vec![F::from(2u64), F::from(3u64)];
        let digests = commit_all(&polys, &pk);
        let proof = batch_open(&polys, &digests, &points, &pk, &[]).unwrap();

        let three_points = vec![F::from(2u64), F::from(3u64), F::from(4u64)];
        assert!(matches!(
            batch_verify(&proof, &digests, &three_points, &vk, &[]),
            Err(ShplonkError::InvalidNumberOfPoints)
        ));
    }

    #[test]
    fn tampered_group_elements_are_rejected() {
        let (pk, vk) = keys(4);
        let polys = vec![vec![F::from(3u64), F::from(2u64), F::from(1u64)]];
        let points = vec![F::from(5u64)];
        let digests = commit_all(&polys, &pk);
        let proof = batch_open(&polys, &digests, &points, &pk, &[]).unwrap();

        let mut bad = proof.clone();
        bad.w = vk.g1;
        assert!(batch_verify(&bad, &digests, &points, &vk, &[]).is_err());

        let mut bad = proof;
        bad.w_prime = vk.g1;
        assert!(batch_verify(&bad, &digests, &points, &vk, &[]).is_err());

        let wrong_digest = vec![pk.g1[1]];
        let good = batch_open(&polys, &digests, &points, &pk, &[]).unwrap();
        assert!(batch_verify(&good, &wrong_digest, &points, &vk, &[]).is_err());
    }

    #[test]
    fn verifier_context_must_match_prover_context() {
        let (pk, vk) = keys(4);
        let polys = vec![vec![F::from(3u64), F::from(2u64), F::from(1u64)]];
        let points = vec![F::from(5u64)];
        let digests = commit_all(&polys, &pk);

        let proof = batch_open(&polys, &digests, &points, &pk, &[b"context"]).unwrap();
        batch_verify(&proof, &digests, &points, &vk, &[b"context"]).unwrap();
        assert!(matches!(
            batch_verify(&proof, &digests, &points, &vk, &[]),
            Err(ShplonkError::InvalidOpeningProof)
        ));
    }
}
