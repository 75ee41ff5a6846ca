//! KZG commitment keys and commitment routine
//!
//! The proving key is the G1 side of a structured reference string
//! (`[τ⁰·G₁, τ¹·G₁, …]`); the verifying key carries the G₁ generator and the
//! two G₂ elements `[G₂, τ·G₂]` together with their precomputed Miller lines,
//! so pairing checks downstream never re-prepare them.
//!
//! Key material is supplied by the caller; [`setup`] exists so tests can
//! derive a deterministic SRS from a seed. A τ produced this way is publicly
//! known; never use it outside tests or local tooling.

#![forbid(unsafe_code)]

use ark_bn254::{Bn254, G1Affine, G1Projective, G2Affine, G2Projective};
use ark_ec::{pairing::Pairing, CurveGroup, Group, VariableBaseMSM};
use ark_ff::{PrimeField, UniformRand};
use rand::Rng;

use crate::{F, G1};

/// Precomputed Miller lines for a fixed G₂ point.
pub type G2Prepared = <Bn254 as Pairing>::G2Prepared;

/// Errors raised by the commitment routine.
#[derive(Debug, thiserror::Error)]
pub enum KzgError {
    #[error("polynomial has {got} coefficients but the SRS only has {capacity} powers")]
    SrsTooShort { got: usize, capacity: usize },
}

/// G1 powers of τ.
#[derive(Clone, Debug)]
pub struct ProvingKey {
    /// `g1[i] = τⁱ·G₁`.
    pub g1: Vec<G1Affine>,
}

/// Verification side of the SRS.
#[derive(Clone, Debug)]
pub struct VerifyingKey {
    /// The G₁ generator (`τ⁰·G₁`).
    pub g1: G1Affine,
    /// `[G₂, τ·G₂]`.
    pub g2: [G2Affine; 2],
    lines: [G2Prepared; 2],
}

impl VerifyingKey {
    /// Build a verifying key, precomputing the Miller lines of both G₂ points.
    pub fn new(g1: G1Affine, g2: [G2Affine; 2]) -> Self {
        let lines = [G2Prepared::from(g2[0]), G2Prepared::from(g2[1])];
        Self { g1, g2, lines }
    }

    /// The precomputed Miller lines of `[G₂, τ·G₂]`.
    #[inline]
    pub fn lines(&self) -> &[G2Prepared; 2] {
        &self.lines
    }
}

/// Commit to `poly` (ascending coefficients) under the proving key.
pub fn commit(poly: &[F], pk: &ProvingKey) -> Result<G1, KzgError> {
    if poly.len() > pk.g1.len() {
        return Err(KzgError::SrsTooShort {
            got: poly.len(),
            capacity: pk.g1.len(),
        });
    }
    Ok(G1Projective::msm_unchecked(&pk.g1[..poly.len()], poly).into_affine())
}

/// Deterministic SRS for tests: samples τ from `rng` and expands
/// `max_degree + 1` G1 powers plus `[G₂, τ·G₂]`.
///
/// The trapdoor τ lives in this process's memory; the resulting keys are
/// **not** suitable for production use.
pub fn setup<R: Rng>(max_degree: usize, rng: &mut R) -> (ProvingKey, VerifyingKey) {
    let tau = F::rand(rng);
    let g1_gen = G1Projective::generator();
    let g2_gen = G2Projective::generator();

    let mut powers = Vec::with_capacity(max_degree + 1);
    let mut tau_i = F::from(1u64);
    for _ in 0..=max_degree {
        powers.push(g1_gen.mul_bigint(tau_i.into_bigint()));
        tau_i *= tau;
    }
    let g1 = G1Projective::normalize_batch(&powers);

    let tau_g2 = g2_gen.mul_bigint(tau.into_bigint()).into_affine();
    let vk = VerifyingKey::new(g1[0], [g2_gen.into_affine(), tau_g2]);
    (ProvingKey { g1 }, vk)
}
