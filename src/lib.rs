//! Crate root: public surface, core aliases, and protocol-wide invariants
//!
//! This crate implements three proof systems that share a scalar field and a
//! byte-serialization discipline:
//!
//! - **Shplonk** ([`shplonk`]): openings of several committed polynomials at
//!   several distinct points, batched into two quotient commitments and a
//!   single pairing check on top of KZG.
//! - **Radix-2 FRI** ([`fri`]): a Merkle-committed proof that an evaluation
//!   vector is close to a low-degree polynomial, made non-interactive with a
//!   salted Fiat–Shamir transcript.
//! - **Ring-SIS** ([`sis`]): a lattice-style algebraic hash in
//!   `ℤ_p[X]/(X^d+1)`, computed with coset FFTs.
//!
//! ## Invariants
//!
//! - **Field & curve.** The scalar field is `ark_bn254::Fr` (`F` below) and
//!   commitments live in `G1 = ark_bn254::G1Affine`. All byte encodings are
//!   Arkworks compressed canonical encodings; we **forbid unsafe** throughout
//!   the crate.
//!
//! - **Fiat–Shamir.** Challenges are derived with BLAKE3 over label-ordered,
//!   chained bindings (see [`transcript`]). The prover and verifier replay
//!   the exact same sequence of binds and challenge computations; any
//!   divergence shows up as a verification failure, never as UB.
//!
//! - **No global state.** Engines carry their configuration (domain, round
//!   counts) as fields, and proving/verifying keys are passed in by the
//!   caller. Proof objects are plain values with canonical serialization.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

/// Univariate polynomial kernel (Horner, scaling, vanishing products, exact division).
pub mod polynomial;
/// Fiat–Shamir transcript with ordered, chained challenge labels.
pub mod transcript;
/// BLAKE3 Merkle tree with raw-leaf proof sets.
pub mod merkle;
/// KZG commitment keys and commitment routine.
pub mod kzg;
/// Batched multi-point opening proofs on top of KZG.
pub mod shplonk;
/// Radix-2 FRI proofs of proximity and openings.
pub mod fri;
/// Ring-SIS hashing in `ℤ_p[X]/(X^d+1)`.
pub mod sis;

// ============================================================================
// Canonical aliases (centralization)
// ============================================================================

/// Scalar field used across the crate (BN254).
pub type F = ark_bn254::Fr;

/// G1 affine group element used for commitments.
pub type G1 = ark_bn254::G1Affine;

// ============================================================================
// Root-level re-exports
// ============================================================================

pub use crate::fri::RadixTwoFri;
pub use crate::kzg::{ProvingKey, VerifyingKey};
pub use crate::shplonk::{batch_open, batch_verify};
pub use crate::sis::RingSis;
