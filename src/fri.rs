//! Radix-2 FRI proofs of proximity
//!
//! The prover evaluates a polynomial on a domain twice its (padded) size,
//! then repeatedly folds the evaluation vector in Lagrange basis under
//! transcript challenges, Merkle-committing every intermediate vector. A
//! query phase authenticates one evaluation per step together with its
//! sibling under `x → x²`, and the verifier replays the transcript, checks
//! every Merkle path and re-computes every fold.
//!
//! ## Vector layout
//!
//! All committed vectors are kept in **fiber order**: the two preimages of a
//! squared point sit side by side (`v[2i] = q(gⁱ)`, `v[2i+1] = q(−gⁱ)`), so a
//! single Merkle path plus a two-entry sibling proof authenticates a whole
//! fiber. Folding writes its output back in the fiber order of the squared
//! domain, which keeps the layout invariant across steps; the query position
//! walks down through [`convert_canonical_sorted`].
//!
//! ## Rounds
//!
//! The query phase is repeated [`RadixTwoFri::nb_rounds`] times for
//! soundness; each round salts the first transcript label with its index so
//! the rounds draw independent challenges.

#![forbid(unsafe_code)]

use ark_ff::{Field, One, Zero};
use ark_poly::{EvaluationDomain, Radix2EvaluationDomain};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use tracing::debug;

use crate::merkle::{self, MerkleTree};
use crate::transcript::{Transcript, TranscriptError};
use crate::F;

/// Blow-up factor: ratio of the evaluation domain to the padded polynomial
/// size. Also the length of the fully folded evaluation vector.
pub const RHO: usize = 2;

/// Default number of query rounds of a proof of proximity.
pub const DEFAULT_NB_ROUNDS: usize = 10;

/// Errors raised by the proximity protocol.
#[derive(Debug, thiserror::Error)]
pub enum FriError {
    #[error("proof shape does not match the engine parameters")]
    OddSize,
    #[error("the polynomial does not fit the power-of-two evaluation domain")]
    NotAPowerOfTwo,
    #[error("queried position is out of range")]
    RangePosition,
    #[error("merkle root of the opening does not match the proof of proximity")]
    MerkleRoot,
    #[error("merkle path verification failed")]
    MerklePath,
    #[error("a folded value disagrees with the next committed step")]
    ProximityTestFolding,
    #[error("the final evaluation vector is not constant")]
    LowDegree,
    #[error(transparent)]
    Transcript(#[from] TranscriptError),
}

/// A Merkle root together with a proof set (raw leaf first, then sibling
/// hashes) and the leaf count of the committed vector.
///
/// Sibling entries of a queried fiber are stored *partially*: only the raw
/// sibling leaf and the queried leaf's hash, the upper hashes being shared
/// with the full path.
#[derive(Clone, Debug, CanonicalSerialize, CanonicalDeserialize)]
pub struct PartialMerkleProof {
    pub merkle_root: Vec<u8>,
    pub proof_set: Vec<Vec<u8>>,
    pub nb_leaves: u64,
}

/// Standalone opening of one committed evaluation.
#[derive(Clone, Debug, CanonicalSerialize, CanonicalDeserialize)]
pub struct OpeningProof {
    /// Full Merkle path for the opened leaf.
    pub merkle_proof: PartialMerkleProof,
    /// Leaf index, in fiber-sorted order.
    pub index: u64,
    /// The opened evaluation.
    pub claimed_value: F,
}

/// One query round: per folding step, the pair of proofs covering a fiber
/// (slot 0 authenticates the even index, slot 1 the odd one), plus the fully
/// folded evaluation vector of length [`RHO`].
#[derive(Clone, Debug, CanonicalSerialize, CanonicalDeserialize)]
pub struct Round {
    pub interactions: Vec<[PartialMerkleProof; 2]>,
    pub evaluation: Vec<F>,
}

/// A complete proof of proximity: an instance tag and one [`Round`] per
/// repetition.
#[derive(Clone, Debug, CanonicalSerialize, CanonicalDeserialize)]
pub struct ProofOfProximity {
    pub id: Vec<u8>,
    pub rounds: Vec<Round>,
}

/// Map a canonical (natural-order) index to its slot in fiber order.
#[inline]
pub fn convert_canonical_sorted(i: usize, n: usize) -> usize {
    if i < n / 2 {
        2 * i
    } else {
        n - 1 - 2 * (n - 1 - i)
    }
}

/// Inverse of [`convert_canonical_sorted`].
#[inline]
pub fn convert_sorted_canonical(i: usize, n: usize) -> usize {
    if i % 2 == 0 {
        i / 2
    } else {
        n - 1 - (n - 1 - i) / 2
    }
}

/// Reorder natural-order evaluations `[q(g⁰), …, q(g^{n−1})]` so that the two
/// preimages of each squared point are adjacent.
fn sort_evaluations(evals: &[F]) -> Vec<F> {
    let half = evals.len() / 2;
    let mut out = vec![F::zero(); evals.len()];
    for i in 0..half {
        out[2 * i] = evals[i];
        out[2 * i + 1] = evals[i + half];
    }
    out
}

/// Fold a fiber-ordered vector under the challenge `x`.
///
/// Writing `q(X) = q₀(X²) + X·q₁(X²)`, each fiber `(q(gⁱ), q(−gⁱ))` yields
/// `q₀ + x·q₁` at the squared point; the result is written in the fiber
/// order of the squared domain. `g_inv` is the inverse generator of the
/// vector's own domain.
fn fold_in_lagrange_basis(sorted: &[F], g_inv: F, x: F, two_inv: F) -> Vec<F> {
    let half = sorted.len() / 2;
    let mut out = vec![F::zero(); half];
    let mut acc = F::one();
    for i in 0..half {
        let even = sorted[2 * i] + sorted[2 * i + 1];
        let odd = (sorted[2 * i] - sorted[2 * i + 1]) * acc;
        out[convert_canonical_sorted(i, half)] = (even + x * odd) * two_inv;
        acc *= g_inv;
    }
    out
}

fn marshal(x: &F) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(32);
    x.serialize_compressed(&mut bytes).expect("serialize scalar");
    bytes
}

fn unmarshal(bytes: &[u8]) -> Result<F, FriError> {
    F::deserialize_compressed(bytes).map_err(|_| FriError::MerklePath)
}

/// Radix-2 FRI engine over a fixed evaluation domain.
pub struct RadixTwoFri {
    domain: Radix2EvaluationDomain<F>,
    nb_steps: usize,
    nb_rounds: usize,
    two_inv: F,
}

impl RadixTwoFri {
    /// Engine for polynomials of up to `size` coefficients, with `nb_rounds`
    /// query repetitions. The domain cardinality is
    /// `RHO · next_power_of_two(size)`.
    pub fn new(size: usize, nb_rounds: usize) -> Self {
        assert!(size >= 2, "polynomial size must be at least 2");
        assert!(nb_rounds >= 1, "at least one query round is required");
        let padded = size.next_power_of_two();
        let domain =
            Radix2EvaluationDomain::new(RHO * padded).expect("radix-2 domain of that size");
        Self {
            domain,
            nb_steps: padded.trailing_zeros() as usize,
            nb_rounds,
            two_inv: F::from(2u64).inverse().expect("odd characteristic"),
        }
    }

    /// Engine with the default number of query rounds.
    pub fn with_default_rounds(size: usize) -> Self {
        Self::new(size, DEFAULT_NB_ROUNDS)
    }

    /// Number of folding steps per round.
    #[inline]
    pub fn nb_steps(&self) -> usize {
        self.nb_steps
    }

    /// Number of query rounds.
    #[inline]
    pub fn nb_rounds(&self) -> usize {
        self.nb_rounds
    }

    fn id(&self) -> Vec<u8> {
        format!("fri-radix2-{}-{}", self.domain.size(), self.nb_rounds).into_bytes()
    }

    fn round_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = (0..self.nb_steps).map(|i| format!("x{i}")).collect();
        labels.push("s0".to_string());
        labels
    }

    /// Walk the query position through the folding steps: each step halves
    /// the domain and re-expresses the fiber index in the next vector's
    /// fiber order.
    fn derive_queries_positions(&self, pos: usize, size: usize) -> Vec<usize> {
        let mut res = Vec::with_capacity(self.nb_steps);
        res.push(pos);
        let mut s = size / 2;
        for i in 1..self.nb_steps {
            let prev = res[i - 1];
            res.push(convert_canonical_sorted((prev - prev % 2) / 2, s));
            s /= 2;
        }
        res
    }

    fn bind_salt(&self, transcript: &mut Transcript, salt: u64) -> Result<(), TranscriptError> {
        transcript.bind("x0", &marshal(&F::from(salt)))
    }

    /// The query seed modulo the domain cardinality. The cardinality is a
    /// power of two, so the low 64 bits of the seed determine the residue.
    fn position_from_seed(&self, seed: [u8; 32]) -> usize {
        let low = u64::from_le_bytes(seed[..8].try_into().expect("8 bytes"));
        (low % self.domain.size() as u64) as usize
    }

    fn build_round(&self, p: &[F], salt: u64) -> Result<Round, FriError> {
        let mut transcript = Transcript::new(self.round_labels());
        self.bind_salt(&mut transcript, salt)?;

        // Commit phase: evaluate on the blown-up domain, then fold step by
        // step, committing every intermediate vector.
        let mut v = sort_evaluations(&self.domain.fft(p));
        let mut layers: Vec<Vec<F>> = Vec::with_capacity(self.nb_steps);
        let mut trees: Vec<MerkleTree> = Vec::with_capacity(self.nb_steps);
        let mut g_inv = self.domain.group_gen_inv;

        for i in 0..self.nb_steps {
            let label = format!("x{i}");
            let tree = MerkleTree::new(v.iter().map(marshal).collect());
            transcript.bind(&label, &tree.root())?;
            let x = transcript.challenge_scalar(&label)?;

            let folded = fold_in_lagrange_basis(&v, g_inv, x, self.two_inv);
            layers.push(v);
            trees.push(tree);
            v = folded;
            g_inv.square_in_place();
        }
        let evaluation = v;

        // Query phase: derive the position walk from the folded vector.
        for value in &evaluation {
            transcript.bind("s0", &marshal(value))?;
        }
        let seed = transcript.challenge("s0")?;
        let positions =
            self.derive_queries_positions(self.position_from_seed(seed), self.domain.size());

        let mut interactions = Vec::with_capacity(self.nb_steps);
        for (i, (tree, layer)) in trees.iter().zip(&layers).enumerate() {
            let pos = positions[i];
            let parity = pos % 2;
            let sibling_pos = pos + 1 - 2 * parity;

            let full = PartialMerkleProof {
                merkle_root: tree.root().to_vec(),
                proof_set: tree.prove(pos),
                nb_leaves: tree.nb_leaves() as u64,
            };
            // The sibling path shares every hash above the leaf level, so it
            // is carried as just (raw sibling leaf, queried leaf hash).
            let partial = PartialMerkleProof {
                merkle_root: tree.root().to_vec(),
                proof_set: vec![marshal(&layer[sibling_pos]), tree.leaf_hash(pos).to_vec()],
                nb_leaves: tree.nb_leaves() as u64,
            };
            interactions.push(if parity == 0 {
                [full, partial]
            } else {
                [partial, full]
            });
        }

        Ok(Round {
            interactions,
            evaluation,
        })
    }

    /// Build a proof that `p` (ascending coefficients, at most the engine's
    /// size) is a polynomial of low degree.
    pub fn build_proof_of_proximity(&self, p: &[F]) -> Result<ProofOfProximity, FriError> {
        if p.len() * RHO > self.domain.size() {
            return Err(FriError::NotAPowerOfTwo);
        }
        debug!(
            rounds = self.nb_rounds,
            steps = self.nb_steps,
            "building proof of proximity"
        );
        let mut rounds = Vec::with_capacity(self.nb_rounds);
        for salt in 0..self.nb_rounds as u64 {
            rounds.push(self.build_round(p, salt)?);
        }
        Ok(ProofOfProximity {
            id: self.id(),
            rounds,
        })
    }

    fn verify_round(&self, round: &Round, salt: u64) -> Result<(), FriError> {
        if round.interactions.len() != self.nb_steps || round.evaluation.len() != RHO {
            return Err(FriError::OddSize);
        }
        for pair in &round.interactions {
            if pair[0].proof_set.len() < 2 || pair[1].proof_set.len() < 2 {
                return Err(FriError::MerklePath);
            }
        }

        // Replay the transcript against the committed roots.
        let mut transcript = Transcript::new(self.round_labels());
        self.bind_salt(&mut transcript, salt)?;
        let mut challenges = Vec::with_capacity(self.nb_steps);
        for (i, pair) in round.interactions.iter().enumerate() {
            let label = format!("x{i}");
            transcript.bind(&label, &pair[0].merkle_root)?;
            challenges.push(transcript.challenge_scalar(&label)?);
        }
        for value in &round.evaluation {
            transcript.bind("s0", &marshal(value))?;
        }
        let seed = transcript.challenge("s0")?;
        let positions =
            self.derive_queries_positions(self.position_from_seed(seed), self.domain.size());

        let mut acc_g_inv = self.domain.group_gen_inv;
        for i in 0..self.nb_steps {
            let pos = positions[i];
            let parity = pos % 2;
            let full = &round.interactions[i][parity];
            let partial = &round.interactions[i][1 - parity];
            let expected_leaves = (self.domain.size() >> i) as u64;
            if full.nb_leaves != expected_leaves || partial.nb_leaves != expected_leaves {
                return Err(FriError::MerklePath);
            }

            if !merkle::verify_proof(&full.merkle_root, &full.proof_set, pos as u64, full.nb_leaves)
            {
                return Err(FriError::MerklePath);
            }
            // Rebuild the sibling's proof set: its own raw leaf and the
            // queried leaf's hash, then the shared upper hashes.
            let mut sibling_set = Vec::with_capacity(full.proof_set.len());
            sibling_set.push(partial.proof_set[0].clone());
            sibling_set.push(partial.proof_set[1].clone());
            sibling_set.extend_from_slice(&full.proof_set[2..]);
            let sibling_pos = (pos + 1 - 2 * parity) as u64;
            if !merkle::verify_proof(
                &partial.merkle_root,
                &sibling_set,
                sibling_pos,
                partial.nb_leaves,
            ) {
                return Err(FriError::MerklePath);
            }

            // Fold the authenticated fiber and compare with the next step.
            // Slot 0 always carries the even-index leaf, slot 1 the odd one.
            let left = unmarshal(&round.interactions[i][0].proof_set[0])?;
            let right = unmarshal(&round.interactions[i][1].proof_set[0])?;
            let fiber = pos / 2;
            let even = left + right;
            let odd = (left - right) * acc_g_inv.pow([fiber as u64]);
            let predicted = (odd * challenges[i] + even) * self.two_inv;

            let next_value = if i + 1 < self.nb_steps {
                let next_pos = positions[i + 1];
                unmarshal(&round.interactions[i + 1][next_pos % 2].proof_set[0])?
            } else {
                round.evaluation[convert_canonical_sorted(fiber, RHO)]
            };
            if predicted != next_value {
                return Err(FriError::ProximityTestFolding);
            }
            acc_g_inv.square_in_place();
        }

        if round.evaluation.iter().any(|e| *e != round.evaluation[0]) {
            return Err(FriError::LowDegree);
        }
        Ok(())
    }

    /// Verify a proof of proximity built with the same engine parameters.
    pub fn verify_proof_of_proximity(&self, proof: &ProofOfProximity) -> Result<(), FriError> {
        if proof.rounds.len() != self.nb_rounds {
            return Err(FriError::OddSize);
        }
        debug!(rounds = self.nb_rounds, "verifying proof of proximity");
        for (salt, round) in proof.rounds.iter().enumerate() {
            self.verify_round(round, salt as u64)?;
        }
        Ok(())
    }

    /// Open the evaluation of `p` at the canonical `position` of the domain.
    pub fn open(&self, p: &[F], position: u64) -> Result<OpeningProof, FriError> {
        if position >= self.domain.size() as u64 {
            return Err(FriError::RangePosition);
        }
        if p.len() * RHO > self.domain.size() {
            return Err(FriError::NotAPowerOfTwo);
        }
        let evals = sort_evaluations(&self.domain.fft(p));
        let tree = MerkleTree::new(evals.iter().map(marshal).collect());
        let sorted_pos = convert_canonical_sorted(position as usize, self.domain.size());
        Ok(OpeningProof {
            merkle_proof: PartialMerkleProof {
                merkle_root: tree.root().to_vec(),
                proof_set: tree.prove(sorted_pos),
                nb_leaves: tree.nb_leaves() as u64,
            },
            index: sorted_pos as u64,
            claimed_value: evals[sorted_pos],
        })
    }

    /// Verify an opening against the vector committed at the first step of a
    /// proof of proximity.
    pub fn verify_opening(
        &self,
        opening: &OpeningProof,
        proof: &ProofOfProximity,
    ) -> Result<(), FriError> {
        let round = proof.rounds.first().ok_or(FriError::OddSize)?;
        let pair = round.interactions.first().ok_or(FriError::OddSize)?;
        // The partial side always has exactly two entries; the longer proof
        // set is the full path and carries the authoritative root.
        let full_side = usize::from(pair[1].proof_set.len() > pair[0].proof_set.len());
        if opening.merkle_proof.merkle_root != pair[full_side].merkle_root {
            return Err(FriError::MerkleRoot);
        }

        let leaf = opening
            .merkle_proof
            .proof_set
            .first()
            .ok_or(FriError::MerklePath)?;
        if *leaf != marshal(&opening.claimed_value) {
            return Err(FriError::MerklePath);
        }
        if !merkle::verify_proof(
            &opening.merkle_proof.merkle_root,
            &opening.merkle_proof.proof_set,
            opening.index,
            opening.merkle_proof.nb_leaves,
        ) {
            return Err(FriError::MerklePath);
        }
        Ok(())
    }
}
