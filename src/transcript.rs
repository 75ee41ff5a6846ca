//! Fiat–Shamir transcript with ordered challenge labels
//!
//! A [`Transcript`] is constructed with the full, ordered list of challenge
//! labels a protocol will use. Each label owns a binding buffer; provers and
//! verifiers replay the exact same `bind` schedule and then compute the
//! challenges **in declaration order**.
//!
//! ### Discipline
//! - **Length-delimited binds.** Every bound item is absorbed with an
//!   explicit byte-length prefix, so concatenation cannot be ambiguous.
//! - **Chained challenges.** Computing a challenge hashes the previous
//!   label's challenge value first, so each challenge transitively commits
//!   to the whole schedule before it.
//! - **No rebinding.** Once a label's challenge has been computed, further
//!   binds to it are an error; computing a label before its predecessor is
//!   an error too. Recomputing a label returns the cached value.
//!
//! The hash is BLAKE3 with a stable domain-separation preamble; the derived
//! value is the raw 32-byte digest, which callers map into the scalar field
//! with [`Transcript::challenge_scalar`] or interpret as an integer seed.

#![forbid(unsafe_code)]

use ark_ff::PrimeField;
use blake3::Hasher;

use crate::F;

/// Transcript preamble, fixed for the lifetime of the proof format.
const DST: &[u8] = b"polycommit.transcript.v1";

/// Errors raised when the bind/challenge schedule is violated.
#[derive(Debug, thiserror::Error)]
pub enum TranscriptError {
    #[error("challenge \"{0}\" is not registered in this transcript")]
    UnknownLabel(String),
    #[error("challenge \"{0}\" has already been computed")]
    AlreadyComputed(String),
    #[error("the challenge preceding \"{0}\" has not been computed yet")]
    PreviousNotComputed(String),
}

/// Stateful Fiat–Shamir transcript over an ordered list of labels.
pub struct Transcript {
    labels: Vec<String>,
    bindings: Vec<Vec<u8>>,
    values: Vec<Option<[u8; 32]>>,
}

impl Transcript {
    /// Create a transcript whose challenges are the given labels, in order.
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        let n = labels.len();
        Self {
            labels,
            bindings: vec![Vec::new(); n],
            values: vec![None; n],
        }
    }

    fn position(&self, label: &str) -> Result<usize, TranscriptError> {
        self.labels
            .iter()
            .position(|l| l == label)
            .ok_or_else(|| TranscriptError::UnknownLabel(label.to_string()))
    }

    /// Append `data` to the binding buffer of `label` (length-delimited).
    pub fn bind(&mut self, label: &str, data: &[u8]) -> Result<(), TranscriptError> {
        let pos = self.position(label)?;
        if self.values[pos].is_some() {
            return Err(TranscriptError::AlreadyComputed(label.to_string()));
        }
        let buf = &mut self.bindings[pos];
        buf.extend_from_slice(&(data.len() as u64).to_be_bytes());
        buf.extend_from_slice(data);
        Ok(())
    }

    /// Finalize the challenge for `label` and return its 32 bytes.
    ///
    /// The first computation seals the label (no further binds); later calls
    /// return the cached value.
    pub fn challenge(&mut self, label: &str) -> Result<[u8; 32], TranscriptError> {
        let pos = self.position(label)?;
        if let Some(value) = self.values[pos] {
            return Ok(value);
        }
        if pos > 0 && self.values[pos - 1].is_none() {
            return Err(TranscriptError::PreviousNotComputed(label.to_string()));
        }

        let mut h = Hasher::new();
        h.update(DST);
        h.update(b":label:");
        h.update(label.as_bytes());
        if pos > 0 {
            h.update(b":prev:");
            h.update(&self.values[pos - 1].expect("previous challenge computed"));
        }
        h.update(b":data:");
        h.update(&self.bindings[pos]);

        let value = *h.finalize().as_bytes();
        self.values[pos] = Some(value);
        Ok(value)
    }

    /// Finalize the challenge for `label` and reduce it into the field.
    #[inline]
    pub fn challenge_scalar(&mut self, label: &str) -> Result<F, TranscriptError> {
        let bytes = self.challenge(label)?;
        Ok(F::from_le_bytes_mod_order(&bytes))
    }
}
