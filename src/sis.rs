//! Ring-SIS hashing in `ℤ_p[X]/(X^d+1)`
//!
//! A [`RingSis`] instance holds a public random matrix `A` of `key_size`
//! polynomials of degree `d` (a power of two), expanded deterministically
//! from a seed. Hashing interprets the written bytes as a stream of
//! `log_two_bound`-bit big-endian coefficients, packs them into degree-`d`
//! chunks `mᵢ`, and outputs `Σᵢ Aᵢ·mᵢ mod (X^d+1)`.
//!
//! The ring multiplications run as pointwise products on the coset `ψ·⟨ψ²⟩`
//! with ψ a primitive 2d-th root of unity: the coset points are exactly the
//! roots of `X^d+1`, so interpolating the pointwise products *is* the
//! reduction. `A`'s coset evaluations are precomputed once; the matrix is
//! immutable and can be shared, while each hasher carries its own byte
//! buffer.
//!
//! Degree 2 falls back to schoolbook multiplication with `X² ≡ −1`; degree 1
//! is rejected at construction.

#![forbid(unsafe_code)]

use std::io;

use ark_ff::{FftField, Field, One, UniformRand, Zero};
use ark_poly::{EvaluationDomain, Radix2EvaluationDomain};
use ark_serialize::CanonicalSerialize;
use rand::{rngs::StdRng, SeedableRng};

use crate::F;

/// Errors raised when constructing a hasher.
#[derive(Debug, thiserror::Error)]
pub enum SisError {
    #[error("the ring degree must be a power of two larger than one")]
    NotAPowerOfTwo,
    #[error("the coefficient bound must lie in 1..=64 and key_size·degree·bound must be byte-aligned")]
    InvalidBound,
    #[error("the key must contain at least one polynomial")]
    EmptyKey,
}

/// Reads `width`-bit big-endian values from a byte stream, padding the tail
/// with zero bits.
struct BitReader<'a> {
    bytes: &'a [u8],
    bit: usize,
    width: usize,
}

impl<'a> BitReader<'a> {
    fn new(bytes: &'a [u8], width: usize) -> Self {
        Self { bytes, bit: 0, width }
    }

    fn next_coeff(&mut self) -> Option<u64> {
        let total = self.bytes.len() * 8;
        if self.bit >= total {
            return None;
        }
        let mut v = 0u64;
        for _ in 0..self.width {
            v <<= 1;
            if self.bit < total {
                let byte = self.bytes[self.bit / 8];
                v |= u64::from((byte >> (7 - self.bit % 8)) & 1);
            }
            self.bit += 1;
        }
        Some(v)
    }
}

/// Buffered Ring-SIS hasher over a fixed public matrix.
pub struct RingSis {
    /// The public matrix, `key_size` polynomials of `degree` coefficients.
    a: Vec<Vec<F>>,
    /// `A` evaluated on the 2d-th-root coset, ready for pointwise products.
    a_fft_coset: Vec<Vec<F>>,
    log_two_bound: usize,
    degree: usize,
    key_size: usize,
    nb_bytes_to_sum: usize,
    domain: Radix2EvaluationDomain<F>,
    /// Powers of the coset shift ψ (and their inverses): multiplying the
    /// coefficients through before the FFT moves the evaluation points from
    /// `⟨ψ²⟩` to `ψ·⟨ψ²⟩`, the roots of `X^d+1`.
    shift_powers: Vec<F>,
    shift_inv_powers: Vec<F>,
    buffer: Vec<u8>,
}

impl RingSis {
    /// Build a hasher with matrix `A` expanded from `seed`.
    ///
    /// `log_two_degree` fixes `d = 2^log_two_degree` (must be ≥ 1, i.e.
    /// degree at least 2), `log_two_bound` the bit width of each input
    /// coefficient (1..=64, with `key_size·d·bound` a whole number of
    /// bytes).
    pub fn new(
        seed: u64,
        log_two_degree: usize,
        log_two_bound: usize,
        key_size: usize,
    ) -> Result<Self, SisError> {
        if log_two_degree == 0 {
            return Err(SisError::NotAPowerOfTwo);
        }
        if log_two_bound == 0 || log_two_bound > 64 {
            return Err(SisError::InvalidBound);
        }
        if key_size == 0 {
            return Err(SisError::EmptyKey);
        }
        let degree = 1usize << log_two_degree;
        if (key_size * degree * log_two_bound) % 8 != 0 {
            return Err(SisError::InvalidBound);
        }

        let domain = Radix2EvaluationDomain::<F>::new(degree).expect("radix-2 domain");
        let shift = F::get_root_of_unity(2 * degree as u64).expect("2d-th root of unity");
        let shift_inv = shift.inverse().expect("root of unity is invertible");
        let mut shift_powers = Vec::with_capacity(degree);
        let mut shift_inv_powers = Vec::with_capacity(degree);
        let (mut sp, mut si) = (F::one(), F::one());
        for _ in 0..degree {
            shift_powers.push(sp);
            shift_inv_powers.push(si);
            sp *= shift;
            si *= shift_inv;
        }

        let mut seed_bytes = [0u8; 32];
        seed_bytes[..8].copy_from_slice(&seed.to_le_bytes());
        let mut rng = StdRng::from_seed(seed_bytes);
        let a: Vec<Vec<F>> = (0..key_size)
            .map(|_| (0..degree).map(|_| F::rand(&mut rng)).collect())
            .collect();

        let a_fft_coset: Vec<Vec<F>> = a
            .iter()
            .map(|poly| {
                let shifted: Vec<F> = poly
                    .iter()
                    .zip(&shift_powers)
                    .map(|(c, s)| *c * s)
                    .collect();
                domain.fft(&shifted)
            })
            .collect();

        Ok(Self {
            a,
            a_fft_coset,
            log_two_bound,
            degree,
            key_size,
            nb_bytes_to_sum: key_size * degree * log_two_bound / 8,
            domain,
            shift_powers,
            shift_inv_powers,
            buffer: Vec::new(),
        })
    }

    /// Evaluate `poly` on the coset `ψ·⟨ψ²⟩` by scaling the coefficients
    /// through the shift powers before a plain radix-2 FFT.
    fn coset_fft(&self, poly: &[F]) -> Vec<F> {
        let shifted: Vec<F> = poly
            .iter()
            .zip(&self.shift_powers)
            .map(|(c, s)| *c * s)
            .collect();
        self.domain.fft(&shifted)
    }

    /// Interpolate coset evaluations back to coefficients.
    fn coset_ifft(&self, evals: &[F]) -> Vec<F> {
        let mut coeffs = self.domain.ifft(evals);
        for (c, s) in coeffs.iter_mut().zip(&self.shift_inv_powers) {
            *c *= s;
        }
        coeffs
    }

    /// Digest length in bytes: `d` serialized field elements.
    #[inline]
    pub fn size(&self) -> usize {
        self.degree * 32
    }

    /// This hash has no internal block structure.
    #[inline]
    pub fn block_size(&self) -> usize {
        0
    }

    /// Number of buffered bytes that fills the key exactly once.
    #[inline]
    pub fn nb_bytes_to_sum(&self) -> usize {
        self.nb_bytes_to_sum
    }

    /// Clear the buffered input.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Decompose the buffer into degree-`d` coefficient chunks, together
    /// with a mask of the chunks containing a non-zero coefficient.
    fn decompose(&self) -> (Vec<Vec<F>>, Vec<bool>) {
        let mut reader = BitReader::new(&self.buffer, self.log_two_bound);
        let mut chunks = Vec::new();
        let mut nonzero = Vec::new();
        loop {
            let mut chunk = vec![F::zero(); self.degree];
            let mut any = false;
            let mut got = false;
            for slot in chunk.iter_mut() {
                if let Some(v) = reader.next_coeff() {
                    got = true;
                    if v != 0 {
                        any = true;
                        *slot = F::from(v);
                    }
                }
            }
            if !got {
                break;
            }
            chunks.push(chunk);
            nonzero.push(any);
        }
        (chunks, nonzero)
    }

    /// Hash the buffered bytes: `Σⱼ A_{j mod key_size}·mⱼ mod (X^d+1)`,
    /// serialized coefficient by coefficient. The buffer is left untouched.
    pub fn sum(&self) -> Vec<u8> {
        let (chunks, nonzero) = self.decompose();
        let mut acc = vec![F::zero(); self.degree];

        for (j, chunk) in chunks.iter().enumerate() {
            if !nonzero[j] {
                continue;
            }
            let a_idx = j % self.key_size;
            if self.degree == 2 {
                let a = &self.a[a_idx];
                acc[0] += chunk[0] * a[0] - chunk[1] * a[1];
                acc[1] += chunk[0] * a[1] + chunk[1] * a[0];
            } else {
                let chunk_fft = self.coset_fft(chunk);
                for (slot, (m, ak)) in acc
                    .iter_mut()
                    .zip(chunk_fft.iter().zip(&self.a_fft_coset[a_idx]))
                {
                    *slot += *m * ak;
                }
            }
        }

        let coeffs = if self.degree == 2 {
            acc
        } else {
            self.coset_ifft(&acc)
        };
        let mut out = Vec::with_capacity(self.size());
        for c in &coeffs {
            c.serialize_compressed(&mut out).expect("serialize scalar");
        }
        out
    }
}

impl io::Write for RingSis {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_serialize::CanonicalDeserialize;
    use std::io::Write;

    fn digest_coeffs(bytes: &[u8]) -> Vec<F> {
        bytes
            .chunks(32)
            .map(|c| F::deserialize_compressed(c).unwrap())
            .collect()
    }

    #[test]
    fn degree_one_and_bad_bounds_are_rejected() {
        assert!(matches!(
            RingSis::new(0, 0, 8, 4),
            Err(SisError::NotAPowerOfTwo)
        ));
        assert!(matches!(
            RingSis::new(0, 3, 0, 4),
            Err(SisError::InvalidBound)
        ));
        assert!(matches!(
            RingSis::new(0, 3, 65, 4),
            Err(SisError::InvalidBound)
        ));
        assert!(matches!(RingSis::new(0, 3, 8, 0), Err(SisError::EmptyKey)));
    }

    #[test]
    fn zero_input_hashes_to_the_zero_polynomial() {
        let mut hasher = RingSis::new(0, 5, 8, 4).unwrap();
        assert_eq!(hasher.nb_bytes_to_sum(), 4 * 32 * 8 / 8);
        hasher.write_all(&[0u8; 512]).unwrap();
        let digest = hasher.sum();
        assert_eq!(digest.len(), hasher.size());
        let mut zero = Vec::new();
        for _ in 0..32 {
            F::zero().serialize_compressed(&mut zero).unwrap();
        }
        assert_eq!(digest, zero);
    }

    #[test]
    fn same_seed_same_input_same_digest() {
        let input = b"ring-sis determinism probe";
        let mut h1 = RingSis::new(7, 4, 8, 2).unwrap();
        h1.write_all(input).unwrap();
        let mut h2 = RingSis::new(7, 4, 8, 2).unwrap();
        h2.write_all(input).unwrap();
        assert_eq!(h1.sum(), h2.sum());

        let mut h3 = RingSis::new(8, 4, 8, 2).unwrap();
        h3.write_all(input).unwrap();
        assert_ne!(h1.sum(), h3.sum());
    }

    #[test]
    fn reset_clears_the_session() {
        let mut hasher = RingSis::new(3, 3, 8, 2).unwrap();
        hasher.write_all(b"first session").unwrap();
        let first = hasher.sum();
        hasher.reset();
        hasher.write_all(b"first session").unwrap();
        assert_eq!(hasher.sum(), first);
    }

    #[test]
    fn digest_length_does_not_depend_on_input_length() {
        let mut hasher = RingSis::new(1, 3, 8, 2).unwrap();
        assert_eq!(hasher.sum().len(), hasher.size());
        hasher.write_all(&[1u8; 3]).unwrap();
        assert_eq!(hasher.sum().len(), hasher.size());
        hasher.write_all(&[2u8; 200]).unwrap();
        assert_eq!(hasher.sum().len(), hasher.size());
    }

    #[test]
    fn hash_is_linear_when_coefficients_add_without_carry() {
        let ma: Vec<u8> = (1..=16u8).collect();
        let mb: Vec<u8> = (1..=16u8).map(|x| x * 10).collect();
        let msum: Vec<u8> = ma.iter().zip(&mb).map(|(x, y)| x + y).collect();

        let mut ha = RingSis::new(5, 2, 8, 4).unwrap();
        ha.write_all(&ma).unwrap();
        let mut hb = RingSis::new(5, 2, 8, 4).unwrap();
        hb.write_all(&mb).unwrap();
        let mut hs = RingSis::new(5, 2, 8, 4).unwrap();
        hs.write_all(&msum).unwrap();

        let da = digest_coeffs(&ha.sum());
        let db = digest_coeffs(&hb.sum());
        let ds = digest_coeffs(&hs.sum());
        let added: Vec<F> = da.iter().zip(&db).map(|(x, y)| *x + y).collect();
        assert_eq!(ds, added);
    }

    #[test]
    fn coset_product_matches_schoolbook_reduction() {
        // One non-zero chunk of degree 4: the digest must equal m·A₀ reduced
        // modulo X⁴+1, computed naively from the public matrix.
        let mut hasher = RingSis::new(11, 2, 8, 3).unwrap();
        let input = [5u8, 9, 2, 13];
        hasher.write_all(&input).unwrap();
        let digest = digest_coeffs(&hasher.sum());

        let m: Vec<F> = input.iter().map(|&b| F::from(u64::from(b))).collect();
        let a0 = &hasher.a[0];
        let d = 4usize;
        let mut expect = vec![F::zero(); d];
        for i in 0..d {
            for j in 0..d {
                let prod = m[i] * a0[j];
                if i + j < d {
                    expect[i + j] += prod;
                } else {
                    expect[i + j - d] -= prod;
                }
            }
        }
        assert_eq!(digest, expect);
    }

    #[test]
    fn degree_two_uses_the_explicit_reduction() {
        let mut hasher = RingSis::new(13, 1, 8, 4).unwrap();
        let input = [3u8, 250];
        hasher.write_all(&input).unwrap();
        let digest = digest_coeffs(&hasher.sum());

        let (c0, c1) = (F::from(3u64), F::from(250u64));
        let a0 = &hasher.a[0];
        assert_eq!(digest[0], c0 * a0[0] - c1 * a0[1]);
        assert_eq!(digest[1], c0 * a0[1] + c1 * a0[0]);
    }
}
