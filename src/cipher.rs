//! BFV encryption context and the fixed-point codec feeding it.
//!
//! The context bundles scheme parameters with the secret, public, and
//! relinearization keys. The rest of the crate treats it as a capability
//! token: encrypt vectors, combine ciphertexts, decrypt at the boundary.
//!
//! # Vector encoding
//!
//! Updates are quantized to integers under one shared scale and packed into
//! the coefficients of BFV plaintexts (`poly` encoding), split into chunks
//! of at most `degree` coefficients. Every update is encrypted twice: in
//! forward coefficient order and in reversed order. With negacyclic
//! polynomial multiplication, coefficient `L-1` of `fwd(u) * rev(v)` equals
//! the inner product `<u, v>`, so one ciphertext-ciphertext multiplication
//! yields an inner product, and
//! `||u - v||^2 = coeff_{L-1}((fwd(u)-fwd(v)) * (rev(u)-rev(v)))`.
//!
//! The shared scale is chosen per dimension so the accumulated inner
//! product of difference vectors can never wrap the plaintext modulus:
//! `d * (2 * scale * clip)^2` must stay below `t / 2`.
//!
//! The parameter profile is demo-grade: it demonstrates the computation
//! structure, it is not a vetted production parameter set.

use std::sync::Arc;

use fhe::bfv::{
    BfvParameters, BfvParametersBuilder, Ciphertext, Encoding, Multiplicator, Plaintext,
    PublicKey, RelinearizationKey, SecretKey,
};
use fhe_traits::{FheDecoder, FheDecrypter, FheEncoder, FheEncrypter};
use rand_fhe::rng as thread_rng;

use crate::error::FlError;

/// Scheme parameter profile.
#[derive(Clone, Debug)]
pub struct CipherConfig {
    /// Ring degree (power of two); also the coefficient capacity per chunk.
    pub degree: usize,
    /// Bit sizes of the ciphertext moduli.
    pub moduli_sizes: Vec<usize>,
    /// Plaintext modulus `t`.
    pub plaintext_modulus: u64,
    /// Saturating clamp applied to update values before quantization.
    pub clip: f32,
    /// Upper bound on the quantization scale exponent.
    pub max_scale_bits: u32,
}

impl Default for CipherConfig {
    fn default() -> Self {
        Self {
            degree: 8192,
            moduli_sizes: vec![50, 55, 55],
            plaintext_modulus: 1 << 40,
            clip: 8.0,
            max_scale_bits: 12,
        }
    }
}

impl CipherConfig {
    /// Smaller, faster profile for demos and tests.
    pub fn compact() -> Self {
        Self {
            degree: 4096,
            ..Self::default()
        }
    }
}

/// Fixed-point quantization under one shared scale.
///
/// All vectors of a round must share the scale, otherwise their distances
/// are not comparable.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedScale {
    bits: u32,
    clip: f32,
}

impl FixedScale {
    fn factor(&self) -> f64 {
        (1u64 << self.bits) as f64
    }

    /// Quantize with saturating clamp at `±clip`.
    pub fn quantize(&self, values: &[f32]) -> Vec<i64> {
        let s = self.factor();
        values
            .iter()
            .map(|&v| (f64::from(v.clamp(-self.clip, self.clip)) * s).round() as i64)
            .collect()
    }

    /// Invert quantization.
    pub fn dequantize(&self, values: &[i64]) -> Vec<f32> {
        let s = self.factor();
        values.iter().map(|&q| (q as f64 / s) as f32).collect()
    }

    /// Convert a raw decrypted squared-distance coefficient back to f64.
    pub fn distance_from_raw(&self, raw: i64) -> f64 {
        let s = self.factor();
        raw as f64 / (s * s)
    }

    /// Worst-case per-element round-trip error.
    pub fn step(&self) -> f64 {
        0.5 / self.factor()
    }
}

/// One encrypted update: forward- and reversed-order ciphertext chunks.
pub struct EncryptedUpdate {
    fwd: Vec<Ciphertext>,
    rev: Vec<Ciphertext>,
    dim: usize,
}

impl EncryptedUpdate {
    /// Dimension of the underlying flat vector.
    pub fn dim(&self) -> usize {
        self.dim
    }
}

/// Cryptocontext plus keypair, produced once at startup.
pub struct CipherContext {
    params: Arc<BfvParameters>,
    sk: SecretKey,
    pk: PublicKey,
    mul: Multiplicator,
    cfg: CipherConfig,
}

impl CipherContext {
    /// Generate parameters and keys. Failures here are fatal for the run.
    pub fn init(cfg: CipherConfig) -> Result<Self, FlError> {
        let params = BfvParametersBuilder::new()
            .set_degree(cfg.degree)
            .set_plaintext_modulus(cfg.plaintext_modulus)
            .set_moduli_sizes(&cfg.moduli_sizes)
            .build_arc()?;

        let mut rng = thread_rng();
        let sk = SecretKey::random(&params, &mut rng);
        let pk = PublicKey::new(&sk, &mut rng);
        let rk = RelinearizationKey::new(&sk, &mut rng)?;
        let mul = Multiplicator::default(&rk)?;

        Ok(Self {
            params,
            sk,
            pk,
            mul,
            cfg,
        })
    }

    /// The configured profile.
    pub fn config(&self) -> &CipherConfig {
        &self.cfg
    }

    /// Coefficients per ciphertext chunk for a `dim`-element vector.
    pub fn chunk_len(&self, dim: usize) -> usize {
        dim.min(self.cfg.degree).max(1)
    }

    /// Pick the largest scale such that a `dim`-element inner product of
    /// clamped difference vectors cannot wrap the plaintext modulus.
    ///
    /// Elements of a homomorphic difference reach `2 * scale * clip`, so
    /// the constraint is `dim * (2 * scale * clip)^2 < t / 2`.
    pub fn scale_for_dimension(&self, dim: usize) -> Result<FixedScale, FlError> {
        if dim == 0 {
            return Err(FlError::EmptyUpdates);
        }
        let half_t = self.cfg.plaintext_modulus as f64 / 2.0;
        let max_factor = (half_t / dim as f64).sqrt() / (2.0 * f64::from(self.cfg.clip));
        if max_factor < 2.0 {
            return Err(FlError::EncryptionContext(format!(
                "dimension {dim} too large for plaintext modulus {}",
                self.cfg.plaintext_modulus
            )));
        }
        let bits = (max_factor.log2().floor() as u32).min(self.cfg.max_scale_bits);
        Ok(FixedScale {
            bits,
            clip: self.cfg.clip,
        })
    }

    /// Map signed coefficients into `[0, t)`.
    fn encode_centered(&self, values: &[i64]) -> Result<Plaintext, FlError> {
        let t = self.cfg.plaintext_modulus;
        let unsigned: Vec<u64> = values
            .iter()
            .map(|&v| {
                if v < 0 {
                    (t - v.unsigned_abs() % t) % t
                } else {
                    v as u64 % t
                }
            })
            .collect();
        Ok(Plaintext::try_encode(
            &unsigned[..],
            Encoding::poly(),
            &self.params,
        )?)
    }

    /// Encrypt one quantized vector as forward and reversed chunks.
    pub fn encrypt_update(&self, quantized: &[i64]) -> Result<EncryptedUpdate, FlError> {
        if quantized.is_empty() {
            return Err(FlError::EmptyUpdates);
        }
        let dim = quantized.len();
        let chunk_len = self.chunk_len(dim);
        let mut rng = thread_rng();

        let mut fwd = Vec::new();
        let mut rev = Vec::new();
        for chunk in quantized.chunks(chunk_len) {
            let mut padded = vec![0i64; chunk_len];
            padded[..chunk.len()].copy_from_slice(chunk);

            let pt_fwd = self.encode_centered(&padded)?;
            padded.reverse();
            let pt_rev = self.encode_centered(&padded)?;

            fwd.push(self.pk.try_encrypt(&pt_fwd, &mut rng)?);
            rev.push(self.pk.try_encrypt(&pt_rev, &mut rng)?);
        }
        Ok(EncryptedUpdate { fwd, rev, dim })
    }

    /// Homomorphic `||a - b||^2`, still encrypted.
    ///
    /// One ciphertext-ciphertext multiplication per chunk; chunk products
    /// are summed homomorphically. The squared distance sits in coefficient
    /// `chunk_len - 1` of the result.
    pub fn pair_distance(
        &self,
        a: &EncryptedUpdate,
        b: &EncryptedUpdate,
    ) -> Result<Ciphertext, FlError> {
        if a.dim != b.dim || a.fwd.len() != b.fwd.len() {
            return Err(FlError::ShapeMismatch {
                expected: a.dim,
                actual: b.dim,
            });
        }

        let mut acc: Option<Ciphertext> = None;
        for c in 0..a.fwd.len() {
            let diff_fwd = &a.fwd[c] - &b.fwd[c];
            let diff_rev = &a.rev[c] - &b.rev[c];
            let prod = self.mul.multiply(&diff_fwd, &diff_rev)?;
            acc = Some(match acc {
                Some(sum) => &sum + &prod,
                None => prod,
            });
        }
        // a.fwd is non-empty for any constructible EncryptedUpdate
        acc.ok_or(FlError::EmptyUpdates)
    }

    /// Decode a plaintext to signed coefficients, centered mod `t`.
    fn decode_centered(&self, pt: &Plaintext) -> Result<Vec<i64>, FlError> {
        let t = self.cfg.plaintext_modulus;
        let raw = Vec::<u64>::try_decode(pt, Encoding::poly())?;
        Ok(raw
            .into_iter()
            .map(|v| {
                if v > t / 2 {
                    v as i64 - t as i64
                } else {
                    v as i64
                }
            })
            .collect())
    }

    /// Decrypt a distance ciphertext down to its one meaningful scalar.
    pub fn decrypt_distance(&self, ct: &Ciphertext, dim: usize) -> Result<i64, FlError> {
        let pt = self.sk.try_decrypt(ct)?;
        let coeffs = self.decode_centered(&pt)?;
        let idx = self.chunk_len(dim) - 1;
        coeffs.get(idx).copied().ok_or(FlError::ShapeMismatch {
            expected: idx + 1,
            actual: coeffs.len(),
        })
    }

    /// Decrypt a full update. Used exactly once per round, on the winner.
    pub fn decrypt_update(&self, enc: &EncryptedUpdate) -> Result<Vec<i64>, FlError> {
        let chunk_len = self.chunk_len(enc.dim);
        let mut out = Vec::with_capacity(enc.dim);
        for ct in &enc.fwd {
            let pt = self.sk.try_decrypt(ct)?;
            let coeffs = self.decode_centered(&pt)?;
            out.extend_from_slice(&coeffs[..chunk_len.min(coeffs.len())]);
        }
        out.truncate(enc.dim);
        if out.len() != enc.dim {
            return Err(FlError::ShapeMismatch {
                expected: enc.dim,
                actual: out.len(),
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> CipherContext {
        CipherContext::init(CipherConfig::compact()).expect("context init")
    }

    #[test]
    fn test_scale_respects_capacity() {
        let ctx = context();
        let scale = ctx.scale_for_dimension(64).unwrap();
        // Difference elements reach 2 * scale * clip.
        let worst = 64.0 * (2.0 * scale.factor() * f64::from(ctx.cfg.clip)).powi(2);
        assert!(worst < ctx.cfg.plaintext_modulus as f64 / 2.0);
    }

    #[test]
    fn test_quantize_round_trip_error_bound() {
        let ctx = context();
        let scale = ctx.scale_for_dimension(16).unwrap();
        let values = vec![0.123f32, -1.75, 3.5, -0.001, 7.9];
        let back = scale.dequantize(&scale.quantize(&values));
        for (v, b) in values.iter().zip(back.iter()) {
            assert!(
                (f64::from(*v) - f64::from(*b)).abs() <= scale.step() + 1e-9,
                "{v} -> {b}"
            );
        }
    }

    #[test]
    fn test_quantize_clamps_saturating() {
        let ctx = context();
        let scale = ctx.scale_for_dimension(16).unwrap();
        let q = scale.quantize(&[1e9, -1e9]);
        let back = scale.dequantize(&q);
        assert!((f64::from(back[0]) - f64::from(ctx.cfg.clip)).abs() < 1e-6);
        assert!((f64::from(back[1]) + f64::from(ctx.cfg.clip)).abs() < 1e-6);
    }

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let ctx = context();
        let scale = ctx.scale_for_dimension(8).unwrap();
        let values = vec![0.5f32, -0.25, 1.0, 0.0, -2.5, 3.25, 0.125, -1.0];
        let q = scale.quantize(&values);
        let enc = ctx.encrypt_update(&q).unwrap();
        let dec = ctx.decrypt_update(&enc).unwrap();
        assert_eq!(dec, q);
    }

    #[test]
    fn test_homomorphic_distance_matches_cleartext() {
        let ctx = context();
        let a = vec![1.0f32, 2.0, -1.0, 0.5];
        let b = vec![0.0f32, 2.0, 1.0, -0.5];
        // Cleartext: 1 + 0 + 4 + 1 = 6
        let scale = ctx.scale_for_dimension(a.len()).unwrap();
        let ea = ctx.encrypt_update(&scale.quantize(&a)).unwrap();
        let eb = ctx.encrypt_update(&scale.quantize(&b)).unwrap();
        let ct = ctx.pair_distance(&ea, &eb).unwrap();
        let raw = ctx.decrypt_distance(&ct, a.len()).unwrap();
        let dist = scale.distance_from_raw(raw);
        assert!((dist - 6.0).abs() < 1e-3, "got {dist}");
    }

    #[test]
    fn test_chunked_vectors_round_trip_and_distance() {
        // Dimension larger than the ring degree forces multiple ciphertext
        // chunks per update; chunk products must align on one coefficient.
        let cfg = CipherConfig {
            degree: 256,
            moduli_sizes: vec![50, 55, 55],
            ..CipherConfig::default()
        };
        let ctx = CipherContext::init(cfg).unwrap();
        let dim = 600;
        let a: Vec<f32> = (0..dim).map(|i| ((i % 7) as f32 - 3.0) * 0.25).collect();
        let b: Vec<f32> = (0..dim).map(|i| ((i % 5) as f32 - 2.0) * 0.5).collect();

        let scale = ctx.scale_for_dimension(dim).unwrap();
        let (qa, qb) = (scale.quantize(&a), scale.quantize(&b));
        let ea = ctx.encrypt_update(&qa).unwrap();
        let eb = ctx.encrypt_update(&qb).unwrap();
        assert_eq!(ctx.decrypt_update(&ea).unwrap(), qa);

        let expected: f64 = a
            .iter()
            .zip(&b)
            .map(|(x, y)| (f64::from(*x) - f64::from(*y)).powi(2))
            .sum();
        let ct = ctx.pair_distance(&ea, &eb).unwrap();
        let raw = ctx.decrypt_distance(&ct, dim).unwrap();
        let dist = scale.distance_from_raw(raw);
        assert!(
            (dist - expected).abs() < expected * 1e-2 + 1e-2,
            "homomorphic {dist} vs cleartext {expected}"
        );
    }

    #[test]
    fn test_pair_distance_rejects_mismatched_dims() {
        let ctx = context();
        let scale = ctx.scale_for_dimension(4).unwrap();
        let ea = ctx.encrypt_update(&scale.quantize(&[1.0, 2.0, 3.0, 4.0])).unwrap();
        let eb = ctx.encrypt_update(&scale.quantize(&[1.0, 2.0])).unwrap();
        assert!(matches!(
            ctx.pair_distance(&ea, &eb),
            Err(FlError::ShapeMismatch { .. })
        ));
    }
}
