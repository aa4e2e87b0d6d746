//! Modular arithmetic for the blind-RSA intersection.
//!
//! All values live in the multiplicative group modulo the host's RSA
//! modulus `n`. Guest identifiers are hashed to integers, blinded with a
//! per-identifier random factor, signed by the host, unblinded, and
//! finally fingerprinted into the fixed-width keys both parties join on.

use crate::error::{PsiError, Result};
use num_bigint::{BigUint, RandBigInt};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

/// Fixed-width digest of an unblinded signature, used as the equi-join key
/// between the two parties' signed identifier sets.
pub type SignedKey = [u8; 32];

/// Hash an identifier to an unbounded integer.
///
/// SHA-256 over the UTF-8 bytes, with the digest read as a big-endian
/// integer. The host applies the same function to its own identifiers;
/// any divergence here means no identifier could ever match.
///
/// # Arguments
/// * `sid` - The identifier to hash
///
/// # Returns
/// The digest as an integer below 2^256
pub fn hash_to_int(sid: &str) -> BigUint {
    let digest = Sha256::digest(sid.as_bytes());
    BigUint::from_bytes_be(&digest)
}

/// Sample a blind factor uniformly from `[0, 2^bits)` using OS entropy.
///
/// The factor must stay on this side of the channel and must be retained
/// until the matching host response has been unblinded.
///
/// # Arguments
/// * `bits` - Bit length of the sampled factor
pub fn sample_blind_factor(bits: u64) -> BigUint {
    let mut rng = OsRng;
    rng.gen_biguint(bits)
}

/// Blind a hashed identifier: `hash_to_int(sid) * r^e mod n`.
///
/// The exponentiation reduces progressively, so intermediate size stays
/// bounded by the modulus regardless of the factor's bit length.
///
/// # Arguments
/// * `sid` - The identifier to blind
/// * `r` - The blind factor retained for this identifier
/// * `e` - The host's public exponent
/// * `n` - The host's modulus
pub fn blind(sid: &str, r: &BigUint, e: &BigUint, n: &BigUint) -> BigUint {
    hash_to_int(sid) * r.modpow(e, n) % n
}

/// Remove a blind factor from a host-processed value:
/// `processed * r^-1 mod n`.
///
/// # Errors
/// Returns `PsiError::Arithmetic` when `r` has no inverse modulo `n`. A
/// well-formed modulus and an honestly sampled factor make this
/// unreachable, but it is checked rather than assumed.
pub fn unblind(processed: &BigUint, r: &BigUint, n: &BigUint) -> Result<BigUint> {
    let inverse = r.modinv(n).ok_or_else(|| {
        PsiError::Arithmetic("blind factor has no inverse modulo n (gcd(r, n) != 1)".to_string())
    })?;
    Ok(processed * inverse % n)
}

/// Fingerprint an unblinded signature for joining.
///
/// SHA-256 over the decimal rendering of the value. The host fingerprints
/// its own signatures the same way, so equal signatures collapse to equal
/// keys on both sides.
pub fn fingerprint(value: &BigUint) -> SignedKey {
    Sha256::digest(value.to_str_radix(10).as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_integer::Integer;

    /// 60-bit test modulus from two fixed primes, with the private
    /// exponent derived through the Carmichael function.
    fn test_key() -> (BigUint, BigUint, BigUint) {
        let p = BigUint::from(1_000_000_007u64);
        let q = BigUint::from(998_244_353u64);
        let e = BigUint::from(65_537u32);
        let n = &p * &q;
        let lambda = (&p - 1u32).lcm(&(&q - 1u32));
        let d = e.modinv(&lambda).unwrap();
        (e, d, n)
    }

    #[test]
    fn test_hash_to_int() {
        let a = hash_to_int("a1");
        let b = hash_to_int("a1");
        assert_eq!(a, b, "hashing the same identifier should be deterministic");

        let c = hash_to_int("a2");
        assert_ne!(a, c, "different identifiers should hash differently");

        assert!(a.bits() <= 256, "digest integer should fit 256 bits");
    }

    #[test]
    fn test_sample_blind_factor() {
        let r1 = sample_blind_factor(128);
        let r2 = sample_blind_factor(128);
        assert!(r1.bits() <= 128);
        assert!(r2.bits() <= 128);
        // With overwhelming probability, two samples should be different
        assert_ne!(r1, r2, "blind factors should not repeat");
    }

    #[test]
    fn test_blind_matches_naive_form() {
        let (_, _, n) = test_key();
        let e = BigUint::from(3u32);
        let r = BigUint::from(12_345u32);

        let naive = hash_to_int("a1") * r.pow(3u32) % &n;
        assert_eq!(blind("a1", &r, &e, &n), naive);
    }

    #[test]
    fn test_unblind_removes_factor() {
        let (_, _, n) = test_key();
        let r = sample_blind_factor(128);
        let hashed = hash_to_int("a1");

        let processed = &hashed * &r % &n;
        let recovered = unblind(&processed, &r, &n).unwrap();
        assert_eq!(recovered, hashed % &n);
    }

    #[test]
    fn test_blind_sign_unblind_round_trip() {
        let (e, d, n) = test_key();
        let r = sample_blind_factor(128);

        let blinded = blind("a1", &r, &e, &n);
        let signed = blinded.modpow(&d, &n);
        let recovered = unblind(&signed, &r, &n).unwrap();

        assert_eq!(
            recovered,
            hash_to_int("a1").modpow(&d, &n),
            "unblinding should recover the signature of the bare hash"
        );
    }

    #[test]
    fn test_unblind_without_inverse_fails() {
        let (_, _, n) = test_key();
        // Shares the factor 1_000_000_007 with the modulus
        let r = BigUint::from(1_000_000_007u64);
        let processed = BigUint::from(42u32);

        let result = unblind(&processed, &r, &n);
        assert!(matches!(result, Err(PsiError::Arithmetic(_))));
    }

    #[test]
    fn test_fingerprint() {
        let a = fingerprint(&BigUint::from(123_456u32));
        let b = fingerprint(&BigUint::from(123_456u32));
        assert_eq!(a, b, "fingerprinting should be deterministic");

        let c = fingerprint(&BigUint::from(123_457u32));
        assert_ne!(a, c, "different values should fingerprint differently");
    }
}
