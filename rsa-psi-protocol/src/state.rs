//! Per-session state for the blind-RSA arm.

use crate::crypto::{self, SignedKey};
use crate::error::{PsiError, Result};
use crate::messages::{ProcessedIds, RsaPublicKey};
use num_bigint::BigUint;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};

/// State retained between blinding and unblinding.
///
/// Holds the bound public key, the per-identifier blind factors, and the
/// reverse map from blinded values to identifiers. Everything here is
/// scoped to one session and dropped with it; the blind factors in
/// particular must survive until the matching responses are unblinded,
/// because a lost factor makes its response unrecoverable.
pub(crate) struct BlindSession {
    public_key: RsaPublicKey,
    /// Identifier to retained blind factor
    random_factors: HashMap<String, BigUint>,
    /// Blinded value back to identifier, for joining the response
    blinded_to_sid: HashMap<BigUint, String>,
}

impl BlindSession {
    /// Blind every identifier with a fresh factor.
    ///
    /// Duplicate identifiers collapse to one row. Per-identifier work is
    /// independent, so it runs on the rayon pool.
    pub(crate) fn blind_all(
        public_key: RsaPublicKey,
        random_bit_length: u64,
        sids: &[String],
    ) -> Self {
        let unique: Vec<&str> = sids
            .iter()
            .map(String::as_str)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let rows: Vec<(String, BigUint, BigUint)> = unique
            .par_iter()
            .map(|sid| {
                let r = crypto::sample_blind_factor(random_bit_length);
                let blinded = crypto::blind(sid, &r, &public_key.e, &public_key.n);
                (sid.to_string(), r, blinded)
            })
            .collect();

        let mut random_factors = HashMap::with_capacity(rows.len());
        let mut blinded_to_sid = HashMap::with_capacity(rows.len());
        for (sid, r, blinded) in rows {
            blinded_to_sid.insert(blinded, sid.clone());
            random_factors.insert(sid, r);
        }
        BlindSession {
            public_key,
            random_factors,
            blinded_to_sid,
        }
    }

    /// Blinded values ready for the wire, in no particular order.
    pub(crate) fn blinded_values(&self) -> Vec<BigUint> {
        self.blinded_to_sid.keys().cloned().collect()
    }

    /// Join the host's response against the blinded table, unblind every
    /// matched row with its retained factor, and fingerprint the results.
    ///
    /// Rows the host returned for values this session never sent are
    /// dropped, inner-join style.
    pub(crate) fn unblind_all(
        &self,
        processed: &ProcessedIds,
    ) -> Result<HashMap<SignedKey, String>> {
        let n = &self.public_key.n;
        processed
            .pairs
            .par_iter()
            .filter_map(|(blinded, value)| {
                self.blinded_to_sid.get(blinded).map(|sid| (sid, value))
            })
            .map(|(sid, value)| {
                let r = self.random_factors.get(sid).ok_or_else(|| {
                    PsiError::Arithmetic(format!("blind factor for `{sid}` was not retained"))
                })?;
                let unblinded = crypto::unblind(value, r, n)?;
                Ok((crypto::fingerprint(&unblinded), sid.clone()))
            })
            .collect()
    }

    /// Number of identifiers blinded in this session (for testing purposes).
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.random_factors.len()
    }
}
