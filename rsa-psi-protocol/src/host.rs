//! Reference host responder.
//!
//! The guest treats the host as an opaque peer behind the channel; this
//! module is the in-repo embodiment of that wire contract so sessions can
//! run end to end in tests, demos, and single-process deployments. Key
//! generation stays out of scope: the responder takes ready-made key
//! material.

use crate::cache::{namespace_for, table_name_for, CacheVersionKey, CACHE_TAG};
use crate::channel::Channel;
use crate::config::JoinRole;
use crate::crypto::{self, SignedKey};
use crate::error::Result;
use crate::messages::{
    BlindedIds, CacheVersionInfo, CacheVersionMatch, GuestMessage, HostMessage, HostSignedSet,
    ProcessedIds, RawIds, RawIntersection, RsaPublicKey,
};
use num_bigint::BigUint;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Host-side RSA key material. Generation and custody belong to the
/// deployment.
#[derive(Debug, Clone)]
pub struct RsaPrivateKey {
    /// Public exponent
    pub e: BigUint,
    /// Private exponent
    pub d: BigUint,
    /// Modulus
    pub n: BigUint,
}

impl RsaPrivateKey {
    /// The public half published to the guest.
    pub fn public_key(&self) -> RsaPublicKey {
        RsaPublicKey {
            e: self.e.clone(),
            n: self.n.clone(),
        }
    }
}

/// Host-side cache posture.
#[derive(Debug, Clone)]
pub struct HostCacheConfig {
    /// Identifier hashing scheme label, matching the guest's
    pub id_type: String,
    /// Signing scheme label, matching the guest's
    pub encrypt_type: String,
    /// Version of the host's current signed set. Must be bumped whenever
    /// the underlying identifier set or key changes.
    pub version: String,
}

/// Host-side mode, mirroring the guest's.
#[derive(Debug, Clone)]
pub enum HostMode {
    RsaBlind {
        /// Expect the matched keys back after the guest joins
        synchronize_intersect_ids: bool,
        cache: Option<HostCacheConfig>,
    },
    Raw {
        join_role: JoinRole,
        /// Expect the matched identifiers back after a guest-side join
        synchronize_intersect_ids: bool,
    },
}

/// Host-side session configuration.
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub guest_party_id: u32,
    pub host_party_id: u32,
    pub mode: HostMode,
}

/// Host-side session: serves one guest session over the wire contract.
pub struct IntersectionHost<C> {
    config: HostConfig,
    key: RsaPrivateKey,
    channel: C,
}

impl<C> IntersectionHost<C>
where
    C: Channel<HostMessage, GuestMessage>,
{
    pub fn new(config: HostConfig, key: RsaPrivateKey, channel: C) -> Self {
        IntersectionHost {
            config,
            key,
            channel,
        }
    }

    /// Serve one session over the host's identifiers.
    ///
    /// Returns the matched host identifiers when this side learns the
    /// intersection, which happens on a host-side raw join or whenever the
    /// guest synchronizes keys back; `None` otherwise.
    pub fn run(mut self, ids: &[String]) -> Result<Option<Vec<String>>> {
        match self.config.mode.clone() {
            HostMode::RsaBlind {
                synchronize_intersect_ids,
                cache,
            } => self.run_rsa_blind(synchronize_intersect_ids, cache.as_ref(), ids),
            HostMode::Raw {
                join_role,
                synchronize_intersect_ids,
            } => self.run_raw(join_role, synchronize_intersect_ids, ids),
        }
    }

    fn run_rsa_blind(
        &mut self,
        synchronize: bool,
        cache: Option<&HostCacheConfig>,
        ids: &[String],
    ) -> Result<Option<Vec<String>>> {
        info!(ids = ids.len(), "serving blind-RSA intersection");
        self.channel
            .send(HostMessage::PublicKey(self.key.public_key()))?;

        let blinded = match self.channel.recv()? {
            GuestMessage::BlindedIds(m) => m,
            other => return Err(other.unexpected("blinded-ids")),
        };
        debug!(count = blinded.len(), "received blinded identifiers");

        let signed_by_key = sign_own_ids(&self.key, ids);

        let mut send_signed_set = true;
        if let Some(cfg) = cache {
            let candidate = match self.channel.recv()? {
                GuestMessage::CacheVersionInfo(info) => info,
                other => return Err(other.unexpected("cache-version-info")),
            };
            let matched = candidate_matches(&self.config, cfg, &candidate);
            self.channel
                .send(HostMessage::CacheVersionMatch(CacheVersionMatch {
                    version_match: matched,
                    version: if matched {
                        None
                    } else {
                        Some(cfg.version.clone())
                    },
                }))?;
            if matched {
                debug!(version = %cfg.version, "guest cache holds; skipping signed-set send");
                send_signed_set = false;
            }
        }
        if send_signed_set {
            self.channel
                .send(HostMessage::HostSignedSet(HostSignedSet::new(
                    signed_by_key.keys().copied().collect(),
                )))?;
        }

        self.channel
            .send(HostMessage::ProcessedIds(sign_blinded(&self.key, &blinded)))?;

        if synchronize {
            let keys = match self.channel.recv()? {
                GuestMessage::IntersectionIds(m) => m.keys,
                other => return Err(other.unexpected("intersection-ids")),
            };
            let matched: Vec<String> = keys
                .iter()
                .filter_map(|key| signed_by_key.get(key).cloned())
                .collect();
            info!(matched = matched.len(), "received synchronized intersection");
            return Ok(Some(matched));
        }
        Ok(None)
    }

    fn run_raw(
        &mut self,
        join_role: JoinRole,
        synchronize: bool,
        ids: &[String],
    ) -> Result<Option<Vec<String>>> {
        info!(role = %join_role, ids = ids.len(), "serving raw intersection");
        match join_role {
            JoinRole::Host => {
                let guest_ids = match self.channel.recv()? {
                    GuestMessage::RawIds(m) => m.ids,
                    other => return Err(other.unexpected("raw-ids")),
                };
                let own: HashSet<&str> = ids.iter().map(String::as_str).collect();
                let matched: Vec<String> = guest_ids
                    .into_iter()
                    .filter(|sid| own.contains(sid.as_str()))
                    .collect();
                self.channel
                    .send(HostMessage::RawIntersection(RawIntersection::new(
                        matched.clone(),
                    )))?;
                Ok(Some(matched))
            }
            JoinRole::Guest => {
                self.channel
                    .send(HostMessage::RawIds(RawIds::new(ids.to_vec())))?;
                if synchronize {
                    let matched = match self.channel.recv()? {
                        GuestMessage::RawIntersection(m) => m.ids,
                        other => return Err(other.unexpected("raw-intersection")),
                    };
                    return Ok(Some(matched));
                }
                Ok(None)
            }
        }
    }
}

/// Compare the guest's candidate against the location the host's current
/// version maps to under the shared naming convention. Every tuple field
/// must agree; a candidate with no recorded location never matches.
fn candidate_matches(
    config: &HostConfig,
    cache: &HostCacheConfig,
    candidate: &CacheVersionInfo,
) -> bool {
    let key = CacheVersionKey {
        host_party_id: config.host_party_id,
        guest_party_id: config.guest_party_id,
        id_type: cache.id_type.clone(),
        encrypt_type: cache.encrypt_type.clone(),
        tag: CACHE_TAG.to_string(),
    };
    candidate.id_type == cache.id_type
        && candidate.encrypt_type == cache.encrypt_type
        && candidate.tag == CACHE_TAG
        && candidate.table_name.as_deref() == Some(table_name_for(&key, &cache.version).as_str())
        && candidate.namespace.as_deref() == Some(namespace_for(&key).as_str())
}

/// Sign every host identifier through the one-way pipeline the guest joins
/// against: `fingerprint(hash_to_int(sid)^d mod n)`, keyed back to the
/// identifier for synchronization.
fn sign_own_ids(key: &RsaPrivateKey, ids: &[String]) -> HashMap<SignedKey, String> {
    ids.par_iter()
        .map(|sid| {
            let signed = crypto::hash_to_int(sid).modpow(&key.d, &key.n);
            (crypto::fingerprint(&signed), sid.clone())
        })
        .collect()
}

/// Apply the private exponent to each blinded guest value.
fn sign_blinded(key: &RsaPrivateKey, blinded: &BlindedIds) -> ProcessedIds {
    let pairs = blinded
        .values
        .par_iter()
        .map(|value| (value.clone(), value.modpow(&key.d, &key.n)))
        .collect();
    ProcessedIds::new(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_integer::Integer;

    fn test_private_key() -> RsaPrivateKey {
        let p = BigUint::from(1_000_000_007u64);
        let q = BigUint::from(998_244_353u64);
        let e = BigUint::from(65_537u32);
        let n = &p * &q;
        let lambda = (&p - 1u32).lcm(&(&q - 1u32));
        let d = e.modinv(&lambda).unwrap();
        RsaPrivateKey { e, d, n }
    }

    fn test_config(cache: Option<HostCacheConfig>) -> HostConfig {
        HostConfig {
            guest_party_id: 9_999,
            host_party_id: 10_000,
            mode: HostMode::RsaBlind {
                synchronize_intersect_ids: false,
                cache,
            },
        }
    }

    fn cache_config(version: &str) -> HostCacheConfig {
        HostCacheConfig {
            id_type: "phone".to_string(),
            encrypt_type: "rsa".to_string(),
            version: version.to_string(),
        }
    }

    fn candidate_for(version: &str) -> CacheVersionInfo {
        CacheVersionInfo {
            table_name: Some(format!("phone#rsa#Za#{version}")),
            namespace: Some("9999#10000#intersect_cache".to_string()),
            id_type: "phone".to_string(),
            encrypt_type: "rsa".to_string(),
            tag: CACHE_TAG.to_string(),
        }
    }

    #[test]
    fn test_candidate_matches_current_version() {
        let config = test_config(None);
        assert!(candidate_matches(
            &config,
            &cache_config("v1"),
            &candidate_for("v1")
        ));
    }

    #[test]
    fn test_candidate_rejects_stale_version() {
        let config = test_config(None);
        assert!(!candidate_matches(
            &config,
            &cache_config("v2"),
            &candidate_for("v1")
        ));
    }

    #[test]
    fn test_candidate_rejects_tuple_field_mismatch() {
        let config = test_config(None);

        let mut wrong_id_type = candidate_for("v1");
        wrong_id_type.id_type = "imei".to_string();
        assert!(!candidate_matches(
            &config,
            &cache_config("v1"),
            &wrong_id_type
        ));

        let mut wrong_tag = candidate_for("v1");
        wrong_tag.tag = "Zb".to_string();
        assert!(!candidate_matches(&config, &cache_config("v1"), &wrong_tag));
    }

    #[test]
    fn test_candidate_without_location_never_matches() {
        let config = test_config(None);
        let mut candidate = candidate_for("v1");
        candidate.table_name = None;
        candidate.namespace = None;
        assert!(!candidate_matches(&config, &cache_config("v1"), &candidate));
    }

    #[test]
    fn test_sign_blinded_applies_private_exponent() {
        let key = test_private_key();
        let value = BigUint::from(42u32);
        let blinded = BlindedIds::new(vec![value.clone()]);

        let processed = sign_blinded(&key, &blinded);
        let signed = processed.pairs.get(&value).unwrap();
        assert_eq!(*signed, value.modpow(&key.d, &key.n));
        // Applying the public exponent undoes the signature
        assert_eq!(signed.modpow(&key.e, &key.n), value);
    }

    #[test]
    fn test_sign_own_ids_matches_guest_pipeline() {
        let key = test_private_key();
        let ids = vec!["a1".to_string(), "a2".to_string()];

        let signed = sign_own_ids(&key, &ids);
        assert_eq!(signed.len(), 2);

        let expected = crypto::fingerprint(&crypto::hash_to_int("a1").modpow(&key.d, &key.n));
        assert_eq!(signed.get(&expected), Some(&"a1".to_string()));
    }
}
