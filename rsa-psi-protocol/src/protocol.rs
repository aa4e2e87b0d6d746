//! Guest-side protocol orchestration.

use crate::cache::{self, CacheStore, CacheVersionKey};
use crate::channel::Channel;
use crate::config::{CacheConfig, GuestConfig, IntersectMode};
use crate::crypto::SignedKey;
use crate::error::{PsiError, Result};
use crate::intersect::{self, IntersectionResult};
use crate::messages::{
    BlindedIds, GuestMessage, HostMessage, HostSignedSet, IntersectionIds, ProcessedIds,
    RsaPublicKey,
};
use crate::raw;
use crate::state::BlindSession;
use tracing::{debug, info};

/// Guest-side session: drives the exchange sequence against one host.
///
/// Phases run strictly in order, each blocking on the channel until its
/// exchange completes. A session is single-use: [`run`](Self::run)
/// consumes it, and the per-identifier blind factors die with it.
pub struct IntersectionGuest<C, S> {
    config: GuestConfig,
    channel: C,
    cache: S,
}

impl<C, S> IntersectionGuest<C, S>
where
    C: Channel<GuestMessage, HostMessage>,
    S: CacheStore,
{
    /// Create a session from its configuration, a connected channel, and
    /// the cache store backing negotiation. Sessions without caching still
    /// take a store; a cache-free mode never touches it.
    pub fn new(config: GuestConfig, channel: C, cache: S) -> Self {
        IntersectionGuest {
            config,
            channel,
            cache,
        }
    }

    /// Run the session over the caller's records and return the
    /// intersection.
    ///
    /// Records pair each identifier with an opaque payload, joined back
    /// into the result unless the session outputs keys only. Duplicate
    /// identifiers collapse to one row. Empty datasets are legal and
    /// produce an empty result.
    ///
    /// # Errors
    /// Any channel failure, out-of-sequence or malformed peer message, or
    /// arithmetic failure aborts the session.
    pub fn run<V: Clone>(mut self, records: &[(String, V)]) -> Result<IntersectionResult<V>> {
        match self.config.mode.clone() {
            IntersectMode::RsaBlind {
                random_bit_length,
                cache,
            } => self.run_rsa_blind(random_bit_length, cache.as_ref(), records),
            IntersectMode::Raw { join_role } => raw::run_guest(
                &mut self.channel,
                join_role,
                self.config.synchronize_intersect_ids,
                self.config.only_output_key,
                records,
            ),
        }
    }

    fn run_rsa_blind<V: Clone>(
        &mut self,
        random_bit_length: u64,
        cache_config: Option<&CacheConfig>,
        records: &[(String, V)],
    ) -> Result<IntersectionResult<V>> {
        info!(records = records.len(), "starting blind-RSA intersection");

        let public_key = self.receive_public_key()?;
        debug!(modulus_bits = public_key.n.bits(), "bound host public key");

        let sids: Vec<String> = records.iter().map(|(sid, _)| sid.clone()).collect();
        let session = BlindSession::blind_all(public_key, random_bit_length, &sids);

        let blinded = session.blinded_values();
        info!(count = blinded.len(), "sending blinded identifiers");
        self.channel
            .send(GuestMessage::BlindedIds(BlindedIds::new(blinded)))?;

        let host_set = match cache_config {
            Some(cfg) => {
                let key = CacheVersionKey::for_session(
                    self.config.guest_party_id,
                    self.config.host_party_id,
                    cfg,
                );
                cache::resolve_host_signed_set(&mut self.channel, &mut self.cache, &key)?
            }
            None => self.receive_host_signed_set()?,
        };
        debug!(keys = host_set.len(), "host signed set resolved");

        let processed = self.receive_processed_ids()?;
        let signed = session.unblind_all(&processed)?;
        debug!(count = signed.len(), "unblinded guest identifiers");

        let rows = intersect::matched_rows(&signed, &host_set);
        info!(matched = rows.len(), "intersection computed");

        let (keys, ids): (Vec<SignedKey>, Vec<String>) = rows.into_iter().unzip();
        if self.config.synchronize_intersect_ids {
            self.channel
                .send(GuestMessage::IntersectionIds(IntersectionIds::new(keys)))?;
            debug!("synchronized intersection keys to host");
        }

        Ok(intersect::assemble(
            ids,
            records,
            self.config.only_output_key,
        ))
    }

    fn receive_public_key(&mut self) -> Result<RsaPublicKey> {
        let public_key = match self.channel.recv()? {
            HostMessage::PublicKey(pk) => pk,
            other => return Err(other.unexpected("public-key")),
        };
        if public_key.n.bits() == 0 {
            return Err(PsiError::Protocol("public key modulus is zero".to_string()));
        }
        Ok(public_key)
    }

    fn receive_host_signed_set(&mut self) -> Result<HostSignedSet> {
        match self.channel.recv()? {
            HostMessage::HostSignedSet(set) => Ok(set),
            other => Err(other.unexpected("host-ids-processed")),
        }
    }

    fn receive_processed_ids(&mut self) -> Result<ProcessedIds> {
        match self.channel.recv()? {
            HostMessage::ProcessedIds(processed) => Ok(processed),
            other => Err(other.unexpected("guest-ids-processed")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStore;
    use crate::messages::{RawIntersection, RsaPublicKey};
    use num_bigint::BigUint;
    use std::collections::VecDeque;

    struct ScriptedChannel {
        replies: VecDeque<HostMessage>,
        sent: Vec<GuestMessage>,
    }

    impl ScriptedChannel {
        fn new(replies: Vec<HostMessage>) -> Self {
            Self {
                replies: replies.into(),
                sent: Vec::new(),
            }
        }
    }

    impl Channel<GuestMessage, HostMessage> for ScriptedChannel {
        fn send(&mut self, message: GuestMessage) -> Result<()> {
            self.sent.push(message);
            Ok(())
        }

        fn recv(&mut self) -> Result<HostMessage> {
            self.replies
                .pop_front()
                .ok_or_else(|| PsiError::Channel("script exhausted".to_string()))
        }
    }

    fn rsa_config() -> GuestConfig {
        GuestConfig {
            guest_party_id: 9_999,
            host_party_id: 10_000,
            synchronize_intersect_ids: false,
            only_output_key: false,
            mode: IntersectMode::RsaBlind {
                random_bit_length: 128,
                cache: None,
            },
        }
    }

    fn small_public_key() -> RsaPublicKey {
        RsaPublicKey {
            e: BigUint::from(65_537u32),
            n: BigUint::from(1_000_000_007u64) * BigUint::from(998_244_353u64),
        }
    }

    #[test]
    fn test_unexpected_first_message_fails() {
        let channel = ScriptedChannel::new(vec![HostMessage::ProcessedIds(
            ProcessedIds::default(),
        )]);
        let guest = IntersectionGuest::new(rsa_config(), channel, MemoryCacheStore::new());

        let result = guest.run(&[("a1".to_string(), 0u32)]);
        assert_eq!(
            result,
            Err(PsiError::Protocol(
                "expected `public-key`, received `guest-ids-processed`".to_string()
            ))
        );
    }

    #[test]
    fn test_unexpected_signed_set_message_fails() {
        let channel = ScriptedChannel::new(vec![
            HostMessage::PublicKey(small_public_key()),
            HostMessage::ProcessedIds(ProcessedIds::default()),
        ]);
        let guest = IntersectionGuest::new(rsa_config(), channel, MemoryCacheStore::new());

        let result = guest.run(&[("a1".to_string(), 0u32)]);
        assert_eq!(
            result,
            Err(PsiError::Protocol(
                "expected `host-ids-processed`, received `guest-ids-processed`".to_string()
            ))
        );
    }

    #[test]
    fn test_zero_modulus_is_rejected() {
        let channel = ScriptedChannel::new(vec![HostMessage::PublicKey(RsaPublicKey {
            e: BigUint::from(65_537u32),
            n: BigUint::from(0u32),
        })]);
        let guest = IntersectionGuest::new(rsa_config(), channel, MemoryCacheStore::new());

        let result = guest.run(&[("a1".to_string(), 0u32)]);
        assert_eq!(
            result,
            Err(PsiError::Protocol("public key modulus is zero".to_string()))
        );
    }

    #[test]
    fn test_empty_records_complete_without_error() {
        let channel = ScriptedChannel::new(vec![
            HostMessage::PublicKey(small_public_key()),
            HostMessage::HostSignedSet(HostSignedSet::default()),
            HostMessage::ProcessedIds(ProcessedIds::default()),
        ]);
        let guest = IntersectionGuest::new(rsa_config(), channel, MemoryCacheStore::new());

        let result = guest.run::<u32>(&[]).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.values, Some(std::collections::HashMap::new()));
    }

    #[test]
    fn test_channel_failure_aborts_session() {
        // Script ends after the public key; the next receive fails
        let channel = ScriptedChannel::new(vec![HostMessage::PublicKey(small_public_key())]);
        let guest = IntersectionGuest::new(rsa_config(), channel, MemoryCacheStore::new());

        let result = guest.run(&[("a1".to_string(), 0u32)]);
        assert!(matches!(result, Err(PsiError::Channel(_))));
    }

    #[test]
    fn test_raw_mode_dispatch() {
        let mut config = rsa_config();
        config.mode = IntersectMode::Raw {
            join_role: crate::config::JoinRole::Host,
        };
        let channel = ScriptedChannel::new(vec![HostMessage::RawIntersection(
            RawIntersection::new(vec!["a1".to_string()]),
        )]);
        let guest = IntersectionGuest::new(config, channel, MemoryCacheStore::new());

        let result = guest.run(&[("a1".to_string(), 0u32)]).unwrap();
        assert_eq!(result.ids, vec!["a1".to_string()]);
    }
}
