//! Message types exchanged between guest and host.
//!
//! Each struct is the payload of one named exchange. Messages are plain
//! data: serialization is the transport's concern, and big integers stay
//! as integers until a channel implementation renders them.

use crate::crypto::SignedKey;
use crate::error::PsiError;
use num_bigint::BigUint;
use std::collections::{HashMap, HashSet};

/// RSA public key published by the host at session start
/// (`public-key`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaPublicKey {
    /// Public exponent
    pub e: BigUint,
    /// Modulus
    pub n: BigUint,
}

/// Blinded guest identifiers (`blinded-ids`).
///
/// Carries only the blinded values; the association back to identifiers
/// never leaves the guest.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlindedIds {
    pub values: Vec<BigUint>,
}

impl BlindedIds {
    pub fn new(values: Vec<BigUint>) -> Self {
        Self { values }
    }

    /// Returns the number of blinded values in this message.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if this message carries no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// The guest's cache candidate (`cache-version-info`).
///
/// Identity fields of the version tuple plus the storage location a prior
/// session recorded, when one exists. No version travels on the wire; the
/// host recovers it from the location naming convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheVersionInfo {
    /// Table name of the locally stored set, if any
    pub table_name: Option<String>,
    /// Namespace of the locally stored set, if any
    pub namespace: Option<String>,
    /// Identifier hashing scheme label
    pub id_type: String,
    /// Signing scheme label
    pub encrypt_type: String,
    /// Fixed cache tag
    pub tag: String,
}

/// The host's verdict on the candidate (`cache-version-match`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheVersionMatch {
    /// Whether the candidate names the host's current version
    pub version_match: bool,
    /// The authoritative version to persist under, present when
    /// `version_match` is false
    pub version: Option<String>,
}

/// The host's signed identifier set (`host-ids-processed`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HostSignedSet {
    pub keys: HashSet<SignedKey>,
}

impl HostSignedSet {
    pub fn new(keys: HashSet<SignedKey>) -> Self {
        Self { keys }
    }

    /// Returns the number of signed keys in this set.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Host-processed guest values (`guest-ids-processed`).
///
/// Maps each blinded value back to its signed form so the guest can join
/// the response against what it sent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessedIds {
    pub pairs: HashMap<BigUint, BigUint>,
}

impl ProcessedIds {
    pub fn new(pairs: HashMap<BigUint, BigUint>) -> Self {
        Self { pairs }
    }

    /// Returns the number of processed pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns true if no pairs were returned.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Signed keys of the computed intersection (`intersection-ids`), sent
/// back to the host when synchronization is enabled.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IntersectionIds {
    pub keys: Vec<SignedKey>,
}

impl IntersectionIds {
    pub fn new(keys: Vec<SignedKey>) -> Self {
        Self { keys }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Plain identifiers shipped by the raw fallback (`raw-ids`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawIds {
    pub ids: Vec<String>,
}

impl RawIds {
    pub fn new(ids: Vec<String>) -> Self {
        Self { ids }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Matched identifiers produced by whichever party owns the raw join
/// (`raw-intersection`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawIntersection {
    pub ids: Vec<String>,
}

impl RawIntersection {
    pub fn new(ids: Vec<String>) -> Self {
        Self { ids }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Everything the guest can put on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuestMessage {
    BlindedIds(BlindedIds),
    CacheVersionInfo(CacheVersionInfo),
    IntersectionIds(IntersectionIds),
    RawIds(RawIds),
    RawIntersection(RawIntersection),
}

impl GuestMessage {
    /// Wire name of the exchange this message belongs to.
    pub fn exchange(&self) -> &'static str {
        match self {
            GuestMessage::BlindedIds(_) => "blinded-ids",
            GuestMessage::CacheVersionInfo(_) => "cache-version-info",
            GuestMessage::IntersectionIds(_) => "intersection-ids",
            GuestMessage::RawIds(_) => "raw-ids",
            GuestMessage::RawIntersection(_) => "raw-intersection",
        }
    }

    /// Error for this message arriving where `expected` should have.
    pub(crate) fn unexpected(&self, expected: &str) -> PsiError {
        PsiError::Protocol(format!(
            "expected `{expected}`, received `{}`",
            self.exchange()
        ))
    }
}

/// Everything the host can put on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostMessage {
    PublicKey(RsaPublicKey),
    CacheVersionMatch(CacheVersionMatch),
    HostSignedSet(HostSignedSet),
    ProcessedIds(ProcessedIds),
    RawIds(RawIds),
    RawIntersection(RawIntersection),
}

impl HostMessage {
    /// Wire name of the exchange this message belongs to.
    pub fn exchange(&self) -> &'static str {
        match self {
            HostMessage::PublicKey(_) => "public-key",
            HostMessage::CacheVersionMatch(_) => "cache-version-match",
            HostMessage::HostSignedSet(_) => "host-ids-processed",
            HostMessage::ProcessedIds(_) => "guest-ids-processed",
            HostMessage::RawIds(_) => "raw-ids",
            HostMessage::RawIntersection(_) => "raw-intersection",
        }
    }

    /// Error for this message arriving where `expected` should have.
    pub(crate) fn unexpected(&self, expected: &str) -> PsiError {
        PsiError::Protocol(format!(
            "expected `{expected}`, received `{}`",
            self.exchange()
        ))
    }
}
