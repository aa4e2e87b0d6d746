//! Session configuration.
//!
//! All knobs are fixed before the first exchange; nothing here changes
//! mid-session. Invalid combinations are rejected at parse time so no
//! channel activity happens on behalf of a misconfigured session.

use crate::error::PsiError;
use std::fmt;
use std::str::FromStr;

/// Which side performs the plain-identifier join in raw mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinRole {
    /// The host owns the join: the guest ships its identifiers and
    /// receives the intersection back.
    Host,
    /// The guest owns the join: the host ships its identifiers and the
    /// guest joins locally.
    Guest,
}

impl FromStr for JoinRole {
    type Err = PsiError;

    /// Recognized values: `host-joins` and `guest-joins`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "host-joins" => Ok(JoinRole::Host),
            "guest-joins" => Ok(JoinRole::Guest),
            other => Err(PsiError::Configuration(format!(
                "unrecognized join role `{other}` (expected `host-joins` or `guest-joins`)"
            ))),
        }
    }
}

impl fmt::Display for JoinRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinRole::Host => write!(f, "host-joins"),
            JoinRole::Guest => write!(f, "guest-joins"),
        }
    }
}

/// Identity labels carried into the cache version tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Identifier hashing scheme label, e.g. `phone` or `imei`
    pub id_type: String,
    /// Signing scheme label, e.g. `rsa`
    pub encrypt_type: String,
}

/// Protocol mode, fixed at session start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntersectMode {
    /// Blind-RSA intersection, the cryptographic path.
    RsaBlind {
        /// Bit length of each per-identifier blind factor
        random_bit_length: u64,
        /// Reuse a previously stored host signed set when the host
        /// confirms its version still holds
        cache: Option<CacheConfig>,
    },
    /// Plain identifier exchange with no blinding. Both datasets travel
    /// in the clear; useful only where that is acceptable.
    Raw {
        /// Which side performs the join
        join_role: JoinRole,
    },
}

/// Guest-side session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestConfig {
    pub guest_party_id: u32,
    pub host_party_id: u32,
    /// Send the matched keys back to the host after the join.
    pub synchronize_intersect_ids: bool,
    /// Return matched identifiers only, without their value payloads.
    pub only_output_key: bool,
    pub mode: IntersectMode,
}
