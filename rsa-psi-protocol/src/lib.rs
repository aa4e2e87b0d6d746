//! # Blind-RSA Private Set Intersection
//!
//! This library implements the guest side of a two-party private set
//! intersection built on blind RSA signatures, together with a reference
//! host responder. The guest learns which of its identifiers also appear
//! in the host's dataset; neither side learns anything about the other's
//! non-matching identifiers.
//!
//! ## Features
//!
//! - **Transport Agnostic**: All exchanges go through the [`Channel`]
//!   trait; an in-memory implementation ships for tests and single-process
//!   use, and any blocking transport can implement it.
//! - **Serialization Agnostic**: Message types are plain Rust structs with
//!   big integers kept as integers; channel implementations choose the
//!   encoding.
//! - **Signed-Set Caching**: The host's signed identifier set does not
//!   depend on session randomness, so guests can persist it through a
//!   [`CacheStore`] and skip the transfer when the host confirms the
//!   stored version is still current.
//! - **Raw Fallback**: A plaintext exchange mode for settings where
//!   revealing the datasets is acceptable, with the join side picked by
//!   configuration.
//!
//! ## Protocol Overview
//!
//! One session runs these phases in order, each blocking until its
//! exchange completes:
//!
//! 1. **Public key**: the host publishes `(e, n)`.
//! 2. **Blind**: the guest hashes each identifier, samples a fresh blind
//!    factor `r`, and sends `hash * r^e mod n`. The factors never leave
//!    the guest.
//! 3. **Host set**: the guest obtains the host's signed identifier set,
//!    either fresh off the wire or from its cache after a successful
//!    version negotiation.
//! 4. **Unblind**: the host returns each blinded value raised to `d`; the
//!    guest divides out `r`, leaving a bare signature it fingerprints.
//! 5. **Intersect**: fingerprints present in both sets are the
//!    intersection; matched identifiers join back to their payloads.
//! 6. **Synchronize** (optional): the guest sends the matched keys back so
//!    the host learns the intersection too.
//!
//! ## Example Usage
//!
//! ```ignore
//! use rsa_psi_protocol::{
//!     duplex, GuestConfig, IntersectMode, IntersectionGuest, IntersectionHost,
//!     MemoryCacheStore,
//! };
//!
//! let (guest_channel, host_channel) = duplex();
//!
//! // Host side, usually another process holding the RSA key
//! let host = std::thread::spawn(move || {
//!     IntersectionHost::new(host_config, private_key, host_channel)
//!         .run(&host_ids)
//! });
//!
//! let guest = IntersectionGuest::new(guest_config, guest_channel, MemoryCacheStore::new());
//! let result = guest.run(&records)?;
//! println!("matched {} identifiers", result.len());
//! ```
//!
//! ## Security Considerations
//!
//! - The channel MUST be secured (TLS or equivalent) in production; the
//!   protocol does not authenticate the peer.
//! - Blinded values are information-theoretically hidden from the host by
//!   the random factors; the host's set is hidden from the guest behind
//!   the private exponent.
//! - A reused cache trusts the host's version verdict. A host that lies
//!   about versions can only make the guest compute against a stale copy
//!   of data that same host already chose to publish.
//!
//! ## Modules
//!
//! - `protocol` - Guest-side session orchestration
//! - `host` - Reference host responder
//! - `cache` - Signed-set cache negotiation and storage
//! - `channel` - Transport trait and in-memory implementation
//! - `config` - Session configuration
//! - `messages` - Wire message types
//! - `crypto` - Blinding and fingerprinting arithmetic
//! - `intersect` - Result assembly
//! - `error` - Error types

pub use cache::{
    namespace_for, table_name_for, CacheEntry, CacheLocation, CacheStore, CacheVersionKey,
    MemoryCacheStore, CACHE_TAG,
};
pub use channel::{duplex, Channel, InMemoryChannel};
pub use config::{CacheConfig, GuestConfig, IntersectMode, JoinRole};
pub use crypto::SignedKey;
pub use error::{PsiError, Result};
pub use host::{HostCacheConfig, HostConfig, HostMode, IntersectionHost, RsaPrivateKey};
pub use intersect::IntersectionResult;
pub use messages::{
    BlindedIds, CacheVersionInfo, CacheVersionMatch, GuestMessage, HostMessage, HostSignedSet,
    IntersectionIds, ProcessedIds, RawIds, RawIntersection, RsaPublicKey,
};
pub use protocol::IntersectionGuest;

mod cache;
mod channel;
mod config;
mod crypto;
mod error;
mod host;
mod intersect;
mod messages;
mod protocol;
mod raw;
mod state;
