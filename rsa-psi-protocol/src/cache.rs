//! Cache negotiation for reusing a previously stored host signed set.
//!
//! The host's signed set is the expensive half of the exchange: it does
//! not depend on any per-session randomness, so a guest that stored it
//! once can skip the transfer as long as the host confirms the stored
//! version is still current. Versions are opaque strings minted by the
//! host; the guest never interprets them beyond equality.

use crate::channel::Channel;
use crate::config::CacheConfig;
use crate::error::{PsiError, Result};
use crate::messages::{CacheVersionInfo, GuestMessage, HostMessage, HostSignedSet};
use std::collections::HashMap;
use tracing::{debug, info};

/// Fixed tag carried in every cache version tuple.
pub const CACHE_TAG: &str = "Za";

/// Identity of a logically reusable host signed set.
///
/// Entries are keyed by the whole tuple, never a subset: two sessions
/// whose tuples are identical are assumed to see equivalent host sets,
/// and any field changing makes a distinct entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheVersionKey {
    pub host_party_id: u32,
    pub guest_party_id: u32,
    pub id_type: String,
    pub encrypt_type: String,
    pub tag: String,
}

impl CacheVersionKey {
    /// Assemble the tuple for one session from its configuration.
    pub fn for_session(guest_party_id: u32, host_party_id: u32, cache: &CacheConfig) -> Self {
        CacheVersionKey {
            host_party_id,
            guest_party_id,
            id_type: cache.id_type.clone(),
            encrypt_type: cache.encrypt_type.clone(),
            tag: CACHE_TAG.to_string(),
        }
    }
}

/// Durable storage coordinates of one cached set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLocation {
    pub table_name: String,
    pub namespace: String,
}

/// A recorded cache entry: where the set lives and the version it was
/// persisted under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub location: CacheLocation,
    pub version: String,
}

/// Table name a set persisted under `version` lands at.
///
/// The wire candidate carries no version field, so both parties rely on
/// this convention: the host recovers the guest's stored version by
/// computing the name its own current version would produce and comparing.
pub fn table_name_for(key: &CacheVersionKey, version: &str) -> String {
    format!(
        "{}#{}#{}#{}",
        key.id_type, key.encrypt_type, key.tag, version
    )
}

/// Namespace holding every intersection cache entry for one party pair.
pub fn namespace_for(key: &CacheVersionKey) -> String {
    format!(
        "{}#{}#intersect_cache",
        key.guest_party_id, key.host_party_id
    )
}

/// Durable keyed storage for host signed sets.
///
/// This is the cache-facing slice of whatever dataset engine backs the
/// deployment. Implementations own naming and placement; callers only
/// ever see locations they were handed back by `store`.
pub trait CacheStore {
    /// Entry previously recorded for this tuple, if any.
    fn current_entry(&self, key: &CacheVersionKey) -> Result<Option<CacheEntry>>;

    /// Attach the stored set at `location`. When the table is missing and
    /// `create_if_missing` is set, attach an empty one instead of
    /// failing; content is never fabricated.
    fn open(&mut self, location: &CacheLocation, create_if_missing: bool)
        -> Result<HostSignedSet>;

    /// Persist a freshly received set under `version`, replacing any
    /// prior entry for the tuple, and return the location it landed at.
    fn store(
        &mut self,
        key: &CacheVersionKey,
        version: &str,
        set: &HostSignedSet,
    ) -> Result<CacheLocation>;
}

impl<T: CacheStore + ?Sized> CacheStore for &mut T {
    fn current_entry(&self, key: &CacheVersionKey) -> Result<Option<CacheEntry>> {
        (**self).current_entry(key)
    }

    fn open(
        &mut self,
        location: &CacheLocation,
        create_if_missing: bool,
    ) -> Result<HostSignedSet> {
        (**self).open(location, create_if_missing)
    }

    fn store(
        &mut self,
        key: &CacheVersionKey,
        version: &str,
        set: &HostSignedSet,
    ) -> Result<CacheLocation> {
        (**self).store(key, version, set)
    }
}

/// In-memory store used by tests, demos, and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: HashMap<CacheVersionKey, CacheEntry>,
    tables: HashMap<(String, String), HostSignedSet>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded entries.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

impl CacheStore for MemoryCacheStore {
    fn current_entry(&self, key: &CacheVersionKey) -> Result<Option<CacheEntry>> {
        Ok(self.entries.get(key).cloned())
    }

    fn open(
        &mut self,
        location: &CacheLocation,
        create_if_missing: bool,
    ) -> Result<HostSignedSet> {
        let table_key = (location.namespace.clone(), location.table_name.clone());
        if let Some(set) = self.tables.get(&table_key) {
            return Ok(set.clone());
        }
        if create_if_missing {
            self.tables.insert(table_key, HostSignedSet::default());
            return Ok(HostSignedSet::default());
        }
        Err(PsiError::Protocol(format!(
            "stored cache table `{}` in namespace `{}` is missing",
            location.table_name, location.namespace
        )))
    }

    fn store(
        &mut self,
        key: &CacheVersionKey,
        version: &str,
        set: &HostSignedSet,
    ) -> Result<CacheLocation> {
        let location = CacheLocation {
            table_name: table_name_for(key, version),
            namespace: namespace_for(key),
        };
        self.tables.insert(
            (location.namespace.clone(), location.table_name.clone()),
            set.clone(),
        );
        self.entries.insert(
            key.clone(),
            CacheEntry {
                location: location.clone(),
                version: version.to_string(),
            },
        );
        Ok(location)
    }
}

/// Run the cache negotiation and return the resolved host signed set.
///
/// Sends the local candidate, obeys the host's verdict, and either
/// attaches the stored set or receives a fresh one and persists it under
/// the version the host named. At most one store happens per session, and
/// only on the mismatch path.
pub(crate) fn resolve_host_signed_set<C, S>(
    channel: &mut C,
    store: &mut S,
    key: &CacheVersionKey,
) -> Result<HostSignedSet>
where
    C: Channel<GuestMessage, HostMessage>,
    S: CacheStore,
{
    let entry = store.current_entry(key)?;
    debug!(recorded = entry.is_some(), "assembled local cache candidate");

    let (table_name, namespace) = match &entry {
        Some(e) => (
            Some(e.location.table_name.clone()),
            Some(e.location.namespace.clone()),
        ),
        None => (None, None),
    };
    channel.send(GuestMessage::CacheVersionInfo(CacheVersionInfo {
        table_name,
        namespace,
        id_type: key.id_type.clone(),
        encrypt_type: key.encrypt_type.clone(),
        tag: key.tag.clone(),
    }))?;

    let verdict = match channel.recv()? {
        HostMessage::CacheVersionMatch(m) => m,
        other => return Err(other.unexpected("cache-version-match")),
    };

    if verdict.version_match {
        let entry = entry.ok_or_else(|| {
            PsiError::Protocol(
                "host vouched for a cache version but no entry is recorded locally".to_string(),
            )
        })?;
        info!(version = %entry.version, "reusing stored host signed set");
        return store.open(&entry.location, true);
    }

    let version = verdict.version.ok_or_else(|| {
        PsiError::Protocol("cache version mismatch without an authoritative version".to_string())
    })?;
    let fresh = match channel.recv()? {
        HostMessage::HostSignedSet(set) => set,
        other => return Err(other.unexpected("host-ids-processed")),
    };
    let location = store.store(key, &version, &fresh)?;
    info!(
        version = %version,
        table = %location.table_name,
        keys = fresh.len(),
        "stored fresh host signed set"
    );
    Ok(fresh)
}
