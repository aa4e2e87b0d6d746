//! Signed-key join producing the session result.

use crate::crypto::SignedKey;
use crate::messages::HostSignedSet;
use std::collections::{HashMap, HashSet};

/// Final result of one intersection session.
///
/// `ids` carries no ordering guarantee; compare as a set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntersectionResult<V> {
    /// Identifiers present in both datasets
    pub ids: Vec<String>,
    /// Value payloads of the matched identifiers, absent when the session
    /// outputs keys only
    pub values: Option<HashMap<String, V>>,
}

impl<V> IntersectionResult<V> {
    /// Returns the number of matched identifiers.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if nothing matched.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Inner join of the guest's signed keys against the host's set, keeping
/// the originating identifier for each matched row.
pub(crate) fn matched_rows(
    guest: &HashMap<SignedKey, String>,
    host: &HostSignedSet,
) -> Vec<(SignedKey, String)> {
    guest
        .iter()
        .filter(|(key, _)| host.keys.contains(*key))
        .map(|(key, sid)| (*key, sid.clone()))
        .collect()
}

/// Assemble the result, joining matched identifiers back to their input
/// payloads unless the session outputs keys only.
pub(crate) fn assemble<V: Clone>(
    matched_ids: Vec<String>,
    records: &[(String, V)],
    only_output_key: bool,
) -> IntersectionResult<V> {
    if only_output_key {
        return IntersectionResult {
            ids: matched_ids,
            values: None,
        };
    }
    let matched: HashSet<&str> = matched_ids.iter().map(String::as_str).collect();
    let values = records
        .iter()
        .filter(|(sid, _)| matched.contains(sid.as_str()))
        .map(|(sid, value)| (sid.clone(), value.clone()))
        .collect();
    IntersectionResult {
        ids: matched_ids,
        values: Some(values),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guest_side(entries: &[(u8, &str)]) -> HashMap<SignedKey, String> {
        entries
            .iter()
            .map(|(byte, sid)| ([*byte; 32], sid.to_string()))
            .collect()
    }

    fn host_side(bytes: &[u8]) -> HostSignedSet {
        HostSignedSet::new(bytes.iter().map(|byte| [*byte; 32]).collect())
    }

    #[test]
    fn test_matched_rows_inner_join() {
        let guest = guest_side(&[(1, "a1"), (2, "a2"), (3, "a3")]);
        let host = host_side(&[2, 3, 4]);

        let mut matched: Vec<String> = matched_rows(&guest, &host)
            .into_iter()
            .map(|(_, sid)| sid)
            .collect();
        matched.sort();
        assert_eq!(matched, vec!["a2".to_string(), "a3".to_string()]);
    }

    #[test]
    fn test_matched_rows_empty_host() {
        let guest = guest_side(&[(1, "a1")]);
        assert!(matched_rows(&guest, &HostSignedSet::default()).is_empty());
    }

    #[test]
    fn test_assemble_joins_values_back() {
        let records = vec![
            ("a1".to_string(), 10u32),
            ("a2".to_string(), 20u32),
            ("a3".to_string(), 30u32),
        ];
        let result = assemble(vec!["a2".to_string()], &records, false);

        assert_eq!(result.len(), 1);
        let values = result.values.unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values.get("a2"), Some(&20u32));
    }

    #[test]
    fn test_assemble_key_only() {
        let records = vec![("a1".to_string(), 10u32)];
        let result = assemble(vec!["a1".to_string()], &records, true);

        assert_eq!(result.ids, vec!["a1".to_string()]);
        assert!(result.values.is_none());
    }

    #[test]
    fn test_assemble_empty() {
        let records: Vec<(String, u32)> = Vec::new();
        let result = assemble(Vec::new(), &records, false);

        assert!(result.is_empty());
        assert_eq!(result.values, Some(HashMap::new()));
    }
}
