//! Plain-identifier fallback path.
//!
//! No blinding, no keys: both sides exchange identifiers in the clear and
//! one of them, picked by the configured join role, performs the join.
//! Useful only where revealing the datasets to each other is acceptable.

use crate::channel::Channel;
use crate::config::JoinRole;
use crate::error::Result;
use crate::intersect::{self, IntersectionResult};
use crate::messages::{GuestMessage, HostMessage, RawIds, RawIntersection};
use std::collections::HashSet;
use tracing::info;

/// Run the raw exchange for the guest.
///
/// An unrecognized role can never reach this point; it fails when the
/// configuration is parsed.
pub(crate) fn run_guest<C, V>(
    channel: &mut C,
    join_role: JoinRole,
    synchronize_intersect_ids: bool,
    only_output_key: bool,
    records: &[(String, V)],
) -> Result<IntersectionResult<V>>
where
    C: Channel<GuestMessage, HostMessage>,
    V: Clone,
{
    info!(role = %join_role, records = records.len(), "starting raw intersection");
    let ids: Vec<String> = records.iter().map(|(sid, _)| sid.clone()).collect();

    let matched = match join_role {
        JoinRole::Host => {
            channel.send(GuestMessage::RawIds(RawIds::new(ids)))?;
            match channel.recv()? {
                HostMessage::RawIntersection(m) => m.ids,
                other => return Err(other.unexpected("raw-intersection")),
            }
        }
        JoinRole::Guest => {
            let host_ids = match channel.recv()? {
                HostMessage::RawIds(m) => m.ids,
                other => return Err(other.unexpected("raw-ids")),
            };
            let host_set: HashSet<String> = host_ids.into_iter().collect();
            let matched: Vec<String> = ids
                .into_iter()
                .filter(|sid| host_set.contains(sid))
                .collect();
            if synchronize_intersect_ids {
                channel.send(GuestMessage::RawIntersection(RawIntersection::new(
                    matched.clone(),
                )))?;
            }
            matched
        }
    };

    info!(matched = matched.len(), "raw intersection computed");
    Ok(intersect::assemble(matched, records, only_output_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PsiError;
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

    fn records(ids: &[&str]) -> Vec<(String, u32)> {
        ids.iter()
            .enumerate()
            .map(|(index, sid)| (sid.to_string(), index as u32))
            .collect()
    }

    #[test]
    fn test_host_joins_ships_ids_and_receives_matches() {
        let mut channel = ScriptedChannel::new(vec![HostMessage::RawIntersection(
            RawIntersection::new(vec!["a2".to_string()]),
        )]);

        let result = run_guest(
            &mut channel,
            JoinRole::Host,
            false,
            true,
            &records(&["a1", "a2"]),
        )
        .unwrap();

        assert_eq!(result.ids, vec!["a2".to_string()]);
        match &channel.sent[0] {
            GuestMessage::RawIds(m) => assert_eq!(m.len(), 2),
            other => panic!("unexpected message sent: {}", other.exchange()),
        }
    }

    #[test]
    fn test_guest_joins_locally() {
        let mut channel = ScriptedChannel::new(vec![HostMessage::RawIds(RawIds::new(vec![
            "a2".to_string(),
            "a4".to_string(),
        ]))]);

        let result = run_guest(
            &mut channel,
            JoinRole::Guest,
            false,
            false,
            &records(&["a1", "a2", "a3"]),
        )
        .unwrap();

        assert_eq!(result.ids, vec!["a2".to_string()]);
        let values = result.values.unwrap();
        assert_eq!(values.get("a2"), Some(&1u32));
        // Nothing goes back without synchronization
        assert!(channel.sent.is_empty());
    }

    #[test]
    fn test_guest_joins_synchronizes_when_asked() {
        let mut channel = ScriptedChannel::new(vec![HostMessage::RawIds(RawIds::new(vec![
            "a1".to_string(),
        ]))]);

        run_guest(
            &mut channel,
            JoinRole::Guest,
            true,
            true,
            &records(&["a1"]),
        )
        .unwrap();

        match &channel.sent[0] {
            GuestMessage::RawIntersection(m) => assert_eq!(m.ids, vec!["a1".to_string()]),
            other => panic!("unexpected message sent: {}", other.exchange()),
        }
    }

    #[test]
    fn test_unexpected_reply_is_protocol_error() {
        let mut channel = ScriptedChannel::new(vec![HostMessage::RawIds(RawIds::default())]);

        let result = run_guest(
            &mut channel,
            JoinRole::Host,
            false,
            true,
            &records(&["a1"]),
        );
        assert_eq!(
            result,
            Err(PsiError::Protocol(
                "expected `raw-intersection`, received `raw-ids`".to_string()
            ))
        );
    }
}
