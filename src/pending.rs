//! Correlates outstanding requests with their eventual reply.
//!
//! Modeled on the oneshot-reply-channel pattern the teacher uses for its
//! forwarder proxy commands: one [`tokio::sync::oneshot`] pair per
//! in-flight request, keyed by `seq` instead of a UUID request id.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{Error, Route};

struct PendingEntry {
    command_key: String,
    expected_route: Route,
    sender: oneshot::Sender<Result<Value, Error>>,
}

#[derive(Default)]
pub struct PendingRegistry {
    entries: HashMap<i32, PendingEntry>,
}

impl PendingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new waiter for `seq`. Fails if `seq` is already pending —
    /// the sequence allocator should never produce a collision in practice.
    pub fn create(
        &mut self,
        seq: i32,
        command_key: impl Into<String>,
        expected_route: Route,
    ) -> Result<oneshot::Receiver<Result<Value, Error>>, Error> {
        if self.entries.contains_key(&seq) {
            return Err(Error::DuplicateSeq(seq));
        }
        let (sender, receiver) = oneshot::channel();
        self.entries.insert(seq, PendingEntry { command_key: command_key.into(), expected_route, sender });
        Ok(receiver)
    }

    /// Resolve `seq` successfully with the full reply envelope.
    pub fn complete(&mut self, seq: i32, envelope: Value) {
        if let Some(entry) = self.entries.remove(&seq) {
            let _ = entry.sender.send(Ok(envelope));
        }
    }

    /// Resolve `seq` with an error.
    pub fn fail(&mut self, seq: i32, err: Error) {
        if let Some(entry) = self.entries.remove(&seq) {
            let _ = entry.sender.send(Err(err));
        }
    }

    /// Drop a waiter without sending anything — used when the caller's
    /// future is cancelled before a reply arrives.
    pub fn discard(&mut self, seq: i32) {
        self.entries.remove(&seq);
    }

    /// Fail every outstanding waiter with the same error, e.g. on disconnect.
    pub fn abort_all(&mut self, err: Error) {
        for (_, entry) in self.entries.drain() {
            let _ = entry.sender.send(Err(err.clone()));
        }
    }

    pub fn expected_route(&self, seq: i32) -> Option<Route> {
        self.entries.get(&seq).map(|e| e.expected_route.clone())
    }

    pub fn command_key(&self, seq: i32) -> Option<String> {
        self.entries.get(&seq).map(|e| e.command_key.clone())
    }

    pub fn contains(&self, seq: i32) -> bool {
        self.entries.contains_key(&seq)
    }

    pub fn pending_count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn complete_resolves_the_waiter_exactly_once() {
        let mut registry = PendingRegistry::new();
        let rx = registry.create(10, "area_set_status", ("area".into(), "set_status".into())).unwrap();
        registry.complete(10, json!({"seq": 10}));
        assert_eq!(registry.pending_count(), 0);
        assert!(rx.try_recv().unwrap().is_ok());
    }

    #[test]
    fn duplicate_seq_is_rejected() {
        let mut registry = PendingRegistry::new();
        let _rx = registry.create(10, "a", ("a".into(), "b".into())).unwrap();
        let err = registry.create(10, "a", ("a".into(), "b".into())).unwrap_err();
        assert!(matches!(err, Error::DuplicateSeq(10)));
    }

    #[test]
    fn abort_all_fails_every_waiter() {
        let mut registry = PendingRegistry::new();
        let rx1 = registry.create(10, "a", ("a".into(), "b".into())).unwrap();
        let rx2 = registry.create(11, "a", ("a".into(), "b".into())).unwrap();
        registry.abort_all(Error::ConnectionLost("reset".into()));
        assert!(rx1.try_recv().unwrap().is_err());
        assert!(rx2.try_recv().unwrap().is_err());
        assert_eq!(registry.pending_count(), 0);
    }
}
