//! Classifies one inbound envelope and routes it: a correlated reply
//! completes (or fails) its pending waiter; anything else is folded into
//! `PanelState` as a broadcast.

use serde_json::Value;

use crate::envelope;
use crate::error::Error;
use crate::events::{Classification, Event, EventQueue};
use crate::pending::PendingRegistry;
use crate::state::PanelState;

/// What the dispatcher did with an envelope, so the kernel knows whether a
/// request slot on the wire was just freed.
pub enum Outcome {
    /// A pending waiter for `seq` was completed or failed.
    Resolved { seq: i32 },
    /// The envelope was a root error, a broadcast, or unroutable.
    Unresolved,
}

pub fn dispatch(pending: &mut PendingRegistry, state: &mut PanelState, events: &mut EventQueue, raw: Value) -> Outcome {
    if let Some((code, message)) = envelope::root_error(&raw) {
        if code == 11008 {
            events.push(Event::AuthorizationRequired { classification: Classification::Broadcast });
        } else {
            events.push(Event::ApiError { code, message, classification: Classification::Broadcast });
        }
        return Outcome::Unresolved;
    }

    let Some(parsed) = envelope::parse(&raw) else {
        tracing::debug!("dropping envelope with no recognized domain key");
        return Outcome::Unresolved;
    };

    if parsed.seq > 0 {
        if let Some(expected) = pending.expected_route(parsed.seq as i32) {
            let observed = (parsed.domain.clone(), parsed.verb.clone());
            let seq = parsed.seq as i32;
            if expected == observed {
                pending.complete(seq, raw);
            } else {
                events.push(Event::DispatchRoutingError {
                    expected: expected.clone(),
                    observed: observed.clone(),
                    classification: Classification::Reply,
                });
                pending.fail(seq, Error::DispatchRoutingError { expected, observed });
            }
            return Outcome::Resolved { seq };
        }
    }

    match state.reconcile(&parsed.domain, &parsed.verb, &parsed.payload, Classification::Broadcast) {
        Ok(outcome) => events.extend(outcome.events),
        Err(e) => {
            tracing::warn!(domain = %parsed.domain, verb = %parsed.verb, error = %e, "state reconciliation failed");
            events.push(Event::ReconcileError {
                domain: parsed.domain,
                verb: parsed.verb,
                message: e.to_string(),
                classification: Classification::Broadcast,
            });
        }
    }
    Outcome::Unresolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn completes_matching_reply() {
        let mut pending = PendingRegistry::new();
        let rx = pending.create(12, "area_set_status", ("area".into(), "set_status".into())).unwrap();
        let mut state = PanelState::new();
        let mut events = EventQueue::new();
        let outcome = dispatch(&mut pending, &mut state, &mut events, json!({"seq": 12, "area": {"set_status": {"area_id": 1}}}));
        assert!(matches!(outcome, Outcome::Resolved { seq: 12 }));
        assert!(rx.try_recv().unwrap().is_ok());
    }

    #[test]
    fn route_mismatch_fails_waiter_and_emits_event() {
        let mut pending = PendingRegistry::new();
        let rx = pending.create(12, "area_set_status", ("area".into(), "set_status".into())).unwrap();
        let mut state = PanelState::new();
        let mut events = EventQueue::new();
        dispatch(&mut pending, &mut state, &mut events, json!({"seq": 12, "zone": {"get_defs": {}}}));
        assert!(rx.try_recv().unwrap().is_err());
        assert_eq!(events.drain().len(), 1);
    }

    #[test]
    fn zero_seq_is_a_broadcast() {
        let mut pending = PendingRegistry::new();
        let mut state = PanelState::new();
        let mut events = EventQueue::new();
        dispatch(&mut pending, &mut state, &mut events, json!({"seq": 0, "zone": {"status": {"status": "1"}}}));
        assert_eq!(state.zones.len(), 1);
    }

    #[test]
    fn root_error_11008_becomes_authorization_required() {
        let mut pending = PendingRegistry::new();
        let mut state = PanelState::new();
        let mut events = EventQueue::new();
        dispatch(&mut pending, &mut state, &mut events, json!({"error_code": 11008, "error_message": "nope"}));
        let drained = events.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].kind(), "AuthorizationRequired");
    }
}
