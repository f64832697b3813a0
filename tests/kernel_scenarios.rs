//! End-to-end scenarios driven entirely through the public `Client` API
//! plus a mock `Session`, matching the sequencing a real transport would
//! observe: replies are fed back in exactly the order requests left the
//! wire.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};

use panel_link::session::{FailCallback, SentCallback};
use panel_link::{Client, Error, KernelConfig, Priority, Session};

#[derive(Clone, Default)]
struct Outbox(Arc<Mutex<Vec<Value>>>);

impl Outbox {
    fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    fn get(&self, index: usize) -> Value {
        self.0.lock().unwrap()[index].clone()
    }
}

struct MockSession {
    outbox: Outbox,
    fail_sends: bool,
}

impl Session for MockSession {
    fn send_json(&mut self, value: Value, _priority: Priority, on_sent: SentCallback, on_fail: FailCallback) {
        if self.fail_sends {
            on_fail(Error::SessionIoError("mock transport refused the write".into()));
        } else {
            self.outbox.0.lock().unwrap().push(value);
            on_sent(0.0);
        }
    }

    fn close(&mut self) {}
}

/// Poll `outbox` until it has at least `n` entries, yielding to let other
/// tasks on this (single-threaded) runtime make progress.
async fn wait_for_sent(outbox: &Outbox, n: usize) {
    for _ in 0..1000 {
        if outbox.len() >= n {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("timed out waiting for {n} outbound envelope(s), only saw {}", outbox.len());
}

fn new_client(fail_sends: bool) -> (Client, Outbox) {
    let outbox = Outbox::default();
    let session = Box::new(MockSession { outbox: outbox.clone(), fail_sends });
    (Client::with_default_routes(KernelConfig::default(), session), outbox)
}

#[tokio::test]
async fn bootstrap_issues_the_fixed_route_order() {
    let (client, outbox) = new_client(false);
    let client = Arc::new(client);

    let expected = [
        ("area", "get_table_info"),
        ("zone", "get_table_info"),
        ("output", "get_table_info"),
        ("tstat", "get_table_info"),
        ("area", "get_configured"),
        ("zone", "get_configured"),
        ("output", "get_configured"),
        ("user", "get_configured"),
        ("zone", "get_defs"),
    ];

    let bootstrap_client = client.clone();
    let task = tokio::spawn(async move { bootstrap_client.bootstrap().await });

    for (i, (domain, verb)) in expected.iter().enumerate() {
        wait_for_sent(&outbox, i + 1).await;
        let env = outbox.get(i);
        assert!(env[domain].get(verb).is_some(), "request {i} expected {domain}.{verb}, got {env}");
        let seq = env["seq"].as_i64().unwrap();
        client.on_message(json!({"seq": seq, domain: {verb: {}}})).await;
    }

    task.await.unwrap();
}

#[tokio::test]
async fn area_set_status_round_trips_through_the_ack() {
    let (client, outbox) = new_client(false);
    let client = Arc::new(client);

    let call_client = client.clone();
    let task = tokio::spawn(async move { call_client.area_set_status(3, true).await });

    wait_for_sent(&outbox, 1).await;
    let env = outbox.get(0);
    assert_eq!(env["area"]["set_status"]["area_id"], 3);
    assert_eq!(env["area"]["set_status"]["Chime"], true);
    let seq = env["seq"].as_i64().unwrap();

    client.on_message(json!({"seq": seq, "area": {"set_status": {"area_id": 3, "Chime": true}}})).await;

    let result = task.await.unwrap();
    assert!(result.ok);
    assert_eq!(result.data.unwrap()["area_id"], 3);
}

#[tokio::test]
async fn paged_zone_configured_merges_all_blocks() {
    let (client, outbox) = new_client(false);
    let client = Arc::new(client);

    let call_client = client.clone();
    let task = tokio::spawn(async move { call_client.zone_get_configured().await });

    for block_id in 1..=3u64 {
        wait_for_sent(&outbox, block_id as usize).await;
        let env = outbox.get((block_id - 1) as usize);
        assert_eq!(env["zone"]["get_configured"]["block_id"], block_id);
        let seq = env["seq"].as_i64().unwrap();
        client
            .on_message(json!({
                "seq": seq,
                "zone": {"get_configured": {
                    "block_id": block_id,
                    "block_count": 3,
                    "zones": [{"zone_id": block_id, "name": format!("Zone {block_id}")}],
                }},
            }))
            .await;
    }

    let result = task.await.unwrap();
    assert!(result.ok);
    let data = result.data.unwrap();
    assert_eq!(data["zones"].as_array().unwrap().len(), 3);
    assert_eq!(data["block_count"], 3);
}

#[tokio::test(start_paused = true)]
async fn paging_aborts_and_discards_partial_data_on_a_block_timeout() {
    let (client, outbox) = new_client(false);
    let client = Arc::new(client);

    let call_client = client.clone();
    let task = tokio::spawn(async move { call_client.zone_get_configured().await });

    wait_for_sent(&outbox, 1).await;
    let env = outbox.get(0);
    let seq = env["seq"].as_i64().unwrap();
    client
        .on_message(json!({
            "seq": seq,
            "zone": {"get_configured": {"block_id": 1, "block_count": 2, "zones": [{"zone_id": 1}]}},
        }))
        .await;

    // Second block is never answered; let its reply timeout elapse.
    wait_for_sent(&outbox, 2).await;
    tokio::time::advance(Duration::from_secs(11)).await;

    let result = task.await.unwrap();
    assert!(!result.ok);
    assert!(matches!(result.error, Some(Error::E27Timeout(_))));
}

#[tokio::test]
async fn root_authorization_error_does_not_disturb_pending_requests() {
    let (client, outbox) = new_client(false);
    let client = Arc::new(client);

    let call_client = client.clone();
    let task = tokio::spawn(async move { call_client.get_version_info().await });
    wait_for_sent(&outbox, 1).await;

    client.on_message(json!({"error_code": 11008, "error_message": "not authorized"})).await;
    let events = client.drain_events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind(), "AuthorizationRequired");

    // The pending request is untouched; it still resolves normally.
    let seq = outbox.get(0)["seq"].as_i64().unwrap();
    client.on_message(json!({"seq": seq, "control": {"get_version_info": {"version": "1.0"}}})).await;
    assert!(task.await.unwrap().ok);
}

#[tokio::test]
async fn mismatched_route_fails_the_waiter_and_emits_an_event() {
    let (client, outbox) = new_client(false);
    let client = Arc::new(client);

    let call_client = client.clone();
    let task = tokio::spawn(async move { call_client.get_version_info().await });
    wait_for_sent(&outbox, 1).await;
    let seq = outbox.get(0)["seq"].as_i64().unwrap();

    client.on_message(json!({"seq": seq, "zone": {"get_defs": {}}})).await;

    let result = task.await.unwrap();
    assert!(matches!(result.error, Some(Error::DispatchRoutingError { .. })));
    let events = client.drain_events().await;
    assert_eq!(events.iter().filter(|e| e.kind() == "DispatchRoutingError").count(), 1);
}

#[tokio::test]
async fn disconnect_fails_every_outstanding_request_with_connection_lost() {
    let (client, outbox) = new_client(false);
    let client = Arc::new(client);

    let call_client = client.clone();
    let task = tokio::spawn(async move { call_client.get_version_info().await });
    wait_for_sent(&outbox, 1).await;

    client.on_disconnected("socket reset", Some("ConnectionLost".to_string())).await;

    let result = task.await.unwrap();
    assert!(matches!(result.error, Some(Error::ConnectionLost(_))));
}

#[tokio::test]
async fn close_emits_exactly_one_connection_state_event_and_suppresses_later_disconnect_noise() {
    let (client, _outbox) = new_client(false);
    client.close().await;
    client.on_disconnected("late socket error", None).await;
    let events = client.drain_events().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind(), "ConnectionState");
}

#[tokio::test(start_paused = true)]
async fn consecutive_missed_keepalive_probes_close_the_session() {
    let mut config = KernelConfig::default();
    config.keepalive.interval_s = 1.0;
    config.keepalive.timeout_s = 1.0;
    config.keepalive.max_missed = 2;

    // Sends always fail, so every keepalive probe is a miss.
    let (client, _outbox) = new_client(true);
    let client = Arc::new(client);
    let keepalive_client = client.clone();
    let handle = keepalive_client.handle();
    let task = tokio::spawn(async move { handle.run_keepalive().await });

    tokio::time::advance(Duration::from_secs(5)).await;
    task.await.unwrap();

    assert!(client.handle().is_closed().await);
}
