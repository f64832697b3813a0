//! The request state machine and message sink.
//!
//! `Kernel` itself is a plain, synchronous struct: every mutating method
//! takes `&mut self` and returns immediately, mirroring a single-threaded
//! cooperative scheduler where nothing ever reenters while a mutation is
//! in progress. Tests drive it directly. Production code shares it across
//! tasks (the transport's read loop, reply-timeout tasks, the keepalive
//! loop, and [`crate::client::Client`] callers) behind [`KernelHandle`],
//! a `tokio::sync::Mutex` wrapper — the async glue layer, not the state
//! machine itself.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::oneshot;

use crate::config::KernelConfig;
use crate::dispatch;
use crate::envelope;
use crate::error::{Error, Route};
use crate::events::{Classification, Event, EventQueue};
use crate::pending::PendingRegistry;
use crate::routes::RequestTable;
use crate::session::{FailCallback, Priority, SentCallback, Session};
use crate::state::PanelState;
use crate::timer::{Scheduler, TokioScheduler};

const MIN_SEQ: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    InFlight,
}

struct QueuedSend {
    seq: i32,
    envelope: Value,
    priority: Priority,
}

/// The synchronous core: sequence allocation, the single-in-flight wire
/// discipline, dispatch, and state reconciliation.
pub struct Kernel {
    session: Box<dyn Session>,
    seq: i32,
    request_state: RequestState,
    active_seq: Option<i32>,
    send_queue: VecDeque<QueuedSend>,
    pending: PendingRegistry,
    pub routes: RequestTable,
    pub state: PanelState,
    events: EventQueue,
    pub config: KernelConfig,
    send_failures: Arc<StdMutex<Vec<(i32, String)>>>,
    keepalive_missed: u32,
    closed: bool,
}

impl Kernel {
    pub fn new(config: KernelConfig, session: Box<dyn Session>, routes: RequestTable) -> Self {
        Kernel {
            session,
            seq: MIN_SEQ,
            request_state: RequestState::Idle,
            active_seq: None,
            send_queue: VecDeque::new(),
            pending: PendingRegistry::new(),
            routes,
            state: PanelState::new(),
            events: EventQueue::new(),
            config,
            send_failures: Arc::new(StdMutex::new(Vec::new())),
            keepalive_missed: 0,
            closed: false,
        }
    }

    /// Allocate the next outbound sequence number. Wraps from `i32::MAX`
    /// back to `MIN_SEQ`; `0` is reserved for broadcasts and never issued.
    pub fn next_seq(&mut self) -> i32 {
        let current = self.seq;
        self.seq = if self.seq == i32::MAX { MIN_SEQ } else { self.seq + 1 };
        current
    }

    pub fn request_state(&self) -> RequestState {
        self.request_state
    }

    pub fn active_seq(&self) -> Option<i32> {
        self.active_seq
    }

    pub fn pending_count(&self) -> usize {
        self.pending.pending_count()
    }

    pub fn queued_count(&self) -> usize {
        self.send_queue.len()
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain()
    }

    pub fn push_events(&mut self, events: Vec<Event>) {
        self.events.extend(events);
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Register a waiter for `seq` before sending, so a reply arriving
    /// between submission and the caller awaiting its receiver can never
    /// be missed.
    pub fn create_pending(
        &mut self,
        seq: i32,
        command_key: impl Into<String>,
        expected_route: Route,
    ) -> Result<oneshot::Receiver<Result<Value, Error>>, Error> {
        self.pending.create(seq, command_key, expected_route)
    }

    /// Submit a built request envelope. Sends immediately if the wire is
    /// idle; otherwise queues behind the in-flight request.
    pub fn submit_request(&mut self, seq: i32, domain: &str, verb: &str, payload: Value, priority: Priority) {
        let envelope = envelope::build(seq, domain, verb, payload);
        match self.request_state {
            RequestState::Idle => {
                self.active_seq = Some(seq);
                self.request_state = RequestState::InFlight;
                self.dispatch_send(seq, envelope, priority);
            }
            RequestState::InFlight => {
                self.send_queue.push_back(QueuedSend { seq, envelope, priority });
            }
        }
    }

    fn dispatch_send(&mut self, seq: i32, envelope: Value, priority: Priority) {
        let failures = self.send_failures.clone();
        let on_sent: SentCallback = Box::new(move |_t| {});
        let on_fail: FailCallback = Box::new(move |e| {
            failures.lock().unwrap().push((seq, e.to_string()));
        });
        self.session.send_json(envelope, priority, on_sent, on_fail);
        self.drain_send_failures();
    }

    fn drain_send_failures(&mut self) {
        let items: Vec<(i32, String)> = {
            let mut guard = self.send_failures.lock().unwrap();
            std::mem::take(&mut *guard)
        };
        for (seq, detail) in items {
            self.fail_request(seq, Error::SessionIoError(detail));
        }
    }

    fn fail_request(&mut self, seq: i32, err: Error) {
        self.pending.fail(seq, err);
        self.advance_after(seq);
    }

    /// If `seq` was the active on-wire request, free the slot and send the
    /// next queued request, if any.
    fn advance_after(&mut self, seq: i32) {
        if self.active_seq == Some(seq) {
            self.active_seq = None;
            self.request_state = RequestState::Idle;
            self.drain_queue();
        }
    }

    fn drain_queue(&mut self) {
        if let Some(next) = self.send_queue.pop_front() {
            self.active_seq = Some(next.seq);
            self.request_state = RequestState::InFlight;
            self.dispatch_send(next.seq, next.envelope, next.priority);
        }
    }

    /// Handle one inbound JSON frame.
    pub fn on_message(&mut self, raw: Value) {
        self.drain_send_failures();
        if let dispatch::Outcome::Resolved { seq } = dispatch::dispatch(&mut self.pending, &mut self.state, &mut self.events, raw) {
            self.advance_after(seq);
        }
    }

    /// Fire a reply-timeout deadline. A no-op unless `seq` is still the
    /// active on-wire request (covers both the reply-before-timeout race
    /// and a timeout left over from a cancelled/completed request).
    pub fn on_reply_timeout(&mut self, seq: i32) {
        if self.active_seq != Some(seq) {
            return;
        }
        let Some(command_key) = self.pending.command_key(seq) else {
            self.advance_after(seq);
            return;
        };
        self.fail_request(seq, Error::E27Timeout(command_key));
    }

    /// A caller's `async_execute` future was dropped before its reply
    /// arrived. Removes the waiter and, if it was on the wire, frees the
    /// slot for the next queued send.
    pub fn cancel_pending(&mut self, seq: i32) {
        self.pending.discard(seq);
        self.advance_after(seq);
    }

    /// Fail every outstanding request, e.g. because the transport reported
    /// a disconnect. Does not itself emit a `ConnectionState` event — call
    /// sites decide whether and how to report the disconnect.
    pub fn abort_requests(&mut self, reason: impl Into<String>) {
        self.pending.abort_all(Error::ConnectionLost(reason.into()));
        self.active_seq = None;
        self.request_state = RequestState::Idle;
        self.send_queue.clear();
    }

    /// The transport reported a disconnect. Suppressed after an explicit
    /// [`Kernel::close`] so a disconnect racing the close doesn't produce
    /// a second `ConnectionState` event.
    pub fn on_disconnected(&mut self, reason: impl Into<String>, error_kind: Option<String>) {
        if self.closed {
            return;
        }
        let reason = reason.into();
        self.abort_requests(reason.clone());
        self.events.push(Event::ConnectionState { connected: false, reason, error_kind, classification: Classification::Local });
    }

    /// Close the session. Idempotent: only the first call tears down the
    /// transport, aborts requests, and emits a `ConnectionState` event.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.session.close();
        self.abort_requests("closed");
        self.events.push(Event::ConnectionState { connected: false, reason: "closed".to_string(), error_kind: None, classification: Classification::Local });
    }

    pub fn keepalive_missed(&self) -> u32 {
        self.keepalive_missed
    }

    pub fn reset_keepalive_missed(&mut self) {
        self.keepalive_missed = 0;
    }

    /// Record a missed keepalive probe; returns `true` once the configured
    /// `max_missed` threshold is reached.
    pub fn record_keepalive_miss(&mut self) -> bool {
        self.keepalive_missed += 1;
        self.keepalive_missed >= self.config.keepalive.max_missed
    }
}

/// Shared handle to a [`Kernel`] for use across tasks: the transport's
/// read loop, reply-timeout tasks, the keepalive loop, and concurrent
/// facade callers all go through here rather than holding `&mut Kernel`
/// directly.
#[derive(Clone)]
pub struct KernelHandle {
    inner: Arc<tokio::sync::Mutex<Kernel>>,
    scheduler: Arc<dyn Scheduler>,
}

impl KernelHandle {
    pub fn new(kernel: Kernel) -> Self {
        Self::with_scheduler(kernel, Arc::new(TokioScheduler))
    }

    pub fn with_scheduler(kernel: Kernel, scheduler: Arc<dyn Scheduler>) -> Self {
        KernelHandle { inner: Arc::new(tokio::sync::Mutex::new(kernel)), scheduler }
    }

    pub async fn on_message(&self, raw: Value) {
        self.inner.lock().await.on_message(raw);
    }

    pub async fn on_disconnected(&self, reason: impl Into<String>, error_kind: Option<String>) {
        self.inner.lock().await.on_disconnected(reason, error_kind);
    }

    pub async fn close(&self) {
        self.inner.lock().await.close();
    }

    pub async fn drain_events(&self) -> Vec<Event> {
        self.inner.lock().await.drain_events()
    }

    pub async fn pending_count(&self) -> usize {
        self.inner.lock().await.pending_count()
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.is_closed()
    }

    pub async fn with_kernel<R>(&self, f: impl FnOnce(&mut Kernel) -> R) -> R {
        f(&mut *self.inner.lock().await)
    }

    /// Submit one request and await its reply, enforcing `timeout_s`.
    /// Dropping the returned future before it resolves cancels the waiter.
    pub async fn execute_raw(
        &self,
        domain: &str,
        verb: &str,
        command_key: &str,
        payload: Value,
        expected_route: Route,
        timeout_s: f64,
        priority: Priority,
    ) -> Result<Value, Error> {
        let (seq, receiver) = {
            let mut kernel = self.inner.lock().await;
            let seq = kernel.next_seq();
            let receiver = kernel.create_pending(seq, command_key, expected_route)?;
            kernel.submit_request(seq, domain, verb, payload, priority);
            (seq, receiver)
        };

        let timeout_handle = self.clone();
        let sleep = self.scheduler.sleep(Duration::from_secs_f64(timeout_s.max(0.0)));
        tokio::spawn(async move {
            sleep.await;
            timeout_handle.inner.lock().await.on_reply_timeout(seq);
        });

        let guard = CancelOnDrop { handle: self.clone(), seq, done: false };
        let result = receiver.await;
        guard.disarm();

        match result {
            Ok(reply) => reply,
            Err(_) => Err(Error::ConnectionLost("reply waiter dropped without resolving".into())),
        }
    }

    /// Run the periodic keepalive loop until the session closes. Intended
    /// to be spawned once, right after the session is established.
    pub async fn run_keepalive(&self) {
        let (enabled, interval) = {
            let kernel = self.inner.lock().await;
            (kernel.config.keepalive.enabled, Duration::from_secs_f64(kernel.config.keepalive.interval_s))
        };
        if !enabled {
            return;
        }
        loop {
            self.scheduler.sleep(interval).await;
            if self.is_closed().await {
                return;
            }
            let timeout_s = { self.inner.lock().await.config.keepalive.timeout_s };
            let result = self
                .execute_raw("system", "r_u_alive", "system_r_u_alive", Value::Object(Default::default()), ("system".into(), "r_u_alive".into()), timeout_s, Priority::High)
                .await;
            let mut kernel = self.inner.lock().await;
            match result {
                Ok(_) => kernel.reset_keepalive_missed(),
                Err(_) => {
                    if kernel.record_keepalive_miss() {
                        drop(kernel);
                        // Consecutive probe failures tear down the transport
                        // outright rather than just marking it disconnected.
                        self.close().await;
                        return;
                    }
                }
            }
        }
    }
}

/// Ensures a dropped `execute_raw` future still removes its waiter from
/// the pending registry instead of leaking it until the reply timeout.
struct CancelOnDrop {
    handle: KernelHandle,
    seq: i32,
    done: bool,
}

impl CancelOnDrop {
    fn disarm(mut self) {
        self.done = true;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let handle = self.handle.clone();
        let seq = self.seq;
        tokio::spawn(async move {
            handle.inner.lock().await.cancel_pending(seq);
        });
    }
}
