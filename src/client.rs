//! The public async facade: one `async_execute` entry point plus typed
//! convenience wrappers, paging orchestration, and bootstrap.

use serde_json::Value;

use crate::config::KernelConfig;
use crate::error::Error;
use crate::events::{Classification, Event};
use crate::kernel::{Kernel, KernelHandle};
use crate::paging;
use crate::routes::RequestTable;
use crate::session::{Priority, Session};

/// Keyword-style arguments for [`Client::async_execute`]. The wire
/// protocol is loosely typed, so this stays a JSON object rather than a
/// per-command struct.
pub type CommandArgs = serde_json::Map<String, Value>;

#[derive(Debug)]
pub struct ExecResult {
    pub ok: bool,
    pub data: Option<Value>,
    pub error: Option<Error>,
}

impl ExecResult {
    fn ok(data: Value) -> Self {
        ExecResult { ok: true, data: Some(data), error: None }
    }

    fn err(error: Error) -> Self {
        ExecResult { ok: false, data: None, error: Some(error) }
    }
}

/// Fixed bootstrap order issued once per new session.
const BOOTSTRAP_ROUTES: [(&str, &str); 9] = [
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

pub struct Client {
    handle: KernelHandle,
}

impl Client {
    pub fn new(config: KernelConfig, session: Box<dyn Session>, routes: RequestTable) -> Self {
        let kernel = Kernel::new(config, session, routes);
        Client { handle: KernelHandle::new(kernel) }
    }

    /// Construct a client wired up with every built-in route
    /// ([`crate::default_routes`]); the common case for hosts that don't
    /// register custom commands.
    pub fn with_default_routes(config: KernelConfig, session: Box<dyn Session>) -> Self {
        Self::new(config, session, crate::default_routes())
    }

    pub fn handle(&self) -> KernelHandle {
        self.handle.clone()
    }

    /// Start the background keepalive loop. Call once per connected session.
    pub fn spawn_keepalive(&self) {
        let handle = self.handle.clone();
        tokio::spawn(async move { handle.run_keepalive().await });
    }

    pub async fn drain_events(&self) -> Vec<Event> {
        self.handle.drain_events().await
    }

    pub async fn close(&self) {
        self.handle.close().await;
    }

    /// Feed one inbound JSON frame from the transport into the kernel.
    pub async fn on_message(&self, raw: Value) {
        self.handle.on_message(raw).await;
    }

    pub async fn on_disconnected(&self, reason: impl Into<String>, error_kind: Option<String>) {
        self.handle.on_disconnected(reason, error_kind).await;
    }

    /// The single generic entry point: look up `command_key`'s route,
    /// build its payload from `args`, submit it, and await the reply
    /// (merging pages if the route is paginated).
    pub async fn async_execute(&self, command_key: &str, args: CommandArgs, timeout_s: Option<f64>) -> ExecResult {
        let route = match self.handle.with_kernel(|k| {
            k.routes.get(command_key).map(|r| {
                (r.domain, r.verb, r.paged_list_field, r.stateful, r.timeout_s)
            }).map(|route| (route, k.config.request_timeout_s))
        }).await {
            Some(r) => r,
            None => return ExecResult::err(Error::RouteNotRegistered(command_key.to_string())),
        };
        let ((domain, verb, paged_list_field, stateful, route_timeout), default_timeout) = route;
        let timeout_s = timeout_s.or(route_timeout).unwrap_or(default_timeout);

        let result = if let Some(list_field) = paged_list_field {
            self.execute_paged(domain, verb, command_key, &args, list_field, timeout_s).await
        } else {
            self.execute_single(domain, verb, command_key, &args, timeout_s).await
        };

        match result {
            Ok(data) => {
                if stateful {
                    self.reconcile(domain, verb, &data).await;
                }
                ExecResult::ok(data)
            }
            Err(e) => ExecResult::err(e),
        }
    }

    async fn execute_single(&self, domain: &str, verb: &str, command_key: &str, args: &CommandArgs, timeout_s: f64) -> Result<Value, Error> {
        let payload = self.build_payload(command_key, args).await?;
        let raw = self
            .handle
            .execute_raw(domain, verb, command_key, payload, (domain.to_string(), verb.to_string()), timeout_s, Priority::Normal)
            .await?;
        Ok(crate::envelope::parse(&raw).map(|p| p.payload).unwrap_or(Value::Null))
    }

    async fn execute_paged(
        &self,
        domain: &str,
        verb: &str,
        command_key: &str,
        args: &CommandArgs,
        list_field: &'static str,
        timeout_s: f64,
    ) -> Result<Value, Error> {
        let handle = self.handle.clone();
        let domain = domain.to_string();
        let verb = verb.to_string();
        let command_key = command_key.to_string();
        let base_args = args.clone();

        let (items, block_count) = paging::run_paged(list_field, move |block_id| {
            let handle = handle.clone();
            let domain = domain.clone();
            let verb = verb.clone();
            let command_key = command_key.clone();
            let mut args = base_args.clone();
            args.insert("block_id".to_string(), Value::from(block_id));
            async move {
                let payload = build_payload_for(&command_key, &args)?;
                let raw = handle
                    .execute_raw(&domain, &verb, &command_key, payload, (domain.clone(), verb.clone()), timeout_s, Priority::Normal)
                    .await?;
                Ok(crate::envelope::parse(&raw).map(|p| p.payload).unwrap_or(Value::Null))
            }
        })
        .await?;

        let mut merged = serde_json::Map::new();
        merged.insert(list_field.to_string(), Value::Array(items));
        merged.insert("block_count".to_string(), Value::from(block_count));
        Ok(Value::Object(merged))
    }

    async fn build_payload(&self, command_key: &str, args: &CommandArgs) -> Result<Value, Error> {
        let command_key = command_key.to_string();
        let args = args.clone();
        self.handle.with_kernel(move |k| build_payload_with_routes(&k.routes, &command_key, &args)).await
    }

    async fn reconcile(&self, domain: &str, verb: &str, data: &Value) {
        let domain = domain.to_string();
        let verb = verb.to_string();
        let data = data.clone();
        self.handle
            .with_kernel(move |k| {
                match k.state.reconcile(&domain, &verb, &data, Classification::Reply) {
                    Ok(outcome) => k.push_events(outcome.events),
                    Err(e) => tracing::warn!(domain = %domain, verb = %verb, error = %e, "failed to fold reply into state"),
                }
            })
            .await;
    }

    /// Run the fixed bootstrap sequence. Requests are issued one at a
    /// time, in order; a failure is logged via a drained event rather
    /// than aborting the remaining queries.
    pub async fn bootstrap(&self) {
        for (domain, verb) in BOOTSTRAP_ROUTES {
            let command_key = RequestTable::command_key(domain, verb);
            let result = self.async_execute(&command_key, CommandArgs::new(), None).await;
            if let Some(err) = result.error {
                tracing::warn!(command_key, error = %err, "bootstrap query failed");
            }
        }
    }

    pub async fn get_version_info(&self) -> ExecResult {
        self.async_execute("control_get_version_info", CommandArgs::new(), None).await
    }

    pub async fn area_set_status(&self, area_id: u64, chime: bool) -> ExecResult {
        let mut args = CommandArgs::new();
        args.insert("area_id".to_string(), Value::from(area_id));
        args.insert("chime".to_string(), Value::from(chime));
        self.async_execute("area_set_status", args, None).await
    }

    pub async fn area_get_configured(&self) -> ExecResult {
        self.async_execute("area_get_configured", CommandArgs::new(), None).await
    }

    pub async fn zone_get_configured(&self) -> ExecResult {
        self.async_execute("zone_get_configured", CommandArgs::new(), None).await
    }

    pub async fn output_get_configured(&self) -> ExecResult {
        self.async_execute("output_get_configured", CommandArgs::new(), None).await
    }

    pub async fn user_get_configured(&self) -> ExecResult {
        self.async_execute("user_get_configured", CommandArgs::new(), None).await
    }
}

fn build_payload_with_routes(routes: &RequestTable, command_key: &str, args: &CommandArgs) -> Result<Value, Error> {
    let entry = routes.get(command_key).ok_or_else(|| Error::RouteNotRegistered(command_key.to_string()))?;
    entry.build(args)
}

fn build_payload_for(command_key: &str, args: &CommandArgs) -> Result<Value, Error> {
    // Paged requests only ever carry `block_id`; no domain-specific builder
    // is needed since every paged route's payload is just that.
    let _ = command_key;
    crate::routes::block_id_payload(args)
}
