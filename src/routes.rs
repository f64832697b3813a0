//! The request table: maps a `command_key` (`"<domain>_<verb>"`) to the
//! outbound payload builder registered for it.
//!
//! Builders stay generic over `&CommandArgs` rather than typed parameters —
//! the wire protocol itself is loosely typed, and imposing a concrete
//! struct per command here would just be a thin, constantly-stale copy of
//! what the panel actually accepts.

use std::collections::HashMap;

use serde_json::Value;

use crate::client::CommandArgs;
use crate::error::Error;

pub type PayloadBuilder = Box<dyn Fn(&CommandArgs) -> Result<Value, Error> + Send + Sync>;

pub struct RouteEntry {
    pub domain: &'static str,
    pub verb: &'static str,
    /// `Some(list_field)` for commands paginated via `block_id`/`block_count`.
    pub paged_list_field: Option<&'static str>,
    /// Whether a successful reply should also be folded into `PanelState`.
    pub stateful: bool,
    pub timeout_s: Option<f64>,
    builder: PayloadBuilder,
}

impl RouteEntry {
    pub fn build(&self, args: &CommandArgs) -> Result<Value, Error> {
        (self.builder)(args)
    }
}

#[derive(Default)]
pub struct RequestTable {
    by_command_key: HashMap<String, RouteEntry>,
}

impl RequestTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn command_key(domain: &str, verb: &str) -> String {
        format!("{domain}_{verb}")
    }

    #[allow(clippy::too_many_arguments)]
    pub fn register(
        &mut self,
        domain: &'static str,
        verb: &'static str,
        paged_list_field: Option<&'static str>,
        stateful: bool,
        timeout_s: Option<f64>,
        builder: impl Fn(&CommandArgs) -> Result<Value, Error> + Send + Sync + 'static,
    ) {
        let command_key = Self::command_key(domain, verb);
        self.by_command_key.insert(
            command_key,
            RouteEntry { domain, verb, paged_list_field, stateful, timeout_s, builder: Box::new(builder) },
        );
    }

    pub fn get(&self, command_key: &str) -> Option<&RouteEntry> {
        self.by_command_key.get(command_key)
    }
}

/// Read a required unsigned integer argument.
pub fn require_u64(args: &CommandArgs, command_key: &str, key: &str) -> Result<u64, Error> {
    args.get(key).and_then(Value::as_u64).ok_or_else(|| Error::InvalidArgs {
        command_key: command_key.to_string(),
        reason: format!("missing or non-integer argument {key:?}"),
    })
}

/// Read a required boolean argument.
pub fn require_bool(args: &CommandArgs, command_key: &str, key: &str) -> Result<bool, Error> {
    args.get(key).and_then(Value::as_bool).ok_or_else(|| Error::InvalidArgs {
        command_key: command_key.to_string(),
        reason: format!("missing or non-boolean argument {key:?}"),
    })
}

/// Shared builder for paginated `get_configured` routes: the only
/// argument the wire protocol accepts for these is `block_id`.
pub fn block_id_payload(args: &CommandArgs) -> Result<Value, Error> {
    let mut obj = serde_json::Map::new();
    if let Some(block_id) = args.get("block_id") {
        obj.insert("block_id".to_string(), block_id.clone());
    }
    Ok(Value::Object(obj))
}
