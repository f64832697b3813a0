//! `PanelState` is the kernel's reconciled model of the panel: areas,
//! zones, outputs, thermostats, and users. `reconcile` is called for every
//! broadcast-classified envelope, and explicitly by the facade after a
//! successful configured-response/table-info/definitions reply, since both
//! shapes carry the same kind of data.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::events::{Classification, Event};

#[derive(Debug, Clone, Default)]
pub struct PanelInfo {
    pub session_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct Area {
    pub id: u32,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Zone {
    pub id: u32,
    pub name: Option<String>,
    pub status_code: Option<char>,
    pub enabled: bool,
    pub violated: bool,
    pub trouble: bool,
    pub bypassed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Output {
    pub id: u32,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Tstat {
    pub id: u32,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct User {
    pub id: u32,
    pub name: Option<String>,
}

#[derive(Debug, Default)]
pub struct Outcome {
    pub updated_ids: Vec<u32>,
    pub events: Vec<Event>,
}

impl Outcome {
    pub fn empty() -> Self {
        Self::default()
    }
}

#[derive(Debug)]
pub struct ReconcileError(pub String);

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ReconcileError {}

#[derive(Debug, Default)]
pub struct PanelState {
    pub panel: PanelInfo,
    pub areas: BTreeMap<u32, Area>,
    pub zones: BTreeMap<u32, Zone>,
    pub outputs: BTreeMap<u32, Output>,
    pub tstats: BTreeMap<u32, Tstat>,
    pub users: BTreeMap<u32, User>,
}

impl PanelState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create_area(&mut self, id: u32) -> &mut Area {
        self.areas.entry(id).or_insert_with(|| Area { id, ..Default::default() })
    }

    pub fn get_or_create_zone(&mut self, id: u32) -> &mut Zone {
        self.zones.entry(id).or_insert_with(|| Zone { id, ..Default::default() })
    }

    pub fn get_or_create_output(&mut self, id: u32) -> &mut Output {
        self.outputs.entry(id).or_insert_with(|| Output { id, ..Default::default() })
    }

    pub fn get_or_create_tstat(&mut self, id: u32) -> &mut Tstat {
        self.tstats.entry(id).or_insert_with(|| Tstat { id, ..Default::default() })
    }

    pub fn get_or_create_user(&mut self, id: u32) -> &mut User {
        self.users.entry(id).or_insert_with(|| User { id, ..Default::default() })
    }

    /// Fold one envelope payload into state. `domain`/`verb` come from the
    /// wire envelope; `classification` is threaded through purely so the
    /// resulting change events carry the right provenance.
    pub fn reconcile(
        &mut self,
        domain: &str,
        verb: &str,
        payload: &Value,
        classification: Classification,
    ) -> Result<Outcome, ReconcileError> {
        match (domain, verb) {
            ("zone", "status") => Ok(reconcile_bulk_zone_status(self, payload, classification)),
            ("area", "get_configured") | ("area", "get_table_info") => {
                reconcile_named_list(self, payload, "areas", "area_id", classification, |state, id| {
                    let area = state.get_or_create_area(id);
                    area
                })
                .map(|ids| changed(ids, Event::AreaChanged, classification))
            }
            ("zone", "get_configured") | ("zone", "get_defs") => {
                reconcile_named_list(self, payload, "zones", "zone_id", classification, |state, id| {
                    state.get_or_create_zone(id)
                })
                .map(|ids| changed(ids, Event::ZoneChanged, classification))
            }
            ("zone", "get_table_info") => {
                reconcile_id_only_list(self, payload, "zones", "zone_id", |state, id| {
                    state.get_or_create_zone(id);
                })
                .map(|ids| changed(ids, Event::ZoneChanged, classification))
            }
            ("output", "get_configured") | ("output", "get_table_info") => {
                reconcile_named_list(self, payload, "outputs", "output_id", classification, |state, id| {
                    state.get_or_create_output(id)
                })
                .map(|ids| changed(ids, Event::OutputChanged, classification))
            }
            ("tstat", "get_configured") | ("tstat", "get_table_info") => {
                reconcile_named_list(self, payload, "tstats", "tstat_id", classification, |state, id| {
                    state.get_or_create_tstat(id)
                })
                .map(|ids| changed(ids, Event::TstatChanged, classification))
            }
            ("user", "get_configured") => {
                reconcile_named_list(self, payload, "users", "user_id", classification, |state, id| {
                    state.get_or_create_user(id)
                })
                .map(|ids| changed(ids, Event::UserChanged, classification))
            }
            _ => Ok(Outcome::empty()),
        }
    }
}

fn changed(updated_ids: Vec<u32>, event: impl Fn(Vec<u32>, Classification) -> Event, classification: Classification) -> Outcome {
    if updated_ids.is_empty() {
        return Outcome::empty();
    }
    Outcome { events: vec![event(updated_ids.clone(), classification)], updated_ids }
}

fn list_items<'a>(payload: &'a Value, field: &str) -> Result<&'a Vec<Value>, ReconcileError> {
    payload.get(field).and_then(Value::as_array).ok_or_else(|| ReconcileError(format!("missing {field:?} array")))
}

/// `{"<list_field>": [{"<id_field>": N, "name": "..."}], ...}` — named
/// entities reported by `get_configured`/`get_defs` replies.
fn reconcile_named_list<T>(
    state: &mut PanelState,
    payload: &Value,
    list_field: &str,
    id_field: &str,
    _classification: Classification,
    mut get_or_create: impl FnMut(&mut PanelState, u32) -> &mut T,
) -> Result<Vec<u32>, ReconcileError>
where
    T: HasName,
{
    let items = list_items(payload, list_field)?;
    let mut updated = Vec::with_capacity(items.len());
    for item in items {
        let id = item.get(id_field).and_then(Value::as_u64).ok_or_else(|| {
            ReconcileError(format!("{list_field} item missing {id_field:?}"))
        })? as u32;
        let entry = get_or_create(state, id);
        if let Some(name) = item.get("name").and_then(Value::as_str) {
            entry.set_name(name.to_string());
        }
        updated.push(id);
    }
    Ok(updated)
}

fn reconcile_id_only_list(
    state: &mut PanelState,
    payload: &Value,
    list_field: &str,
    id_field: &str,
    mut touch: impl FnMut(&mut PanelState, u32),
) -> Result<Vec<u32>, ReconcileError> {
    let items = list_items(payload, list_field)?;
    let mut updated = Vec::with_capacity(items.len());
    for item in items {
        let id = item.get(id_field).and_then(Value::as_u64).ok_or_else(|| {
            ReconcileError(format!("{list_field} item missing {id_field:?}"))
        })? as u32;
        touch(state, id);
        updated.push(id);
    }
    Ok(updated)
}

pub trait HasName {
    fn set_name(&mut self, name: String);
}

macro_rules! impl_has_name {
    ($($ty:ty),* $(,)?) => {
        $(impl HasName for $ty {
            fn set_name(&mut self, name: String) {
                self.name = Some(name);
            }
        })*
    };
}

impl_has_name!(Area, Zone, Output, Tstat, User);

/// Decode one hex status nibble. `enabled` is true whenever either of the
/// low two bits is set; `violated` is the high bit of that pair. `trouble`
/// and `bypassed` only apply to an enabled, non-violated zone — a zone
/// reported violated can't simultaneously report trouble/bypassed.
fn decode_nibble(c: char) -> (bool, bool, bool, bool) {
    let v = c.to_digit(16).unwrap_or(0);
    let enabled = v & 0b0011 != 0;
    let violated = v & 0b0010 != 0;
    let quiet = enabled && !violated;
    let trouble = quiet && v & 0b0100 != 0;
    let bypassed = quiet && v & 0b1000 != 0;
    (enabled, violated, trouble, bypassed)
}

/// `{"status": "1A4..."}` — one hex nibble per zone, 1-indexed by position.
fn reconcile_bulk_zone_status(state: &mut PanelState, payload: &Value, classification: Classification) -> Outcome {
    let status = payload.get("status").and_then(Value::as_str).unwrap_or("");
    let mut updated = Vec::new();
    for (i, ch) in status.chars().enumerate() {
        let zone_id = (i + 1) as u32;
        let (enabled, violated, trouble, bypassed) = decode_nibble(ch);
        let zone = state.get_or_create_zone(zone_id);
        zone.status_code = Some(ch);
        zone.enabled = enabled;
        zone.violated = violated;
        zone.trouble = trouble;
        zone.bypassed = bypassed;
        updated.push(zone_id);
    }
    changed(updated, Event::ZoneChanged, classification)
}
