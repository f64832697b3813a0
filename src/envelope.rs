//! Wire envelope shape: `{"seq": N, "<domain>": {"<verb>": <payload>}}`,
//! or, for root-level protocol errors, `{"error_code": N, "error_message": "..."}`.
//!
//! Payloads stay as loosely-typed [`serde_json::Value`] at this boundary —
//! route builders and parsers are where domain-specific shape gets imposed.

use serde_json::Value;

/// Domain keys recognized at the top level of an inbound envelope.
pub const DOMAINS: [&str; 7] = ["area", "zone", "output", "tstat", "system", "control", "user"];

pub struct Parsed {
    pub seq: i64,
    pub domain: String,
    pub verb: String,
    pub payload: Value,
}

/// Build an outbound request envelope.
pub fn build(seq: i32, domain: &str, verb: &str, payload: Value) -> Value {
    let mut verb_obj = serde_json::Map::new();
    verb_obj.insert(verb.to_string(), payload);
    let mut root = serde_json::Map::new();
    root.insert("seq".to_string(), Value::from(seq));
    root.insert(domain.to_string(), Value::Object(verb_obj));
    Value::Object(root)
}

/// Extract a root-level error, if this envelope is one.
pub fn root_error(raw: &Value) -> Option<(i64, String)> {
    let obj = raw.as_object()?;
    let code = obj.get("error_code")?.as_i64()?;
    let message = obj.get("error_message").and_then(Value::as_str).unwrap_or_default().to_string();
    Some((code, message))
}

/// Parse a domain-keyed envelope. Returns `None` for anything that isn't
/// shaped like one (malformed or a root error, which callers should check
/// for first via [`root_error`]).
pub fn parse(raw: &Value) -> Option<Parsed> {
    let obj = raw.as_object()?;
    let seq = obj.get("seq")?.as_i64()?;
    for domain in DOMAINS {
        if let Some(verb_obj) = obj.get(domain).and_then(Value::as_object) {
            if let Some((verb, payload)) = verb_obj.iter().next() {
                return Some(Parsed { seq, domain: domain.to_string(), verb: verb.clone(), payload: payload.clone() });
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_domain_envelope() {
        let env = build(12, "area", "set_status", json!({"area_id": 1, "Chime": true}));
        assert_eq!(env["seq"], 12);
        assert_eq!(env["area"]["set_status"]["area_id"], 1);
    }

    #[test]
    fn parses_domain_envelope() {
        let raw = json!({"seq": 7, "zone": {"get_configured": {"zones": []}}});
        let parsed = parse(&raw).unwrap();
        assert_eq!(parsed.seq, 7);
        assert_eq!(parsed.domain, "zone");
        assert_eq!(parsed.verb, "get_configured");
    }

    #[test]
    fn detects_root_error() {
        let raw = json!({"error_code": 11008, "error_message": "not authorized"});
        let (code, message) = root_error(&raw).unwrap();
        assert_eq!(code, 11008);
        assert_eq!(message, "not authorized");
    }

    #[test]
    fn rejects_envelope_without_known_domain() {
        let raw = json!({"seq": 1, "bogus": {"verb": {}}});
        assert!(parse(&raw).is_none());
    }
}
