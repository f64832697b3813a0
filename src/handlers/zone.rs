use serde_json::json;

use crate::routes::{block_id_payload, RequestTable};

pub fn register(table: &mut RequestTable) {
    table.register("zone", "get_table_info", None, true, None, |_args| Ok(json!({})));
    table.register("zone", "get_configured", Some("zones"), true, None, block_id_payload);
    // Not paged — zone.get_defs returns names/descriptions in one reply.
    table.register("zone", "get_defs", None, true, None, |_args| Ok(json!({})));
}
