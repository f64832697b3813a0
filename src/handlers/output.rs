use serde_json::json;

use crate::routes::{block_id_payload, RequestTable};

pub fn register(table: &mut RequestTable) {
    table.register("output", "get_table_info", None, true, None, |_args| Ok(json!({})));
    table.register("output", "get_configured", Some("outputs"), true, None, block_id_payload);
}
