use serde_json::json;

use crate::routes::{block_id_payload, require_bool, require_u64, RequestTable};

pub fn register(table: &mut RequestTable) {
    table.register("area", "get_table_info", None, true, None, |_args| Ok(json!({})));
    table.register("area", "get_configured", Some("areas"), true, None, block_id_payload);
    table.register("area", "set_status", None, false, None, |args| {
        let area_id = require_u64(args, "area_set_status", "area_id")?;
        let chime = require_bool(args, "area_set_status", "chime")?;
        Ok(json!({"area_id": area_id, "Chime": chime}))
    });
}
