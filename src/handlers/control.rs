use serde_json::json;

use crate::routes::RequestTable;

pub fn register(table: &mut RequestTable) {
    table.register("control", "get_version_info", None, false, None, |_args| Ok(json!({})));
}
