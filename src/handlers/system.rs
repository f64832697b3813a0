use serde_json::json;

use crate::routes::RequestTable;

pub fn register(table: &mut RequestTable) {
    table.register("system", "get_table_info", None, false, None, |_args| Ok(json!({})));
    table.register("system", "r_u_alive", None, false, None, |_args| Ok(json!({})));
}
