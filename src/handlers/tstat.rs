use serde_json::json;

use crate::routes::RequestTable;

pub fn register(table: &mut RequestTable) {
    table.register("tstat", "get_table_info", None, true, None, |_args| Ok(json!({})));
    // Unlike area/zone/output/user, tstat.get_configured is not paged.
    table.register("tstat", "get_configured", None, true, None, |_args| Ok(json!({})));
}
