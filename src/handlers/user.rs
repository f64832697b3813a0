use crate::routes::{block_id_payload, RequestTable};

pub fn register(table: &mut RequestTable) {
    table.register("user", "get_configured", Some("users"), true, None, block_id_payload);
}
