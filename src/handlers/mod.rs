//! Built-in route registrations, one module per domain.

mod area;
mod control;
mod output;
mod system;
mod tstat;
mod user;
mod zone;

use crate::routes::RequestTable;

/// Populate `table` with every route the kernel ships with. Hosts that
/// need panel commands beyond these can call [`RequestTable::register`]
/// directly with their own builder.
pub fn register_builtin_routes(table: &mut RequestTable) {
    control::register(table);
    system::register(table);
    area::register(table);
    zone::register(table);
    output::register(table);
    tstat::register(table);
    user::register(table);
}
