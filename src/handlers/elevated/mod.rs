// handlers/elevated/mod.rs - Elevated handlers (admin / super_admin)
//
// Route groups are gated by role in `crate::app`. The gate only admits the
// caller; whether they may act on a particular target is decided by the
// service.

pub mod admin;
pub mod super_admin;
