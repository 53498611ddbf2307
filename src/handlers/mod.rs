// handlers/mod.rs - 3-Tier Handler Architecture
//
// Public (no auth) → Protected (bearer token + active user) → Elevated (admin / super_admin)
//
// Tier gates live in `crate::middleware` and are attached in `crate::app`;
// per-target rules (self vs. others, role tiers) are decided in the service.

pub mod elevated;
pub mod protected;
pub mod public;
