//! Role tiers and the rules deciding who may act on whom.
//!
//! Everything here is pure: callers load the actor and target first and
//! then ask whether the mutation is allowed. A `Denial` carries the status
//! class and the client-facing message.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    StandardUser,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::SuperAdmin, Role::Admin, Role::StandardUser];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Admin => "admin",
            Role::StandardUser => "standard_user",
        }
    }

    pub fn tier(&self) -> u8 {
        match self {
            Role::SuperAdmin => 3,
            Role::Admin => 2,
            Role::StandardUser => 1,
        }
    }

    /// Admin and super_admin both count as privileged.
    pub fn is_privileged(&self) -> bool {
        self.tier() >= Role::Admin.tier()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("Invalid role")]
    UnknownRole(String),
}

impl FromStr for Role {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "super_admin" => Ok(Role::SuperAdmin),
            "admin" => Ok(Role::Admin),
            "standard_user" => Ok(Role::StandardUser),
            other => Err(PolicyError::UnknownRole(other.to_string())),
        }
    }
}

/// The authenticated user performing an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: i64,
    pub role: Role,
}

/// The user an action is performed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub id: i64,
    pub role: Role,
}

impl Actor {
    fn is(&self, target: &Target) -> bool {
        self.id == target.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialKind {
    /// The request can never succeed for this caller (self-targeted irreversible action).
    BadRequest,
    /// The caller's tier does not allow the action.
    Forbidden,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    pub kind: DenialKind,
    pub message: &'static str,
}

impl Denial {
    fn forbidden(message: &'static str) -> Self {
        Self { kind: DenialKind::Forbidden, message }
    }

    fn bad_request(message: &'static str) -> Self {
        Self { kind: DenialKind::BadRequest, message }
    }
}

pub type Decision = Result<(), Denial>;

/// Which users a listing may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleFilter {
    All,
    Only(Role),
}

impl RoleFilter {
    pub fn matches(&self, role: Role) -> bool {
        match self {
            RoleFilter::All => true,
            RoleFilter::Only(r) => *r == role,
        }
    }
}

/// Which users a search may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    Everyone,
    Role(Role),
    SelfOnly(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardScope {
    StandardUsersOnly,
    AllUsers,
}

/// Route-level gate: the caller's role must be one of `allowed`.
pub fn require_any(role: Role, allowed: &[Role]) -> Decision {
    if allowed.contains(&role) {
        Ok(())
    } else {
        Err(Denial::forbidden("You do not have permission to access this resource"))
    }
}

/// True when an admin would be acting on someone of its own tier or above.
fn admin_reaches_up(actor: &Actor, target_role: Role) -> bool {
    actor.role == Role::Admin && target_role.is_privileged()
}

pub fn can_create(actor: &Actor, new_role: Role) -> Decision {
    match actor.role {
        Role::Admin if new_role != Role::StandardUser => {
            Err(Denial::forbidden("Admins can only create standard_user accounts"))
        }
        Role::Admin => Ok(()),
        Role::SuperAdmin if new_role == Role::SuperAdmin => {
            Err(Denial::forbidden("Cannot create another super_admin account"))
        }
        Role::SuperAdmin => Ok(()),
        Role::StandardUser => Err(Denial::forbidden("Insufficient permissions to create users")),
    }
}

pub fn can_update(actor: &Actor, target: &Target) -> Decision {
    match actor.role {
        Role::StandardUser => Err(Denial::forbidden("Insufficient permissions to update users")),
        _ if admin_reaches_up(actor, target.role) => {
            Err(Denial::forbidden("Cannot update admin or super_admin users"))
        }
        Role::SuperAdmin if target.role == Role::SuperAdmin && !actor.is(target) => {
            Err(Denial::forbidden("Cannot update other super_admin users"))
        }
        _ => Ok(()),
    }
}

/// A privileged user editing their own record through an admin route may
/// change profile fields but may not switch their own account off.
pub fn can_self_update(actor: &Actor, target: &Target, is_active: Option<bool>) -> Decision {
    if actor.is(target) && is_active == Some(false) {
        return Err(Denial::bad_request("Cannot deactivate yourself"));
    }
    Ok(())
}

/// Only the role gate; checked before the target is loaded.
pub fn can_change_roles(actor: &Actor) -> Decision {
    if actor.role == Role::SuperAdmin {
        Ok(())
    } else {
        Err(Denial::forbidden("Only super admins can change roles"))
    }
}

pub fn can_change_role(actor: &Actor, target: &Target, new_role: Role) -> Decision {
    can_change_roles(actor)?;
    if actor.is(target) {
        return Err(Denial::bad_request("You cannot change your own role"));
    }
    if target.role == Role::SuperAdmin {
        return Err(Denial::forbidden("Cannot change role of another super admin"));
    }
    if new_role == Role::SuperAdmin {
        return Err(Denial::forbidden("Cannot grant super_admin role"));
    }
    Ok(())
}

pub fn can_deactivate(actor: &Actor, target: &Target) -> Decision {
    if actor.is(target) {
        return Err(Denial::bad_request("Cannot deactivate yourself"));
    }
    match actor.role {
        Role::StandardUser => Err(Denial::forbidden("Insufficient permissions to deactivate users")),
        _ if admin_reaches_up(actor, target.role) => {
            Err(Denial::forbidden("Cannot deactivate admin or super_admin users"))
        }
        Role::SuperAdmin if target.role == Role::SuperAdmin => {
            Err(Denial::forbidden("Cannot deactivate other super_admin users"))
        }
        _ => Ok(()),
    }
}

pub fn can_activate(actor: &Actor, target: &Target) -> Decision {
    match actor.role {
        Role::StandardUser => Err(Denial::forbidden("Insufficient permissions to activate users")),
        _ if admin_reaches_up(actor, target.role) => {
            Err(Denial::forbidden("Cannot activate admin or super_admin users"))
        }
        _ => Ok(()),
    }
}

pub fn can_reset_password(actor: &Actor, target: &Target) -> Decision {
    match actor.role {
        Role::StandardUser => Err(Denial::forbidden("Insufficient permissions to reset passwords")),
        _ if admin_reaches_up(actor, target.role) => Err(Denial::forbidden(
            "Cannot reset password for admin or super_admin users",
        )),
        Role::SuperAdmin if target.role == Role::SuperAdmin && !actor.is(target) => Err(
            Denial::forbidden("Cannot reset password for other super_admin users"),
        ),
        _ => Ok(()),
    }
}

pub fn listing_scope(actor: &Actor, requested: RoleFilter) -> Result<RoleFilter, Denial> {
    match actor.role {
        Role::SuperAdmin => Ok(requested),
        Role::Admin if requested == RoleFilter::Only(Role::StandardUser) => Ok(requested),
        Role::Admin => Err(Denial::forbidden("Admins can only access standard users")),
        Role::StandardUser => Err(Denial::forbidden("Insufficient permissions")),
    }
}

pub fn search_scope(actor: &Actor) -> SearchScope {
    match actor.role {
        Role::SuperAdmin => SearchScope::Everyone,
        Role::Admin => SearchScope::Role(Role::StandardUser),
        Role::StandardUser => SearchScope::SelfOnly(actor.id),
    }
}

pub fn dashboard_scope(actor: &Actor) -> Result<DashboardScope, Denial> {
    match actor.role {
        Role::SuperAdmin => Ok(DashboardScope::AllUsers),
        Role::Admin => Ok(DashboardScope::StandardUsersOnly),
        Role::StandardUser => Err(Denial::forbidden("Access denied")),
    }
}
