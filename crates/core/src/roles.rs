//! Well-known role name constants.
//!
//! These are the values carried in the `role` claim of access tokens.

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_MANAGER: &str = "manager";
pub const ROLE_ENGINEER: &str = "engineer";
pub const ROLE_USER: &str = "user";

/// Whether `role` may triage requests and move project hours.
pub fn can_manage_hours(role: &str) -> bool {
    role == ROLE_ADMIN || role == ROLE_MANAGER
}
