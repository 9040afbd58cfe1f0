//! Authorization: page permission masks and the gate in front of protected routes.
//!
//! - Capabilities are a 4-bit CRUD mask per (user, page)
//! - A per-user override replaces the role default for that page
//! - Every check re-resolves from the store; nothing is cached

mod gate;
mod mask;
mod resolver;

pub use gate::{authorize, Authorized, Denial, PageRequirement, SettingsRead, SettingsUpdate, UsersRead, UsersUpdate};
pub use mask::{Level, PermMask};
pub use resolver::{resolve_mask, EffectivePermissionResolver};

/// Well-known page slugs
pub mod pages {
    pub const DASHBOARD: &str = "dashboard";
    pub const REPORTS: &str = "reports";
    pub const USERS: &str = "users";
    pub const SETTINGS: &str = "settings";
}

/// Well-known role slugs
pub mod roles {
    pub const ADMIN: &str = "admin";
    pub const VIEWER: &str = "viewer";
}
