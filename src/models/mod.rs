pub mod profile;
pub mod rbac;
pub mod user;
