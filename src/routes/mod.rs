pub mod admin;
pub mod health;
pub mod pages;
pub mod profile;
pub mod roles;
