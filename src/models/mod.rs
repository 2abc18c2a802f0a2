pub mod auth;
pub mod dialog;
pub mod session;
pub mod tenancy;
