pub mod auth;
pub mod departments;
pub mod dialogs;
pub mod organizations;
