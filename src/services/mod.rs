pub mod auth;
pub mod department_service;
pub mod tenancy_service;
pub mod token;
