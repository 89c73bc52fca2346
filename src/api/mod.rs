//! API handlers for Book Journey REST endpoints

pub mod bestsellers;
pub mod health;
pub mod openapi;
