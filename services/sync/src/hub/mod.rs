pub mod client;
pub mod identity;
pub mod models;
