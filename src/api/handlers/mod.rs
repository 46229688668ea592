pub mod accounts;
pub mod auth;
pub mod emergency;
pub mod health;
pub mod root;
