pub mod client;
pub mod models;
pub(crate) mod models_handler;
pub mod stream;
