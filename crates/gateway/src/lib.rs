pub mod api;
pub mod cli;
pub mod connections;
pub mod server;
pub mod state;
