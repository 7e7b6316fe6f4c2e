pub mod app;
pub mod error;
pub mod fanout;
pub mod routes;
pub mod state;
