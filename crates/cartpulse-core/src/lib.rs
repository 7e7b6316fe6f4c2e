pub mod config;
pub mod event;
pub mod stats;
pub mod views;
pub mod window;
