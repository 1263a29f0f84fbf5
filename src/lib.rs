pub mod app;
pub mod audio;
pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod library;
pub mod logging;
pub mod model;
pub mod playlist;
pub mod sync;
pub mod ui;
