pub mod calculator;
pub mod clock;
pub mod config;
pub mod error;
pub mod formatter;
pub mod logger;
pub mod models;
pub mod progress;
pub mod registry;
pub mod renderer;
pub mod scheduler;
