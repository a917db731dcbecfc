pub mod backend;
pub mod config;
pub mod controller;
pub mod detect;
pub mod error;
pub mod manifest;
pub mod server;
pub mod telemetry;
pub mod worker;
