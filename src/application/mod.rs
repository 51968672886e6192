//! Application wiring: settings, transports, orchestration and reporting

pub mod app;

pub use app::Application;
