pub mod aggregate;
pub mod config;
pub mod display;
pub mod errors;
pub mod interrupt;
pub mod pipeline;
pub mod probe;
pub mod registry;
pub mod report;
pub mod runner;
pub mod runtime;
pub mod types;
