pub mod engine;
pub mod engine_async;
pub mod evaluate;
pub mod report;
pub mod snapshot;
pub mod spec;
pub mod transport;
pub mod types;
