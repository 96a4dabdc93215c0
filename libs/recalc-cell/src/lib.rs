// libs/recalc-cell/src/lib.rs
pub mod models;
pub mod services;
pub mod handlers;
pub mod router;

pub use services::busy::BusyIntervalService;
pub use services::queue::RecalcQueueService;
pub use services::worker::RecalcWorker;
