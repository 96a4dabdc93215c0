// libs/booking-cell/src/lib.rs
pub mod models;
pub mod services;
pub mod handlers;
pub mod router;

pub use services::reservation::ReservationService;
pub use services::sweeper::SweeperService;
