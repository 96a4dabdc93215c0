pub mod reservation;
pub mod sweeper;
