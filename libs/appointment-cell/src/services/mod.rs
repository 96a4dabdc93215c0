pub mod appointments;
pub mod conflict;
