pub mod busy;
pub mod queue;
pub mod worker;
