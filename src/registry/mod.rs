pub mod actions;
pub mod triggers;
