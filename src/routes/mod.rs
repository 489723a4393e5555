pub mod events;
pub mod registry;
pub mod workflows;
