pub mod coordinator;
pub mod effects;
pub mod templating;
pub mod validator;
