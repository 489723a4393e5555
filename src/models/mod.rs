pub mod event;
pub mod workflow;
pub mod workflow_run;
