mod crud;
mod helpers;
mod prelude;
mod runs;

pub use crud::{
    create_workflow, delete_workflow, get_workflow, list_workflows, toggle_workflow,
    update_workflow,
};
pub use runs::{get_run, list_runs, list_runs_for_workflow};
