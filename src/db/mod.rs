pub mod mock_workflow_repository;
pub mod postgres_workflow_repository;
pub mod workflow_repository;
