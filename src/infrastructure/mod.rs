// Infrastructure module - background task bookkeeping
pub mod task_manager;

pub use task_manager::TaskManager;
