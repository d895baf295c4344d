pub mod manager_state;
pub mod paths;

pub use manager_state::{ManagerSnapshot, ManagerStateStore};
pub use paths::SystemPaths;
