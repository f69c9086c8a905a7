mod models;
mod orchestrator;
mod sessions;
mod store;

pub use models::*;
pub use orchestrator::*;
pub use sessions::*;
pub use store::*;
