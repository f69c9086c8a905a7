mod backend;
mod conversation;
mod error;
mod event;
mod message;
mod model;
mod prompts;
mod role;
mod session;
mod slash_commands;
mod storage;

pub use backend::*;
pub use conversation::*;
pub use error::*;
pub use event::*;
pub use message::*;
pub use model::*;
pub use prompts::*;
pub use role::*;
pub use session::*;
pub use slash_commands::*;
pub use storage::*;
