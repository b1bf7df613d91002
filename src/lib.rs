pub mod cli;
pub mod command;
pub mod protocol;
pub mod storage;

pub use cli::{UserCommand, prompt, read_draft};
pub use command::{Command, CommandError};
pub use storage::{Article, ArticleId, ArticleStore};
