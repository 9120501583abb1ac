pub mod activity;
pub mod commands;
pub mod config;
pub mod filter;
pub mod logging;
pub mod models;
pub mod scheduler;
pub mod settings;
pub mod state;
pub mod storage;
pub mod task;
pub mod transfer;

pub use commands::{AppContext, CommandResult};
pub use config::Config;
pub use models::{ActivityAction, ActivityEntry, AppSettings, Priority, Task, TaskId};
pub use state::{TaskStore, ViewState};
pub use storage::Storage;
