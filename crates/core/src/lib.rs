pub mod config;
pub mod error;

pub use config::{load_dotenv, WorkQueueConfig};
pub use error::*;
