pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod replay;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::{GateError, SessionError};
pub use services::{ProctoredSession, SessionEngine};
