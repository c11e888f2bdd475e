pub mod bot;
pub mod config;
pub mod error;
pub mod runtime;

pub use config::PeerConfig;
pub use error::PeerError;
pub use runtime::{Outcome, run};
