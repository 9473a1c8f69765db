pub mod cache;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod filter;
pub mod groups;
pub mod metrics;
pub mod policy;
pub mod services;
pub mod types;
pub mod warmer;

pub use error::{GrantWalkError, Result};
pub use config::Config;
pub use policy::AnyUnblockedGrantPolicy;
