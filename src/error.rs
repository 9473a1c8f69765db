use thiserror::Error;

pub type Result<T> = std::result::Result<T, GrantWalkError>;

#[derive(Error, Debug)]
pub enum GrantWalkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Group store error: {0}")]
    GroupStore(String),

    #[error("Permission store error: {0}")]
    PermissionStore(String),

    #[error("Unknown permission owner: {0}")]
    UnknownOwner(String),

    #[error("Unknown permission activity: {owner}/{activity}")]
    UnknownActivity { owner: String, activity: String },

    #[error("Unknown target provider: {0}")]
    UnknownTargetProvider(String),

    #[error("Group traversal exceeded maximum depth {max_depth} at {principal}")]
    TraversalDepthExceeded { principal: String, max_depth: usize },
}
