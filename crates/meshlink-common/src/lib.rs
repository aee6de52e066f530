// Error types
pub mod error;
pub use error::{ConnectError, DaemonError, DisconnectError, ErrorCode, ResolveError, RunError};

// Core data types
pub mod types;
pub use types::{
    AuthKey, BinaryPaths, CommandResult, CommandSpec, InstallFlavor, PeerAddress, PlatformKind,
    SessionConfig,
};

// Configuration
pub mod config;
pub use config::{ElevationPolicy, MeshConfig};

// Status output model
pub mod status;
pub use status::{NodeStatus, StatusReport};
