//! Error types for ring membership, routing and configuration.

use crate::ring::Position;

/// Errors raised by ring operations.
///
/// Every variant is raised before the ring is mutated, so a failed
/// membership change leaves the topology exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RingError {
    /// A node already occupies this position
    DuplicatePosition { position: Position },
    /// Position is outside `[0, ring_size)`
    OutOfRange { position: Position, ring_size: u64 },
    /// Store or lookup issued against a ring with no nodes
    EmptyRing,
    /// The requested start node does not exist
    NodeNotFound { position: Position },
    /// Bit width outside the supported `1..=63`
    InvalidBitWidth { bits: u32 },
    /// Routing did not converge within the hop budget
    HopLimitExceeded { target: Position, hops: usize },
}

impl std::fmt::Display for RingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RingError::DuplicatePosition { position } => {
                write!(f, "Position {} is already occupied", position)
            }
            RingError::OutOfRange {
                position,
                ring_size,
            } => write!(
                f,
                "Position {} is outside the ring [0, {})",
                position, ring_size
            ),
            RingError::EmptyRing => write!(f, "Ring has no nodes"),
            RingError::NodeNotFound { position } => {
                write!(f, "No node at position {}", position)
            }
            RingError::InvalidBitWidth { bits } => {
                write!(f, "Bit width {} is not in 1..=63", bits)
            }
            RingError::HopLimitExceeded { target, hops } => write!(
                f,
                "Routing to position {} exceeded {} hops",
                target, hops
            ),
        }
    }
}

impl std::error::Error for RingError {}

/// Errors raised while loading settings.
#[derive(Debug)]
pub enum ConfigError {
    /// Settings file could not be read
    Io(std::io::Error),
    /// Settings file is not valid TOML for [`crate::config::Settings`]
    Parse(toml::de::Error),
    /// A value parsed but is not usable
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl From<RingError> for ConfigError {
    fn from(e: RingError) -> Self {
        ConfigError::Invalid(e.to_string())
    }
}
