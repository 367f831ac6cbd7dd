//! # Error Types Module
//!
//! Centralized error handling for the ECG monitor.
//! Provides custom error types for each concern with proper context and error chaining.
//!
//! ## Error Types
//! - `ConfigError`: Configuration file I/O and parsing errors
//! - `LogError`: Log sink setup failures
//! - `SessionError`: Per-connection streaming failures on the server
//! - `ClientError`: Client connection and close-handshake failures
//! - `NotifyError`: A single notifier failed to deliver
//! - `ParseSeverityError`: Unknown severity name from config or flags
//!
//! ## Failure Scope
//! None of these is fatal to the process. A `SessionError` ends one session,
//! a `NotifyError` is contained by the composite notifier.

use std::fmt;

/// Errors that can occur during configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read config file
    ReadFailed(std::io::Error),
    /// Failed to write config file
    WriteFailed(std::io::Error),
    /// Failed to parse config file
    ParseFailed(toml::de::Error),
    /// Failed to serialize config
    SerializeFailed(toml::ser::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ReadFailed(e) => {
                write!(f, "Failed to read config file: {}", e)
            }
            ConfigError::WriteFailed(e) => {
                write!(f, "Failed to write config file: {}", e)
            }
            ConfigError::ParseFailed(e) => {
                write!(f, "Failed to parse config file: {}", e)
            }
            ConfigError::SerializeFailed(e) => {
                write!(f, "Failed to serialize config: {}", e)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadFailed(e) => Some(e),
            ConfigError::WriteFailed(e) => Some(e),
            ConfigError::ParseFailed(e) => Some(e),
            ConfigError::SerializeFailed(e) => Some(e),
        }
    }
}

/// Errors that can occur while setting up the general and alert log sinks
#[derive(Debug)]
pub enum LogError {
    /// Could not create the directory holding a log file
    CreateDir { path: String, source: std::io::Error },
    /// Could not open a log file for appending
    Open { path: String, source: std::io::Error },
}

impl fmt::Display for LogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogError::CreateDir { path, source } => {
                write!(f, "Failed to create log directory {}: {}", path, source)
            }
            LogError::Open { path, source } => {
                write!(f, "Failed to open log file {}: {}", path, source)
            }
        }
    }
}

impl std::error::Error for LogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LogError::CreateDir { source, .. } => Some(source),
            LogError::Open { source, .. } => Some(source),
        }
    }
}

/// Errors that end a single streaming session
#[derive(Debug)]
pub enum SessionError {
    /// Reading could not be serialized for the wire
    Encode(serde_json::Error),
    /// Writing a frame to the peer failed
    Write(String),
    /// Reading from the peer failed
    Read(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Encode(e) => write!(f, "Marshal error: {}", e),
            SessionError::Write(msg) => write!(f, "Write error: {}", msg),
            SessionError::Read(msg) => write!(f, "Read error: {}", msg),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Encode(e) => Some(e),
            _ => None,
        }
    }
}

/// Errors that can occur on the monitoring client
#[derive(Debug)]
pub enum ClientError {
    /// The configured address does not form a valid WebSocket URL
    InvalidAddress(String),
    /// Dialing the server failed
    Connect { url: String, reason: String },
    /// Sending the close frame failed
    CloseFailed(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::InvalidAddress(addr) => {
                write!(f, "Invalid server address: {}", addr)
            }
            ClientError::Connect { url, reason } => {
                write!(f, "Failed to connect to {}: {}", url, reason)
            }
            ClientError::CloseFailed(msg) => {
                write!(f, "Failed to send close frame: {}", msg)
            }
        }
    }
}

impl std::error::Error for ClientError {}

/// A notifier could not deliver its output
#[derive(Debug)]
pub enum NotifyError {
    Io(std::io::Error),
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifyError::Io(e) => write!(f, "Notifier output failed: {}", e),
        }
    }
}

impl std::error::Error for NotifyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NotifyError::Io(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for NotifyError {
    fn from(e: std::io::Error) -> Self {
        NotifyError::Io(e)
    }
}

/// Severity name was not one of `normal`, `warning`, `critical`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSeverityError(pub String);

impl fmt::Display for ParseSeverityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unknown severity '{}' (expected normal, warning or critical)",
            self.0
        )
    }
}

impl std::error::Error for ParseSeverityError {}
