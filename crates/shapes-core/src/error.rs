// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for transports and sessions.

use crate::model::InstanceHandle;
use thiserror::Error;

/// Highest DDS domain id accepted (RTPS port formula limit).
pub const MAX_DOMAIN_ID: u32 = 232;

/// Failures reported by a pub/sub transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Domain ID {0} out of range (0-232)")]
    InvalidDomainId(u32),

    #[error("Instance {0} is not registered on this endpoint")]
    UnknownInstance(InstanceHandle),

    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transport closed")]
    Closed,
}

/// Fatal errors that end a publisher or subscriber session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Display error: {0}")]
    Display(#[source] std::io::Error),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = TransportError::InvalidDomainId(300);
        assert_eq!(err.to_string(), "Domain ID 300 out of range (0-232)");

        let err = TransportError::UnknownInstance(InstanceHandle(7));
        assert!(err.to_string().contains("#7"));

        let err: SessionError = TransportError::Closed.into();
        assert_eq!(err.to_string(), "Transport error: Transport closed");
    }
}
