// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the climate hub.
//!
//! Device I/O faults ([`TransportError`]) are recovered locally by the poller.
//! Command faults are surfaced to the requesting client. Discovery faults
//! ([`DiscoveryError`]) are logged and turned into an empty scan result.

use thiserror::Error;

use crate::types::MacAddress;

/// The main error type for this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A device I/O operation failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The broadcast discovery sweep failed.
    #[error("discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    /// A parameter value was rejected.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// No device with this hardware address is known.
    #[error("device {0} not found")]
    DeviceNotFound(String),

    /// The parameter is unknown, read-only, or outside the device's capability set.
    #[error("parameter '{parameter}' is not supported by device {mac}")]
    UnsupportedParameter {
        /// The device the request targeted.
        mac: MacAddress,
        /// The offending parameter name.
        parameter: String,
    },

    /// A client sent something that could not be understood.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// Writing to the device, or reading back its state, failed.
    #[error("command to device {mac} failed: {source}")]
    DeviceCommandFailed {
        /// The device the command targeted.
        mac: MacAddress,
        /// The underlying transport fault.
        #[source]
        source: TransportError,
    },
}

impl Error {
    /// Returns `true` if the error was caused by client input rather than a device.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Value(_)
                | Self::DeviceNotFound(_)
                | Self::UnsupportedParameter { .. }
                | Self::MalformedRequest(_)
        )
    }
}

/// Errors raised by a device handle while talking to one device.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The device did not answer within the allotted time.
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// The device could not be reached at all.
    #[error("device unreachable: {0}")]
    Unreachable(String),

    /// The device answered with data that does not describe a valid state.
    #[error("invalid data from device: {0}")]
    InvalidData(String),

    /// The device answered but refused the request.
    #[error("request rejected by device: {0}")]
    Rejected(String),
}

impl TransportError {
    /// Builds a timeout error from a duration.
    #[must_use]
    pub fn timeout(after: std::time::Duration) -> Self {
        Self::Timeout(u64::try_from(after.as_millis()).unwrap_or(u64::MAX))
    }
}

/// Socket faults, including OS-level timeouts, mean the device could not be
/// reached. [`TransportError::Timeout`] is reserved for the engine's own
/// deadline, which knows its duration.
impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Unreachable(err.to_string())
    }
}

/// Errors raised by the broadcast discovery collaborator.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The broadcast socket could not be created or configured.
    #[error("failed to open broadcast socket: {0}")]
    Socket(#[source] std::io::Error),

    /// The probe could not be sent.
    #[error("failed to send probe: {0}")]
    Send(#[source] std::io::Error),

    /// Receiving replies failed for a reason other than the sweep ending.
    #[error("failed to receive replies: {0}")]
    Receive(#[source] std::io::Error),
}

/// Errors related to value validation and constraints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A numeric value is outside the allowed range.
    #[error("{parameter} value {actual} is out of range [{min}, {max}]")]
    OutOfRange {
        /// The parameter being validated.
        parameter: &'static str,
        /// Minimum allowed value.
        min: i64,
        /// Maximum allowed value.
        max: i64,
        /// The actual value that was provided.
        actual: i64,
    },

    /// A value does not have the kind the parameter expects.
    #[error("{parameter} expects {expected}")]
    WrongKind {
        /// The parameter being validated.
        parameter: &'static str,
        /// Human readable description of the expected kind.
        expected: &'static str,
    },

    /// A string is not one of the parameter's allowed variants.
    #[error("invalid {parameter}: {value}")]
    InvalidVariant {
        /// The parameter being validated.
        parameter: &'static str,
        /// The rejected value.
        value: String,
    },

    /// A hardware address is not 12 hexadecimal digits.
    #[error("invalid hardware address: {0}")]
    InvalidMac(String),
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
