/*
 *  display/error.rs
 *
 *  ledmap - aviation weather on an LED matrix
 *  (c) 2020-26 Stuart Hunter
 *
 *  Unified error types for the panel subsystem
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::fmt;
use std::error::Error;

/// Unified error type for all panel operations
#[derive(Debug)]
pub enum DisplayError {
    /// Panel initialization failed
    InitializationFailed(String),

    /// Panel communication error (bus, GPIO, plugin transport)
    Communication(String),

    /// Invalid configuration
    InvalidConfiguration(String),

    /// Unsupported operation for this panel
    UnsupportedOperation,

    /// Brightness outside 0..=100
    InvalidBrightness(u8),

    /// Frame size does not match the panel
    FrameSizeMismatch { expected: (u32, u32), actual: (u32, u32) },

    /// Drawing operation failed
    DrawingError(String),

    /// Generic error with message
    Other(String),
}

impl fmt::Display for DisplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayError::InitializationFailed(msg) =>
                write!(f, "Panel initialization failed: {}", msg),
            DisplayError::Communication(msg) =>
                write!(f, "Panel communication error: {}", msg),
            DisplayError::InvalidConfiguration(msg) =>
                write!(f, "Invalid configuration: {}", msg),
            DisplayError::UnsupportedOperation =>
                write!(f, "Operation not supported by this panel"),
            DisplayError::InvalidBrightness(value) =>
                write!(f, "Invalid brightness: {} (must be 0..=100)", value),
            DisplayError::FrameSizeMismatch { expected, actual } =>
                write!(f, "Frame size mismatch: expected {}x{}, got {}x{}",
                    expected.0, expected.1, actual.0, actual.1),
            DisplayError::DrawingError(msg) =>
                write!(f, "Drawing error: {}", msg),
            DisplayError::Other(msg) =>
                write!(f, "{}", msg),
        }
    }
}

impl Error for DisplayError {}

impl From<std::io::Error> for DisplayError {
    fn from(err: std::io::Error) -> Self {
        DisplayError::Other(format!("I/O error: {}", err))
    }
}
