/*
 *  display/plugin/ffi.rs
 *
 *  ledmap - aviation weather on an LED matrix
 *  (c) 2020-26 Stuart Hunter
 *
 *  C ABI types for LED panel plugins
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

//! FFI types shared with panel plugins
//!
//! Everything here is `#[repr(C)]`; a plugin built against the same ABI
//! major version can be loaded by any host build.

use std::ffi::c_char;

use crate::config::PanelConfig;
use crate::display::error::DisplayError;
use crate::display::traits::PanelCapabilities;

/// Plugin ABI version
pub const LEDMAP_PLUGIN_ABI_VERSION_MAJOR: u32 = 1;
pub const LEDMAP_PLUGIN_ABI_VERSION_MINOR: u32 = 0;
pub const LEDMAP_PLUGIN_ABI_VERSION_PATCH: u32 = 0;

pub const LEDMAP_ERROR_MESSAGE_SIZE: usize = 256;

pub const LEDMAP_PLUGIN_NAME_SIZE: usize = 64;
pub const LEDMAP_PLUGIN_VERSION_SIZE: usize = 32;
pub const LEDMAP_PLUGIN_PANEL_TYPE_SIZE: usize = 32;
pub const LEDMAP_HARDWARE_MAPPING_SIZE: usize = 64;

/// Opaque handle to a plugin panel instance
#[repr(C)]
pub struct LedMapPanelHandle {
    _private: [u8; 0],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedMapErrorCode {
    Success = 0,
    ErrorGeneric = 1,
    ErrorInvalidArgument = 2,
    ErrorUnsupportedOperation = 3,
    /// GPIO / matrix driver failure
    ErrorCommunication = 4,
    ErrorInitialization = 5,
    ErrorFrameSize = 6,
    ErrorNullPointer = 7,
    /// Panic caught at the FFI boundary
    ErrorPanic = 8,
    ErrorAbiMismatch = 9,
}

#[repr(C)]
pub struct LedMapError {
    pub code: LedMapErrorCode,
    /// Null terminated
    pub message: [c_char; LEDMAP_ERROR_MESSAGE_SIZE],
}

/// Copy `s` into a fixed C buffer, truncating and null terminating
pub fn fill_c_buffer(buf: &mut [c_char], s: &str) {
    let len = s.len().min(buf.len().saturating_sub(1));
    for (dst, &b) in buf.iter_mut().zip(s.as_bytes()[..len].iter()) {
        *dst = b as c_char;
    }
    if let Some(end) = buf.get_mut(len) {
        *end = 0;
    }
}

/// Read a null terminated C buffer
pub fn c_buffer_to_string(buf: &[c_char]) -> String {
    let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    let bytes: Vec<u8> = buf[..len].iter().map(|&c| c as u8).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

impl LedMapError {
    pub fn new(code: LedMapErrorCode, message: &str) -> Self {
        let mut error = Self { code, message: [0; LEDMAP_ERROR_MESSAGE_SIZE] };
        fill_c_buffer(&mut error.message, message);
        error
    }

    pub fn success() -> Self {
        Self::new(LedMapErrorCode::Success, "")
    }

    pub fn message_str(&self) -> String {
        c_buffer_to_string(&self.message)
    }
}

impl Default for LedMapError {
    fn default() -> Self {
        Self::success()
    }
}

impl From<DisplayError> for LedMapError {
    fn from(error: DisplayError) -> Self {
        let code = match &error {
            DisplayError::UnsupportedOperation => LedMapErrorCode::ErrorUnsupportedOperation,
            DisplayError::Communication(_) => LedMapErrorCode::ErrorCommunication,
            DisplayError::InitializationFailed(_) => LedMapErrorCode::ErrorInitialization,
            DisplayError::InvalidConfiguration(_) | DisplayError::InvalidBrightness(_) =>
                LedMapErrorCode::ErrorInvalidArgument,
            DisplayError::FrameSizeMismatch { .. } => LedMapErrorCode::ErrorFrameSize,
            DisplayError::DrawingError(_) | DisplayError::Other(_) => LedMapErrorCode::ErrorGeneric,
        };
        Self::new(code, &error.to_string())
    }
}

impl From<LedMapError> for DisplayError {
    fn from(error: LedMapError) -> Self {
        let message = error.message_str();
        match error.code {
            LedMapErrorCode::Success => DisplayError::Other("No error".to_string()),
            LedMapErrorCode::ErrorUnsupportedOperation => DisplayError::UnsupportedOperation,
            LedMapErrorCode::ErrorCommunication => DisplayError::Communication(message),
            LedMapErrorCode::ErrorInitialization => DisplayError::InitializationFailed(message),
            LedMapErrorCode::ErrorInvalidArgument | LedMapErrorCode::ErrorFrameSize =>
                DisplayError::InvalidConfiguration(message),
            _ => DisplayError::Other(message),
        }
    }
}

/// Panel geometry and driver options passed to `create`
#[repr(C)]
pub struct LedMapPanelConfig {
    pub rows: u32,
    pub cols: u32,
    pub chain_length: u32,
    pub parallel: u32,
    /// Initial brightness, percent
    pub brightness: u8,
    pub gpio_slowdown: u32,
    /// e.g. "adafruit-hat", null terminated
    pub hardware_mapping: [c_char; LEDMAP_HARDWARE_MAPPING_SIZE],
}

impl LedMapPanelConfig {
    pub fn from_config(config: &PanelConfig, brightness: u8) -> Self {
        let mut hardware_mapping = [0; LEDMAP_HARDWARE_MAPPING_SIZE];
        fill_c_buffer(&mut hardware_mapping, &config.hardware_mapping);
        Self {
            rows: config.rows,
            cols: config.cols,
            chain_length: config.chain_length,
            parallel: config.parallel,
            brightness: brightness.min(100),
            gpio_slowdown: config.gpio_slowdown,
            hardware_mapping,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct LedMapPanelCapabilities {
    pub width: u32,
    pub height: u32,
    pub supports_brightness: bool,
}

impl From<&PanelCapabilities> for LedMapPanelCapabilities {
    fn from(caps: &PanelCapabilities) -> Self {
        Self { width: caps.width, height: caps.height, supports_brightness: caps.supports_brightness }
    }
}

impl From<LedMapPanelCapabilities> for PanelCapabilities {
    fn from(caps: LedMapPanelCapabilities) -> Self {
        Self { width: caps.width, height: caps.height, supports_brightness: caps.supports_brightness }
    }
}

/// Function table every plugin exports
#[repr(C)]
pub struct LedMapPluginVTable {
    pub abi_version: extern "C" fn(major: *mut u32, minor: *mut u32, patch: *mut u32),

    /// Buffers are LEDMAP_PLUGIN_NAME_SIZE, _VERSION_SIZE, _PANEL_TYPE_SIZE
    pub plugin_info: extern "C" fn(name: *mut c_char, version: *mut c_char, panel_type: *mut c_char),

    pub create: extern "C" fn(
        config: *const LedMapPanelConfig,
        handle: *mut *mut LedMapPanelHandle,
        error: *mut LedMapError,
    ) -> LedMapErrorCode,

    pub destroy: extern "C" fn(handle: *mut LedMapPanelHandle),

    pub capabilities: extern "C" fn(
        handle: *const LedMapPanelHandle,
        caps: *mut LedMapPanelCapabilities,
        error: *mut LedMapError,
    ) -> LedMapErrorCode,

    pub init: extern "C" fn(handle: *mut LedMapPanelHandle, error: *mut LedMapError) -> LedMapErrorCode,

    /// Percent, 0-100
    pub set_brightness: extern "C" fn(
        handle: *mut LedMapPanelHandle,
        percent: u8,
        error: *mut LedMapError,
    ) -> LedMapErrorCode,

    /// Latch a packed RGB888 frame, row major, `width * height * 3` bytes
    pub show: extern "C" fn(
        handle: *mut LedMapPanelHandle,
        rgb: *const u8,
        length: usize,
        width: u32,
        height: u32,
        error: *mut LedMapError,
    ) -> LedMapErrorCode,

    pub clear: extern "C" fn(handle: *mut LedMapPanelHandle, error: *mut LedMapError) -> LedMapErrorCode,
}

/// Each plugin exports:
/// ```c
/// const LedMapPluginVTable *ledmap_plugin_register(void);
/// ```
pub type PluginRegisterFn = extern "C" fn() -> *const LedMapPluginVTable;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_round_trip() {
        let long = "x".repeat(400);
        let e = LedMapError::new(LedMapErrorCode::ErrorGeneric, &long);
        assert_eq!(e.message_str().len(), LEDMAP_ERROR_MESSAGE_SIZE - 1);

        let d: DisplayError = LedMapError::new(LedMapErrorCode::ErrorCommunication, "gpio busy").into();
        assert!(matches!(d, DisplayError::Communication(m) if m == "gpio busy"));
    }

    #[test]
    fn test_panel_config_from_settings() {
        let cfg = PanelConfig { hardware_mapping: "regular".into(), ..Default::default() };
        let ffi = LedMapPanelConfig::from_config(&cfg, 250);
        assert_eq!(ffi.brightness, 100);
        assert_eq!(c_buffer_to_string(&ffi.hardware_mapping), "regular");
        assert_eq!((ffi.rows, ffi.cols), (cfg.rows, cfg.cols));
    }
}
