/*
 *  display/plugin/adapter.rs
 *
 *  ledmap - aviation weather on an LED matrix
 *  (c) 2020-26 Stuart Hunter
 *
 *  PanelDriver over a loaded driver library
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

use std::panic::{self, AssertUnwindSafe};

use log::{debug, error};

use super::ffi::{LedMapError, LedMapErrorCode, LedMapPanelCapabilities, LedMapPanelConfig, LedMapPanelHandle};
use super::loader::LoadedPlugin;
use crate::config::PanelConfig;
use crate::display::error::DisplayError;
use crate::display::framebuffer::DisplayFrame;
use crate::display::traits::{PanelCapabilities, PanelDriver};

/// Bridges the C function table to [`PanelDriver`]. Every call is guarded
/// against panics unwinding out of the driver.
pub struct PluginPanelAdapter {
    plugin: LoadedPlugin,
    handle: *mut LedMapPanelHandle,
    capabilities: PanelCapabilities,
}

// SAFETY: the handle is only touched through the vtable and the adapter
// is owned by a single compositor.
unsafe impl Send for PluginPanelAdapter {}

impl PluginPanelAdapter {
    pub fn new(plugin: LoadedPlugin, config: &PanelConfig, brightness: u8) -> Result<Self, DisplayError> {
        let vtable = plugin.vtable();
        let ffi_config = LedMapPanelConfig::from_config(config, brightness);

        let mut handle: *mut LedMapPanelHandle = std::ptr::null_mut();
        let mut error = LedMapError::default();
        let (code, panicked) = catch_ffi_call(|| (vtable.create)(&ffi_config, &mut handle, &mut error));
        if let Some(e) = panicked {
            return Err(e.into());
        }
        if code != LedMapErrorCode::Success || handle.is_null() {
            return Err(error.into());
        }
        debug!("Created panel instance: {:p}", handle);

        let mut caps = LedMapPanelCapabilities::default();
        let (code, panicked) = catch_ffi_call(|| (vtable.capabilities)(handle, &mut caps, &mut error));
        if panicked.is_some() || code != LedMapErrorCode::Success {
            (vtable.destroy)(handle);
            return Err(panicked.unwrap_or(error).into());
        }

        let capabilities: PanelCapabilities = caps.into();
        if (capabilities.width, capabilities.height) != (config.width(), config.height()) {
            debug!(
                "Driver reports {}x{}, configured {}x{}",
                capabilities.width, capabilities.height, config.width(), config.height()
            );
        }

        Ok(Self { plugin, handle, capabilities })
    }

    pub fn plugin_name(&self) -> &str {
        &self.plugin.metadata().name
    }

    pub fn plugin_version(&self) -> &str {
        &self.plugin.metadata().version
    }

    fn call<F>(&mut self, f: F) -> Result<(), DisplayError>
    where
        F: FnOnce(*mut LedMapPanelHandle, &mut LedMapError) -> LedMapErrorCode,
    {
        let handle = self.handle;
        let mut error = LedMapError::default();
        let (code, panicked) = catch_ffi_call(|| f(handle, &mut error));
        if let Some(e) = panicked {
            return Err(e.into());
        }
        if code != LedMapErrorCode::Success {
            return Err(error.into());
        }
        Ok(())
    }
}

impl PanelDriver for PluginPanelAdapter {
    fn capabilities(&self) -> &PanelCapabilities {
        &self.capabilities
    }

    fn init(&mut self) -> Result<(), DisplayError> {
        let vtable = self.plugin.vtable();
        self.call(|h, e| (vtable.init)(h, e))
    }

    fn set_brightness(&mut self, percent: u8) -> Result<(), DisplayError> {
        if percent > 100 {
            return Err(DisplayError::InvalidBrightness(percent));
        }
        if !self.capabilities.supports_brightness {
            return Err(DisplayError::UnsupportedOperation);
        }
        let vtable = self.plugin.vtable();
        self.call(|h, e| (vtable.set_brightness)(h, percent, e))
    }

    fn show(&mut self, frame: &DisplayFrame) -> Result<(), DisplayError> {
        let expected = self.dimensions();
        let actual = frame.dimensions();
        if expected != actual {
            return Err(DisplayError::FrameSizeMismatch { expected, actual });
        }
        let rgb = frame.to_rgb_bytes();
        let vtable = self.plugin.vtable();
        self.call(|h, e| (vtable.show)(h, rgb.as_ptr(), rgb.len(), actual.0, actual.1, e))
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        let vtable = self.plugin.vtable();
        self.call(|h, e| (vtable.clear)(h, e))
    }
}

impl Drop for PluginPanelAdapter {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            debug!("Destroying panel instance: {:p}", self.handle);
            (self.plugin.vtable().destroy)(self.handle);
            self.handle = std::ptr::null_mut();
        }
    }
}

/// Run a driver call, turning a panic into `ErrorPanic` rather than
/// letting it unwind across the C boundary.
fn catch_ffi_call<F>(f: F) -> (LedMapErrorCode, Option<LedMapError>)
where
    F: FnOnce() -> LedMapErrorCode,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(code) => (code, None),
        Err(payload) => {
            let message = if let Some(s) = payload.downcast_ref::<&str>() {
                format!("Driver panic: {}", s)
            } else if let Some(s) = payload.downcast_ref::<String>() {
                format!("Driver panic: {}", s)
            } else {
                "Driver panic: unknown".to_string()
            };
            error!("Caught panic in panel driver call: {}", message);
            (LedMapErrorCode::ErrorPanic, Some(LedMapError::new(LedMapErrorCode::ErrorPanic, &message)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catch_ffi_call_success() {
        let (code, panicked) = catch_ffi_call(|| LedMapErrorCode::Success);
        assert_eq!(code, LedMapErrorCode::Success);
        assert!(panicked.is_none());
    }

    #[test]
    fn test_catch_ffi_call_panic() {
        let (code, panicked) = catch_ffi_call(|| panic!("matrix gone"));
        assert_eq!(code, LedMapErrorCode::ErrorPanic);
        let err = panicked.unwrap();
        assert!(err.message_str().contains("matrix gone"));
        let display: DisplayError = err.into();
        assert!(matches!(display, DisplayError::Other(_)));
    }
}
