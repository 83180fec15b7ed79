/*
 *  display/traits.rs
 *
 *  ledmap - aviation weather on an LED matrix
 *  (c) 2020-26 Stuart Hunter
 *
 *  Core trait definitions for LED panel abstraction
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

use crate::display::error::DisplayError;
use crate::display::framebuffer::DisplayFrame;

/// Panel capabilities and metadata
#[derive(Debug, Clone, PartialEq)]
pub struct PanelCapabilities {
    /// Total width in pixels (cols x chain length)
    pub width: u32,

    /// Total height in pixels (rows x parallel chains)
    pub height: u32,

    /// Whether the panel supports brightness control
    pub supports_brightness: bool,
}

/// Minimal hardware abstraction - every LED panel backend implements this
///
/// The map never assumes a resolution beyond what `capabilities` reports.
/// Pixels are composed off-panel in a [`DisplayFrame`]; the panel only ever
/// receives complete frames through `show`.
pub trait PanelDriver {
    /// Returns the capabilities of this panel
    fn capabilities(&self) -> &PanelCapabilities;

    /// Returns the panel dimensions as (width, height)
    fn dimensions(&self) -> (u32, u32) {
        let caps = self.capabilities();
        (caps.width, caps.height)
    }

    /// Initialize the panel hardware
    fn init(&mut self) -> Result<(), DisplayError>;

    /// Set global brightness in percent (0-100)
    ///
    /// Applied by the device, not per pixel.
    fn set_brightness(&mut self, percent: u8) -> Result<(), DisplayError>;

    /// Latch a complete frame onto the panel
    fn show(&mut self, frame: &DisplayFrame) -> Result<(), DisplayError>;

    /// Blank the panel
    fn clear(&mut self) -> Result<(), DisplayError>;
}

impl<T: PanelDriver + ?Sized> PanelDriver for Box<T> {
    fn capabilities(&self) -> &PanelCapabilities {
        (**self).capabilities()
    }

    fn init(&mut self) -> Result<(), DisplayError> {
        (**self).init()
    }

    fn set_brightness(&mut self, percent: u8) -> Result<(), DisplayError> {
        (**self).set_brightness(percent)
    }

    fn show(&mut self, frame: &DisplayFrame) -> Result<(), DisplayError> {
        (**self).show(frame)
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        (**self).clear()
    }
}
