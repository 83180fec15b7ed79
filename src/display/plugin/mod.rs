/*
 *  display/plugin/mod.rs
 *
 *  ledmap - aviation weather on an LED matrix
 *  (c) 2020-26 Stuart Hunter
 *
 *  Runtime loaded LED panel drivers
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

//! Panel drivers loaded from shared libraries
//!
//! Matrix hardware (HUB75 hats, bonnets) is driven by a C ABI library so the
//! map binary builds and runs without the vendor matrix code present.
//!
//! ## Discovery
//!
//! The `panel.plugin` setting is either a library path or a panel type.
//! A panel type of `rgbmatrix` (or `RGB-Matrix`) looks for
//! `libledmap_rgbmatrix.so` in
//!
//! 1. each directory listed in `$LEDMAP_DRIVER_PATH`
//! 2. `drivers/` next to the ledmap binary
//! 3. `~/.local/lib/ledmap/drivers/`
//! 4. `/usr/local/lib/ledmap/drivers/`
//! 5. `/usr/lib/ledmap/drivers/`
//!
//! The library must export `ledmap_plugin_register`.

pub mod adapter;
pub mod ffi;
pub mod loader;

pub use adapter::PluginPanelAdapter;
pub use ffi::{LedMapError, LedMapErrorCode, LedMapPanelCapabilities, LedMapPanelConfig, LedMapPluginVTable};
pub use loader::{LoadedPlugin, PluginLoader};
