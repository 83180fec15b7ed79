/*
 *  display/plugin/loader.rs
 *
 *  ledmap - aviation weather on an LED matrix
 *  (c) 2020-26 Stuart Hunter
 *
 *  Finds and loads LED panel driver libraries
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

use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::ffi::c_char;
use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};
use log::{debug, info, warn};

use super::ffi::{
    LEDMAP_PLUGIN_ABI_VERSION_MAJOR, LEDMAP_PLUGIN_ABI_VERSION_MINOR, LEDMAP_PLUGIN_ABI_VERSION_PATCH,
    LEDMAP_PLUGIN_NAME_SIZE, LEDMAP_PLUGIN_PANEL_TYPE_SIZE, LEDMAP_PLUGIN_VERSION_SIZE, LedMapPluginVTable,
    PluginRegisterFn, c_buffer_to_string,
};
use crate::display::error::DisplayError;

/// Extra driver directories, in `PATH` list form
pub const DRIVER_PATH_ENV: &str = "LEDMAP_DRIVER_PATH";

const REGISTER_SYMBOL: &[u8] = b"ledmap_plugin_register\0";

#[derive(Debug, Clone)]
pub struct PluginMetadata {
    /// e.g. "ledmap rpi-rgb-led-matrix driver"
    pub name: String,
    pub version: String,
    /// e.g. "rgbmatrix"
    pub panel_type: String,
    pub abi_version: (u32, u32, u32),
}

/// A loaded driver library and its function table
pub struct LoadedPlugin {
    // keeps the vtable alive
    #[allow(dead_code)]
    library: Library,
    vtable: &'static LedMapPluginVTable,
    metadata: PluginMetadata,
}

impl LoadedPlugin {
    pub fn vtable(&self) -> &'static LedMapPluginVTable {
        self.vtable
    }

    pub fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }
}

/// "RGB-Matrix" and "rgb_matrix" name the same driver
fn normalize_panel_type(panel_type: &str) -> String {
    panel_type.trim().to_ascii_lowercase().replace('-', "_")
}

/// A `plugin` setting naming a file rather than a panel type
fn is_library_path(plugin: &str) -> bool {
    plugin.contains(std::path::MAIN_SEPARATOR) || plugin.contains('/') || plugin.ends_with(DLL_SUFFIX)
}

/// Accept any minor/patch of our major; a newer minor only loses features
pub fn check_abi(major: u32, minor: u32, patch: u32) -> Result<(), DisplayError> {
    if major != LEDMAP_PLUGIN_ABI_VERSION_MAJOR {
        return Err(DisplayError::InitializationFailed(format!(
            "Driver ABI {}.{}.{} does not match host {}.{}.{}",
            major, minor, patch,
            LEDMAP_PLUGIN_ABI_VERSION_MAJOR, LEDMAP_PLUGIN_ABI_VERSION_MINOR, LEDMAP_PLUGIN_ABI_VERSION_PATCH
        )));
    }
    if minor > LEDMAP_PLUGIN_ABI_VERSION_MINOR {
        warn!("Driver ABI {}.{} is newer than host {}.{}", major, minor,
            LEDMAP_PLUGIN_ABI_VERSION_MAJOR, LEDMAP_PLUGIN_ABI_VERSION_MINOR);
    }
    Ok(())
}

fn read_metadata(vtable: &LedMapPluginVTable) -> Result<PluginMetadata, DisplayError> {
    let (mut major, mut minor, mut patch) = (0u32, 0u32, 0u32);
    (vtable.abi_version)(&mut major, &mut minor, &mut patch);
    check_abi(major, minor, patch)?;

    let mut name: [c_char; LEDMAP_PLUGIN_NAME_SIZE] = [0; LEDMAP_PLUGIN_NAME_SIZE];
    let mut version: [c_char; LEDMAP_PLUGIN_VERSION_SIZE] = [0; LEDMAP_PLUGIN_VERSION_SIZE];
    let mut panel_type: [c_char; LEDMAP_PLUGIN_PANEL_TYPE_SIZE] = [0; LEDMAP_PLUGIN_PANEL_TYPE_SIZE];
    (vtable.plugin_info)(name.as_mut_ptr(), version.as_mut_ptr(), panel_type.as_mut_ptr());

    Ok(PluginMetadata {
        name: c_buffer_to_string(&name),
        version: c_buffer_to_string(&version),
        panel_type: c_buffer_to_string(&panel_type),
        abi_version: (major, minor, patch),
    })
}

pub struct PluginLoader;

impl PluginLoader {
    /// Driver directories, highest priority first: `$LEDMAP_DRIVER_PATH`
    /// entries, `drivers/` beside the binary, then the user and system
    /// library trees.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = std::env::var_os(DRIVER_PATH_ENV)
            .map(|v| std::env::split_paths(&v).collect())
            .unwrap_or_default();

        if let Some(dir) = std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf)) {
            paths.push(dir.join("drivers"));
        }
        if let Some(home) = dirs_next::home_dir() {
            paths.push(home.join(".local/lib/ledmap/drivers"));
        }
        paths.push(PathBuf::from("/usr/local/lib/ledmap/drivers"));
        paths.push(PathBuf::from("/usr/lib/ledmap/drivers"));
        paths
    }

    /// Library file name for a panel type on this platform,
    /// "rgbmatrix" -> libledmap_rgbmatrix.so on linux
    pub fn library_name(panel_type: &str) -> String {
        format!("{}ledmap_{}{}", DLL_PREFIX, normalize_panel_type(panel_type), DLL_SUFFIX)
    }

    /// First directory in `dirs` holding the driver for `panel_type`
    pub fn find_in(dirs: &[PathBuf], panel_type: &str) -> Option<PathBuf> {
        let name = Self::library_name(panel_type);
        let found = dirs.iter().map(|d| d.join(&name)).find(|p| p.is_file());
        match &found {
            Some(p) => debug!("Found driver at: {}", p.display()),
            None => debug!("No {} in {} driver directories", name, dirs.len()),
        }
        found
    }

    /// Load a driver library, fetch its vtable and check the ABI major
    /// version against ours.
    pub fn load_plugin<P: AsRef<Path>>(path: P) -> Result<LoadedPlugin, DisplayError> {
        let path = path.as_ref();
        info!("Loading panel driver from: {}", path.display());

        let library = unsafe {
            Library::new(path)
                .map_err(|e| DisplayError::InitializationFailed(format!("Failed to load library: {}", e)))?
        };

        let vtable_ptr = unsafe {
            let register: Symbol<PluginRegisterFn> = library
                .get(REGISTER_SYMBOL)
                .map_err(|e| DisplayError::InitializationFailed(format!("No registration function: {}", e)))?;
            register()
        };
        if vtable_ptr.is_null() {
            return Err(DisplayError::InitializationFailed("Driver registration returned null".into()));
        }
        let vtable: &'static LedMapPluginVTable = unsafe { &*vtable_ptr };

        let metadata = read_metadata(vtable)?;
        info!("Loaded driver: {} v{} ({})", metadata.name, metadata.version, metadata.panel_type);

        Ok(LoadedPlugin { library, vtable, metadata })
    }

    /// `plugin` is either a panel type looked up on the search path or a
    /// path to the driver library itself.
    pub fn load(plugin: &str) -> Result<LoadedPlugin, DisplayError> {
        if is_library_path(plugin) {
            return Self::load_plugin(plugin);
        }
        let path = Self::find_in(&Self::search_paths(), plugin).ok_or_else(|| {
            DisplayError::InitializationFailed(format!(
                "No {} for panel type '{}' (set {} to its directory)",
                Self::library_name(plugin), plugin, DRIVER_PATH_ENV
            ))
        })?;
        Self::load_plugin(path)
    }
}
