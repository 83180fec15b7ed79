/*
 *  error.rs
 *
 *  ledmap - aviation weather on an LED matrix
 *  (c) 2020-26 Stuart Hunter
 *
 *  Crate level error type
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

use thiserror::Error;

use crate::config::ConfigError;
use crate::display::error::DisplayError;
use crate::metar::FeedError;

#[derive(Debug, Error)]
pub enum MapError {
    /// Zero extent bounding box or zero sized panel; aborts only that region
    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),
    #[error("Unknown region: {0}")]
    UnknownRegion(String),
    #[error("No airports listed for region {0}")]
    MissingAirports(String),
    #[error("No cached outline; a full render must run first")]
    NoCachedOutline,
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Display error: {0}")]
    Display(#[from] DisplayError),
    #[error("Geographic data error: {0}")]
    GeoData(String),
    #[error("Weather feed error: {0}")]
    Feed(#[from] FeedError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MapError {
    /// Errors that belong to one region's configuration or data; the
    /// rotation skips that region and carries on.
    pub fn is_region_error(&self) -> bool {
        matches!(
            self,
            MapError::DegenerateGeometry(_)
                | MapError::UnknownRegion(_)
                | MapError::MissingAirports(_)
                | MapError::GeoData(_)
        )
    }
}
