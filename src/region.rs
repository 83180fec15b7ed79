/*
 *  region.rs
 *
 *  ledmap - aviation weather on an LED matrix
 *  (c) 2020-26 Stuart Hunter
 *
 *  Region selection: catalog, scale tables and resolved regions
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

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::config::DataPaths;
use crate::constants::{CONTINENTAL_REGION, CUSTOM_SCALE_KEY, DEFAULT_SCALE_KEY};
use crate::error::MapError;
use crate::geodata::FeatureCollection;
use crate::projection::{BoundingBox, ScaleProfile};

/// Closed sequence of (lon, lat) points; the last point equals the first.
#[derive(Debug, Clone, PartialEq)]
pub struct Ring {
    points: Vec<(f64, f64)>,
}

impl Ring {
    /// Close the ring if the source left it open; None when empty
    pub fn new(mut points: Vec<(f64, f64)>) -> Option<Self> {
        let first = *points.first()?;
        if points.len() > 1 && points.last() != Some(&first) {
            points.push(first);
        }
        Some(Self { points })
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }
}

/// A user defined area: its own outline and airport list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomLayout {
    pub name: String,
    /// [lon, lat] pairs
    pub outline: Vec<[f64; 2]>,
    pub airports: Vec<String>,
    #[serde(default)]
    pub scale: Option<ScaleProfile>,
}

/// What a rotation entry refers to, resolved once per activation
#[derive(Debug, Clone, PartialEq)]
pub enum Region {
    /// A state or other named polygon from the region shapes file
    Named(String),
    /// The continental outline, clipped to the lower 48
    ContinentalCountry,
    Custom(CustomLayout),
}

/// A region ready to draw: outline rings, airports and scale.
#[derive(Debug, Clone, PartialEq)]
pub struct GeographicRegion {
    pub region: Region,
    /// Title card text
    pub title: String,
    pub rings: Vec<Ring>,
    pub airports: Vec<String>,
    pub profile: ScaleProfile,
}

impl GeographicRegion {
    pub fn is_continental(&self) -> bool {
        matches!(self.region, Region::ContinentalCountry)
    }

    /// Box over every ring point, before any clipping
    pub fn raw_bbox(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(self.rings.iter().flat_map(|r| r.points().iter().copied()))
    }
}

/// Region to airport lists, custom layouts and outline aliases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionCatalog {
    /// Region name -> station codes
    pub regions: BTreeMap<String, Vec<String>>,
    /// Stations for the continental view; empty means all regions combined
    pub continental: Vec<String>,
    pub custom: Vec<CustomLayout>,
    /// Draw another region's outline, e.g. WASHINGTON D.C. -> MARYLAND
    pub aliases: BTreeMap<String, String>,
}

fn key(name: &str) -> String {
    name.trim().to_uppercase()
}

impl RegionCatalog {
    pub fn from_yaml(text: &str) -> Result<Self, MapError> {
        serde_yaml::from_str(text).map_err(|e| MapError::GeoData(format!("region catalog: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self, MapError> {
        let text = fs::read_to_string(path)
            .map_err(|e| MapError::GeoData(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&text)
    }

    /// Classify a rotation entry
    pub fn parse(&self, name: &str) -> Region {
        let k = key(name);
        if k == CONTINENTAL_REGION {
            return Region::ContinentalCountry;
        }
        if let Some(layout) = self.custom.iter().find(|c| key(&c.name) == k) {
            return Region::Custom(layout.clone());
        }
        if k == CUSTOM_SCALE_KEY {
            if let Some(layout) = self.custom.first() {
                return Region::Custom(layout.clone());
            }
        }
        Region::Named(k)
    }

    /// Outline to draw for a named region
    pub fn outline_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases
            .iter()
            .find(|(alias, _)| key(alias) == key(name))
            .map(|(_, target)| target.as_str())
            .unwrap_or(name)
    }

    /// Airports for a named region, falling back to its alias target
    pub fn airports(&self, name: &str) -> Option<&[String]> {
        let lookup = |n: &str| {
            self.regions
                .iter()
                .find(|(r, _)| key(r) == key(n))
                .map(|(_, v)| v.as_slice())
                .filter(|v| !v.is_empty())
        };
        lookup(name).or_else(|| lookup(self.outline_name(name)))
    }

    pub fn continental_airports(&self) -> Vec<String> {
        if !self.continental.is_empty() {
            return self.continental.clone();
        }
        let all: BTreeSet<&String> = self.regions.values().flatten().collect();
        all.into_iter().cloned().collect()
    }
}

/// Square and rectangular per-region scale offsets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleTable {
    /// Used when width == height
    pub square: BTreeMap<String, [f64; 2]>,
    pub rect: BTreeMap<String, [f64; 2]>,
}

impl ScaleTable {
    pub fn from_yaml(text: &str) -> Result<Self, MapError> {
        serde_yaml::from_str(text).map_err(|e| MapError::GeoData(format!("scale table: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self, MapError> {
        let text = fs::read_to_string(path)
            .map_err(|e| MapError::GeoData(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&text)
    }

    /// First of `names` present in the table for this panel shape,
    /// else DEFAULT, else no padding.
    pub fn profile_for(&self, names: &[&str], width: u32, height: u32) -> ScaleProfile {
        let table = if width == height { &self.square } else { &self.rect };
        let find = |n: &str| {
            table
                .iter()
                .find(|(k, _)| key(k) == key(n))
                .map(|(_, v)| ScaleProfile::new(v[0], v[1]))
        };
        if let Some(p) = names.iter().find_map(|n| find(n)) {
            return p;
        }
        warn!("No scale profile for {:?} on {}x{}, using {}", names, width, height, DEFAULT_SCALE_KEY);
        find(DEFAULT_SCALE_KEY).unwrap_or_default()
    }
}

/// Static map inputs, loaded once at startup.
#[derive(Debug, Clone)]
pub struct MapData {
    pub catalog: RegionCatalog,
    pub scales: ScaleTable,
    pub shapes: FeatureCollection,
    pub continental: Option<FeatureCollection>,
}

impl MapData {
    pub fn load(paths: &DataPaths) -> Result<Self, MapError> {
        let continental = if paths.continental_shape.exists() {
            Some(FeatureCollection::load(&paths.continental_shape)?)
        } else {
            debug!("No continental outline at {}", paths.continental_shape.display());
            None
        };
        Ok(Self {
            catalog: RegionCatalog::load(&paths.catalog)?,
            scales: ScaleTable::load(&paths.scale_profiles)?,
            shapes: FeatureCollection::load(&paths.region_shapes)?,
            continental,
        })
    }

    /// Look a rotation entry up; unknown names fail here, before any drawing
    pub fn resolve(&self, name: &str, width: u32, height: u32) -> Result<GeographicRegion, MapError> {
        let region = self.catalog.parse(name);
        let (title, rings, airports, profile) = match &region {
            Region::Named(n) => {
                let outline = self.catalog.outline_name(n);
                let rings = self
                    .shapes
                    .rings_named(outline)
                    .ok_or_else(|| MapError::UnknownRegion(n.clone()))?;
                let airports = self
                    .catalog
                    .airports(n)
                    .ok_or_else(|| MapError::MissingAirports(n.clone()))?
                    .to_vec();
                let profile = self.scales.profile_for(&[n.as_str(), outline], width, height);
                (n.clone(), rings, airports, profile)
            }
            Region::ContinentalCountry => {
                let rings = self
                    .continental
                    .as_ref()
                    .map(FeatureCollection::all_rings)
                    .filter(|r| !r.is_empty())
                    .ok_or_else(|| MapError::UnknownRegion(CONTINENTAL_REGION.to_string()))?;
                let airports = self.catalog.continental_airports();
                let profile = self.scales.profile_for(&[CONTINENTAL_REGION], width, height);
                (CONTINENTAL_REGION.to_string(), rings, airports, profile)
            }
            Region::Custom(layout) => {
                let pts = layout.outline.iter().map(|p| (p[0], p[1])).collect();
                let rings: Vec<Ring> = Ring::new(pts).into_iter().collect();
                let profile = layout.scale.unwrap_or_else(|| {
                    self.scales.profile_for(&[layout.name.as_str(), CUSTOM_SCALE_KEY], width, height)
                });
                (layout.name.clone(), rings, layout.airports.clone(), profile)
            }
        };

        if rings.is_empty() {
            return Err(MapError::UnknownRegion(title));
        }
        if airports.is_empty() {
            return Err(MapError::MissingAirports(title));
        }

        Ok(GeographicRegion { region, title, rings, airports, profile })
    }
}
