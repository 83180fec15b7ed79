/*
 *  geodata.rs
 *
 *  ledmap - aviation weather on an LED matrix
 *  (c) 2020-26 Stuart Hunter
 *
 *  GeoJSON region outlines
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

use std::fs;
use std::path::Path;

use log::debug;
use serde::Deserialize;

use crate::error::MapError;
use crate::region::Ring;

/// `[lon, lat]` or `[lon, lat, alt]`
type Position = Vec<f64>;

#[derive(Debug, Clone, Deserialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub properties: Option<Properties>,
    #[serde(default)]
    pub geometry: Option<Geometry>,
}

/// Only the name is used; census files carry more
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Properties {
    #[serde(rename = "NAME", alias = "name", default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    LineString { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    #[serde(other)]
    Unsupported,
}

impl Geometry {
    /// Every ring, in file order, as (lon, lat) pairs
    pub fn rings(&self) -> Vec<Ring> {
        let to_ring = |line: &Vec<Position>| -> Option<Ring> {
            let pts: Vec<(f64, f64)> = line
                .iter()
                .filter(|p| p.len() >= 2)
                .map(|p| (p[0], p[1]))
                .collect();
            Ring::new(pts)
        };

        match self {
            Geometry::Polygon { coordinates } | Geometry::MultiLineString { coordinates } =>
                coordinates.iter().filter_map(to_ring).collect(),
            Geometry::MultiPolygon { coordinates } =>
                coordinates.iter().flatten().filter_map(to_ring).collect(),
            Geometry::LineString { coordinates } =>
                to_ring(coordinates).into_iter().collect(),
            Geometry::Unsupported => Vec::new(),
        }
    }
}

impl Feature {
    pub fn name(&self) -> Option<&str> {
        self.properties.as_ref()?.name.as_deref()
    }
}

impl FeatureCollection {
    pub fn from_json(text: &str) -> Result<Self, MapError> {
        serde_json::from_str(text).map_err(|e| MapError::GeoData(format!("invalid GeoJSON: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self, MapError> {
        let text = fs::read_to_string(path)
            .map_err(|e| MapError::GeoData(format!("{}: {}", path.display(), e)))?;
        let fc = Self::from_json(&text)?;
        debug!("Loaded {} features from {}", fc.features.len(), path.display());
        Ok(fc)
    }

    /// Rings of every feature whose NAME matches, case-insensitively
    pub fn rings_named(&self, name: &str) -> Option<Vec<Ring>> {
        let rings: Vec<Ring> = self
            .features
            .iter()
            .filter(|f| f.name().is_some_and(|n| n.eq_ignore_ascii_case(name)))
            .filter_map(|f| f.geometry.as_ref())
            .flat_map(Geometry::rings)
            .collect();
        if rings.is_empty() { None } else { Some(rings) }
    }

    /// Rings of all features
    pub fn all_rings(&self) -> Vec<Ring> {
        self.features
            .iter()
            .filter_map(|f| f.geometry.as_ref())
            .flat_map(Geometry::rings)
            .collect()
    }
}
