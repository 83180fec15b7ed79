/*
 *  projection.rs
 *
 *  ledmap - aviation weather on an LED matrix
 *  (c) 2020-26 Stuart Hunter
 *
 *  Geographic to panel pixel projection
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

use embedded_graphics::prelude::Point;
use serde::{Deserialize, Serialize};

use crate::error::MapError;

/// Lat/lon extent of a region, degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Smallest box holding every (lon, lat) point; None when empty
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut it = points.into_iter();
        let (lon, lat) = it.next()?;
        let mut bbox = BoundingBox { min_lat: lat, max_lat: lat, min_lon: lon, max_lon: lon };
        for (lon, lat) in it {
            bbox.include(lon, lat);
        }
        Some(bbox)
    }

    pub fn include(&mut self, lon: f64, lat: f64) {
        self.min_lat = self.min_lat.min(lat);
        self.max_lat = self.max_lat.max(lat);
        self.min_lon = self.min_lon.min(lon);
        self.max_lon = self.max_lon.max(lon);
    }

    pub fn lat_extent(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn lon_extent(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    /// Grow all four sides by the profile offsets
    pub fn expand(&self, profile: &ScaleProfile) -> BoundingBox {
        BoundingBox {
            min_lat: self.min_lat - profile.y_offset,
            max_lat: self.max_lat + profile.y_offset,
            min_lon: self.min_lon - profile.x_offset,
            max_lon: self.max_lon + profile.x_offset,
        }
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }

    fn has_area(&self) -> bool {
        let (dl, dn) = (self.lat_extent(), self.lon_extent());
        dl.is_finite() && dn.is_finite() && dl > 0.0 && dn > 0.0
    }
}

/// Per region padding, degrees, applied before projection
///
/// Larger offsets squash the region along that axis; this is how a state's
/// aspect ratio is corrected for square vs. rectangular panels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScaleProfile {
    pub x_offset: f64,
    pub y_offset: f64,
}

impl ScaleProfile {
    pub fn new(x_offset: f64, y_offset: f64) -> Self {
        Self { x_offset, y_offset }
    }
}

/// Maps lat/lon onto a `width` x `height` panel, row 0 at the top.
#[derive(Debug, Clone, PartialEq)]
pub struct Projector {
    bounds: BoundingBox,
    width: u32,
    height: u32,
}

impl Projector {
    /// Validate the geometry once so `project` can never divide by zero
    pub fn new(bbox: &BoundingBox, profile: &ScaleProfile, width: u32, height: u32) -> Result<Self, MapError> {
        if width == 0 || height == 0 {
            return Err(MapError::DegenerateGeometry(format!("panel is {}x{}", width, height)));
        }
        if !bbox.has_area() {
            return Err(MapError::DegenerateGeometry(format!(
                "bounding box has zero extent (lat {:.4}..{:.4}, lon {:.4}..{:.4})",
                bbox.min_lat, bbox.max_lat, bbox.min_lon, bbox.max_lon
            )));
        }
        let bounds = bbox.expand(profile);
        if !bounds.has_area() {
            return Err(MapError::DegenerateGeometry(format!(
                "scale offsets ({}, {}) collapse the bounding box",
                profile.x_offset, profile.y_offset
            )));
        }
        Ok(Self { bounds, width, height })
    }

    /// The expanded box that maps onto the whole panel
    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Project to an integer pixel, truncating toward negative infinity.
    ///
    /// Points inside the expanded box always land on the panel; the far
    /// edges (max lon, min lat) are pulled onto the last column / row.
    /// Points outside are returned unclamped and clip at draw time.
    pub fn project(&self, lat: f64, lon: f64) -> Point {
        let (w, h) = (self.width as f64, self.height as f64);
        let b = &self.bounds;
        let x = ((lon - b.min_lon) * w / b.lon_extent()).floor();
        let y = (h - (lat - b.min_lat) * h / b.lat_extent()).floor();

        // `as` saturates on overflow and maps NaN to 0
        let (mut px, mut py) = (x as i32, y as i32);
        if b.contains(lat, lon) {
            px = px.clamp(0, self.width as i32 - 1);
            py = py.clamp(0, self.height as i32 - 1);
        }
        Point::new(px, py)
    }

    pub fn on_panel(&self, p: Point) -> bool {
        p.x >= 0 && p.y >= 0 && (p.x as u32) < self.width && (p.y as u32) < self.height
    }
}

/// One-shot projection for callers without a cached [`Projector`]
pub fn project(
    lat: f64,
    lon: f64,
    bbox: &BoundingBox,
    profile: &ScaleProfile,
    width: u32,
    height: u32,
) -> Result<Point, MapError> {
    Ok(Projector::new(bbox, profile, width, height)?.project(lat, lon))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> BoundingBox {
        BoundingBox { min_lat, max_lat, min_lon, max_lon }
    }

    #[test]
    fn test_corners_and_y_inversion() {
        let p = Projector::new(&bbox(0.0, 10.0, 0.0, 10.0), &ScaleProfile::default(), 64, 32).unwrap();
        // north west corner is the top left pixel
        assert_eq!(p.project(10.0, 0.0), Point::new(0, 0));
        // south east corner clamps onto the last pixel
        assert_eq!(p.project(0.0, 10.0), Point::new(63, 31));
        assert_eq!(p.project(5.0, 5.0), Point::new(32, 16));
        // higher latitude is a smaller row
        assert!(p.project(8.0, 5.0).y < p.project(2.0, 5.0).y);
    }

    #[test]
    fn test_profile_expands_box() {
        let profile = ScaleProfile::new(1.0, 2.0);
        let p = Projector::new(&bbox(30.0, 40.0, -110.0, -100.0), &profile, 64, 64).unwrap();
        assert_eq!(p.bounds(), &bbox(28.0, 42.0, -111.0, -99.0));
        // original box corner sits inside the panel, not on its edge
        let corner = p.project(40.0, -110.0);
        assert!(corner.x > 0 && corner.y > 0);
    }

    #[test]
    fn test_every_point_in_expanded_box_is_on_panel() {
        let profile = ScaleProfile::new(0.2, 0.4);
        for (w, h) in [(64u32, 32u32), (64, 64), (192, 128), (1, 1)] {
            let p = Projector::new(&bbox(36.99, 41.0, -109.05, -102.04), &profile, w, h).unwrap();
            let b = *p.bounds();
            let steps = 97;
            for i in 0..=steps {
                for j in 0..=steps {
                    let lat = (b.min_lat + b.lat_extent() * i as f64 / steps as f64).min(b.max_lat);
                    let lon = (b.min_lon + b.lon_extent() * j as f64 / steps as f64).min(b.max_lon);
                    let pt = p.project(lat, lon);
                    assert!(p.on_panel(pt), "({}, {}) -> {:?} on {}x{}", lat, lon, pt, w, h);
                }
            }
        }
    }

    #[test]
    fn test_degenerate_geometry_is_reported() {
        let single = bbox(39.0, 39.0, -105.0, -105.0);
        let err = Projector::new(&single, &ScaleProfile::default(), 64, 32).unwrap_err();
        assert!(matches!(err, MapError::DegenerateGeometry(_)));

        // offsets never rescue a zero extent box
        assert!(project(39.0, -105.0, &single, &ScaleProfile::new(1.0, 1.0), 64, 32).is_err());

        // a line of latitude has no height
        let flat = bbox(39.0, 39.0, -109.0, -102.0);
        assert!(Projector::new(&flat, &ScaleProfile::default(), 64, 32).is_err());

        // negative offsets that invert the box
        let ok = bbox(0.0, 1.0, 0.0, 1.0);
        assert!(Projector::new(&ok, &ScaleProfile::new(-0.5, 0.0), 64, 32).is_err());

        assert!(Projector::new(&ok, &ScaleProfile::default(), 0, 32).is_err());
    }

    #[test]
    fn test_outside_points_are_not_clamped() {
        let p = Projector::new(&bbox(0.0, 10.0, 0.0, 10.0), &ScaleProfile::default(), 10, 10).unwrap();
        let pt = p.project(0.0, 20.0);
        assert_eq!(pt.x, 20);
        assert!(!p.on_panel(pt));
    }

    #[test]
    fn test_from_points() {
        let b = BoundingBox::from_points([(1.0, 2.0), (-3.0, 5.0), (4.0, -1.0)]).unwrap();
        assert_eq!(b, bbox(-1.0, 5.0, -3.0, 4.0));
        assert!(BoundingBox::from_points(std::iter::empty()).is_none());
    }
}
