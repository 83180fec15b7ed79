/*
 *  outline.rs
 *
 *  ledmap - aviation weather on an LED matrix
 *  (c) 2020-26 Stuart Hunter
 *
 *  Region outline ingestion, caching and rendering
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

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::Point;
use log::debug;

use crate::config::{OutlineSettings, OutlineStyle};
use crate::constants::{CONTINENTAL_MAX_LON, CONTINENTAL_MIN_LAT, CONTINENTAL_MIN_LON, OUTLINE_COLOR};
use crate::display::compositor::FrameCompositor;
use crate::display::traits::PanelDriver;
use crate::error::MapError;
use crate::projection::{BoundingBox, Projector};
use crate::region::{GeographicRegion, Ring};

/// One ring in panel pixels
#[derive(Debug, Clone, PartialEq)]
pub struct PixelRing {
    pub points: Vec<Point>,
    /// False when the continental clip cut the ring short
    pub closed: bool,
}

/// Projected outline of the active region
#[derive(Debug, Clone, PartialEq)]
pub struct Outline {
    pub rings: Vec<PixelRing>,
    /// Raw box over the kept (lon, lat) points
    pub bbox: BoundingBox,
    pub projector: Projector,
}

fn outside_continent(lon: f64, lat: f64) -> bool {
    lon > CONTINENTAL_MAX_LON || lon < CONTINENTAL_MIN_LON || lat < CONTINENTAL_MIN_LAT
}

/// Points of a ring up to the first one outside the continental box
fn clip_continental(ring: &Ring) -> (&[(f64, f64)], bool) {
    let pts = ring.points();
    match pts.iter().position(|&(lon, lat)| outside_continent(lon, lat)) {
        Some(cut) => (&pts[..cut], false),
        None => (pts, true),
    }
}

/// Every `step`th point; closed rings are closed again after thinning
fn thin(points: &[Point], step: usize, closed: bool) -> Vec<Point> {
    let mut out: Vec<Point> = points.iter().step_by(step.max(1)).copied().collect();
    if closed && out.len() > 1 {
        if let (Some(&first), Some(&last)) = (out.first(), out.last()) {
            if first != last {
                out.push(first);
            }
        }
    }
    out
}

/// Project a region's rings onto a `width` x `height` panel.
///
/// The bounding box is computed over every ring before anything is
/// projected. The continental outline drops territory outside the lower 48
/// by ending a ring's traversal at its first point outside the clip box.
pub fn build_outline(region: &GeographicRegion, width: u32, height: u32, step: usize) -> Result<Outline, MapError> {
    let continental = region.is_continental();
    let kept: Vec<(&[(f64, f64)], bool)> = region
        .rings
        .iter()
        .map(|r| if continental { clip_continental(r) } else { (r.points(), true) })
        .filter(|(pts, _)| !pts.is_empty())
        .collect();

    let bbox = BoundingBox::from_points(kept.iter().flat_map(|(pts, _)| pts.iter().copied()))
        .ok_or_else(|| MapError::DegenerateGeometry(format!("{} has no outline points", region.title)))?;
    let projector = Projector::new(&bbox, &region.profile, width, height)?;

    let rings = kept
        .into_iter()
        .map(|(pts, closed)| {
            let px: Vec<Point> = pts.iter().map(|&(lon, lat)| projector.project(lat, lon)).collect();
            PixelRing { points: thin(&px, step, closed), closed }
        })
        .collect::<Vec<_>>();

    debug!(
        "Outline {}: {} rings, lat {:.3}..{:.3} lon {:.3}..{:.3}",
        region.title, rings.len(), bbox.min_lat, bbox.max_lat, bbox.min_lon, bbox.max_lon
    );
    Ok(Outline { rings, bbox, projector })
}

enum Target {
    Both,
    Offscreen,
}

/// Holds the projected outline between a full render and the cached
/// re-renders used while animating.
#[derive(Debug, Clone)]
pub struct OutlineCache {
    enabled: bool,
    style: OutlineStyle,
    step: usize,
    color: Rgb888,
    cached: Option<Outline>,
}

impl OutlineCache {
    pub fn new(settings: &OutlineSettings) -> Self {
        Self {
            enabled: settings.enabled,
            style: settings.style,
            step: settings.step,
            color: OUTLINE_COLOR,
            cached: None,
        }
    }

    pub fn outline(&self) -> Option<&Outline> {
        self.cached.as_ref()
    }

    pub fn projector(&self) -> Option<&Projector> {
        self.cached.as_ref().map(|o| &o.projector)
    }

    /// Ingest the region, cache it and draw it on both frames
    pub fn render_full<P: PanelDriver>(
        &mut self,
        region: &GeographicRegion,
        comp: &mut FrameCompositor<P>,
    ) -> Result<&Outline, MapError> {
        self.cached = None;
        let outline = build_outline(region, comp.width(), comp.height(), self.step)?;
        if self.enabled {
            draw(&outline, self.style, self.color, comp, Target::Both);
        }
        Ok(self.cached.insert(outline))
    }

    /// Redraw the cached outline on the off-screen frame only
    pub fn render_cached<P: PanelDriver>(&self, comp: &mut FrameCompositor<P>) -> Result<(), MapError> {
        let outline = self.cached.as_ref().ok_or(MapError::NoCachedOutline)?;
        if self.enabled {
            draw(outline, self.style, self.color, comp, Target::Offscreen);
        }
        Ok(())
    }
}

fn draw<P: PanelDriver>(
    outline: &Outline,
    style: OutlineStyle,
    color: Rgb888,
    comp: &mut FrameCompositor<P>,
    target: Target,
) {
    for ring in &outline.rings {
        match style {
            OutlineStyle::Points => {
                for p in &ring.points {
                    match target {
                        Target::Both => comp.draw_pixel_both(p.x, p.y, color),
                        Target::Offscreen => comp.draw_pixel(p.x, p.y, color),
                    }
                }
            }
            OutlineStyle::Lines => {
                if let [only] = ring.points.as_slice() {
                    match target {
                        Target::Both => comp.draw_pixel_both(only.x, only.y, color),
                        Target::Offscreen => comp.draw_pixel(only.x, only.y, color),
                    }
                }
                for seg in ring.points.windows(2) {
                    let (a, b) = (seg[0], seg[1]);
                    match target {
                        Target::Both => comp.draw_line_both(a.x, a.y, b.x, b.y, color),
                        Target::Offscreen => comp.draw_line(a.x, a.y, b.x, b.y, color),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::compositor::BrightnessSchedule;
    use crate::display::drivers::memory::MemoryPanel;
    use crate::projection::ScaleProfile;
    use crate::region::Region;
    use chrono::NaiveTime;
    use embedded_graphics::prelude::RgbColor;

    fn compositor(w: u32, h: u32) -> FrameCompositor<MemoryPanel> {
        let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
        let schedule = BrightnessSchedule { default_percent: 50, dim_start: noon, dim_end: noon, divisor: 4 };
        FrameCompositor::new(MemoryPanel::new(w, h), schedule).unwrap()
    }

    fn square_region() -> GeographicRegion {
        GeographicRegion {
            region: Region::Named("SQUARE".into()),
            title: "SQUARE".into(),
            rings: vec![Ring::new(vec![(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0)]).unwrap()],
            airports: vec!["KTST".into()],
            profile: ScaleProfile::new(1.0, 1.0),
        }
    }

    fn settings(style: OutlineStyle) -> OutlineSettings {
        OutlineSettings { enabled: true, style, step: 1 }
    }

    #[test]
    fn test_build_outline_closes_rings() {
        let o = build_outline(&square_region(), 32, 32, 1).unwrap();
        assert_eq!(o.rings.len(), 1);
        let ring = &o.rings[0];
        assert!(ring.closed);
        assert_eq!(ring.points.first(), ring.points.last());
        assert!(ring.points.iter().all(|p| o.projector.on_panel(*p)));
    }

    #[test]
    fn test_multi_ring_bbox_spans_every_ring() {
        let mut region = square_region();
        region.rings.push(Ring::new(vec![(20.0, 20.0), (21.0, 20.0), (21.0, 21.0)]).unwrap());
        let o = build_outline(&region, 64, 64, 1).unwrap();
        assert_eq!(o.bbox, BoundingBox { min_lat: 0.0, max_lat: 21.0, min_lon: 0.0, max_lon: 21.0 });
        assert_eq!(o.rings.len(), 2);
    }

    #[test]
    fn test_continental_clip_truncates_ring() {
        let mut region = square_region();
        region.region = Region::ContinentalCountry;
        region.rings = vec![
            // mainland box, then a point in the Pacific
            Ring::new(vec![(-120.0, 45.0), (-70.0, 45.0), (-70.0, 30.0), (-160.0, 21.0), (-120.0, 30.0)]).unwrap(),
            // wholly outside: dropped
            Ring::new(vec![(-155.0, 19.0), (-154.0, 19.5), (-155.0, 20.0)]).unwrap(),
        ];
        let o = build_outline(&region, 64, 32, 1).unwrap();
        assert_eq!(o.rings.len(), 1);
        assert!(!o.rings[0].closed);
        assert_eq!(o.rings[0].points.len(), 3);
        assert_eq!(o.bbox.min_lon, -120.0);
        assert_eq!(o.bbox.min_lat, 30.0);
    }

    #[test]
    fn test_step_thins_points() {
        let pts: Vec<(f64, f64)> = (0..=20).map(|i| (i as f64, (i % 3) as f64)).collect();
        let mut region = square_region();
        region.rings = vec![Ring::new(pts).unwrap()];
        let full = build_outline(&region, 64, 64, 1).unwrap();
        let thinned = build_outline(&region, 64, 64, 5).unwrap();
        assert!(thinned.rings[0].points.len() < full.rings[0].points.len());
        assert_eq!(thinned.rings[0].points.first(), thinned.rings[0].points.last());
    }

    #[test]
    fn test_single_point_region_is_degenerate() {
        let mut region = square_region();
        region.rings = vec![Ring::new(vec![(5.0, 5.0)]).unwrap()];
        let mut comp = compositor(16, 16);
        let mut cache = OutlineCache::new(&settings(OutlineStyle::Lines));
        assert!(matches!(cache.render_full(&region, &mut comp), Err(MapError::DegenerateGeometry(_))));
        assert!(cache.outline().is_none());
    }

    #[test]
    fn test_render_cached_matches_full_render() {
        for style in [OutlineStyle::Lines, OutlineStyle::Points] {
            let mut comp = compositor(32, 16);
            let mut cache = OutlineCache::new(&settings(style));
            cache.render_full(&square_region(), &mut comp).unwrap();
            let baseline = comp.visible().clone();
            assert!(baseline.lit_count() > 0);
            assert_eq!(comp.offscreen(), &baseline);

            comp.fill(Rgb888::BLACK);
            cache.render_cached(&mut comp).unwrap();
            assert_eq!(comp.offscreen(), &baseline);
            // cached render leaves the visible frame alone
            assert_eq!(comp.visible(), &baseline);
        }
    }

    #[test]
    fn test_render_cached_requires_full_render() {
        let mut comp = compositor(8, 8);
        let cache = OutlineCache::new(&settings(OutlineStyle::Lines));
        assert!(matches!(cache.render_cached(&mut comp), Err(MapError::NoCachedOutline)));
    }

    #[test]
    fn test_disabled_outline_still_projects() {
        let mut comp = compositor(16, 16);
        let mut cache = OutlineCache::new(&OutlineSettings { enabled: false, style: OutlineStyle::Lines, step: 1 });
        cache.render_full(&square_region(), &mut comp).unwrap();
        assert_eq!(comp.visible().lit_count(), 0);
        assert!(cache.projector().is_some());
    }
}
