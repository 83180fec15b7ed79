/*
 *  effects.rs
 *
 *  ledmap - aviation weather on an LED matrix
 *  (c) 2020-26 Stuart Hunter
 *
 *  Airport markers, lightning flashes and high wind blinks
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

use std::time::Duration;

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::Point;
use log::debug;

use crate::classify::{Airport, Classification};
use crate::config::{AnimationSettings, BlinkMode, BrightnessSettings};
use crate::constants::{BLACK, WHITE, YELLOW};
use crate::display::compositor::FrameCompositor;
use crate::display::traits::PanelDriver;
use crate::error::MapError;
use crate::outline::OutlineCache;
use crate::pacer::Sleeper;
use crate::projection::Projector;

/// Marker pixel for an airport; None without a reported position or off
/// the panel.
pub fn marker_point(projector: &Projector, ap: &Airport) -> Option<Point> {
    if ap.lat == 0.0 && ap.lon == 0.0 {
        return None;
    }
    let p = projector.project(ap.lat, ap.lon);
    projector.on_panel(p).then_some(p)
}

/// Category colored marker for every station with a position
pub fn draw_markers<P: PanelDriver>(
    comp: &mut FrameCompositor<P>,
    projector: &Projector,
    cls: &Classification,
    both: bool,
) -> usize {
    let mut drawn = 0;
    for ap in cls.snapshot.airports.values() {
        let Some(p) = marker_point(projector, ap) else {
            debug!("{} has no position on this map", ap.station);
            continue;
        };
        let color = ap.category.color();
        if both {
            comp.draw_pixel_both(p.x, p.y, color);
        } else {
            comp.draw_pixel(p.x, p.y, color);
        }
        drawn += 1;
    }
    drawn
}

/// Redraw outline and markers on the off-screen frame from the cache
pub fn rebaseline<P: PanelDriver>(
    comp: &mut FrameCompositor<P>,
    outline: &OutlineCache,
    cls: &Classification,
) -> Result<(), MapError> {
    comp.fill(BLACK);
    outline.render_cached(comp)?;
    let projector = outline.projector().ok_or(MapError::NoCachedOutline)?;
    draw_markers(comp, projector, cls, false);
    Ok(())
}

/// Star burst: orthogonal arms of `size` pixels, diagonal arms slightly
/// shorter.
fn draw_star<P: PanelDriver>(comp: &mut FrameCompositor<P>, at: Point, size: u32) {
    let (x, y) = (at.x, at.y);
    for j in 0..size as i32 {
        let k = j - j / 3;
        for (dx, dy) in [(k, k), (-k, -k), (-k, k), (k, -k), (j, 0), (-j, 0), (0, j), (0, -j)] {
            comp.draw_pixel(x + dx, y + dy, YELLOW);
        }
    }
}

/// Timed lightning and wind renderings for one region activation.
#[derive(Debug, Clone)]
pub struct Effects {
    anim: AnimationSettings,
    lightning_percent: u8,
    hiwind_percent: u8,
}

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

impl Effects {
    pub fn new(anim: &AnimationSettings, brightness: &BrightnessSettings) -> Self {
        Self {
            anim: anim.clone(),
            lightning_percent: brightness.lightning_percent,
            hiwind_percent: brightness.hiwind_percent,
        }
    }

    async fn restore_brightness<P: PanelDriver, S: Sleeper>(
        &self,
        comp: &mut FrameCompositor<P>,
        sleeper: &S,
    ) -> Result<(), MapError> {
        comp.apply_schedule(sleeper.local_time())?;
        Ok(())
    }

    /// Flash every lightning station, one after another
    pub async fn lightning<P: PanelDriver, S: Sleeper>(
        &self,
        comp: &mut FrameCompositor<P>,
        outline: &OutlineCache,
        cls: &Classification,
        sleeper: &S,
    ) -> Result<(), MapError> {
        if !self.anim.lightning || cls.lightning.is_empty() {
            return Ok(());
        }
        let projector = outline.projector().ok_or(MapError::NoCachedOutline)?.clone();

        for ap in cls.lightning_airports() {
            let Some(p) = marker_point(&projector, ap) else { continue };
            if self.anim.big_flash {
                self.big_flash(comp, outline, cls, p, sleeper).await?;
            } else {
                self.flicker(comp, p, ap.category.color(), sleeper).await?;
            }
        }
        self.restore_brightness(comp, sleeper).await
    }

    /// Star drawn off-screen, then shown by an odd number of swaps and a
    /// final swap back to the map.
    async fn big_flash<P: PanelDriver, S: Sleeper>(
        &self,
        comp: &mut FrameCompositor<P>,
        outline: &OutlineCache,
        cls: &Classification,
        at: Point,
        sleeper: &S,
    ) -> Result<(), MapError> {
        let t = &self.anim.timings;
        rebaseline(comp, outline, cls)?;
        draw_star(comp, at, self.anim.flash_size);

        comp.set_brightness(self.lightning_percent)?;
        for _ in 0..self.anim.flash_count {
            comp.swap()?;
            sleeper.sleep(ms(t.flash_toggle_ms)).await;
        }
        comp.swap()?;
        self.restore_brightness(comp, sleeper).await?;
        sleeper.sleep(ms(t.flash_settle_ms)).await;
        Ok(())
    }

    /// Single pixel white to yellow flicker on the visible frame
    async fn flicker<P: PanelDriver, S: Sleeper>(
        &self,
        comp: &mut FrameCompositor<P>,
        at: Point,
        category_color: Rgb888,
        sleeper: &S,
    ) -> Result<(), MapError> {
        let t = &self.anim.timings;
        let ltng = self.lightning_percent;
        let rest = comp.default_level(sleeper.local_time());
        let steps = [
            (WHITE, ltng.saturating_sub(20), t.flicker_steps_ms[0]),
            (YELLOW, ltng.saturating_sub(10), t.flicker_steps_ms[1]),
            (YELLOW, ltng, t.flicker_steps_ms[2]),
            (category_color, rest, t.flicker_steps_ms[3]),
        ];

        for _ in 0..self.anim.timings.flicker_repeats {
            for (color, level, wait) in steps {
                comp.set_brightness(level)?;
                comp.draw_pixel_visible(at.x, at.y, color);
                comp.present()?;
                sleeper.sleep(ms(wait)).await;
            }
        }
        Ok(())
    }

    /// Blink every high wind station in the configured mode
    pub async fn high_wind<P: PanelDriver, S: Sleeper>(
        &self,
        comp: &mut FrameCompositor<P>,
        outline: &OutlineCache,
        cls: &Classification,
        sleeper: &S,
    ) -> Result<(), MapError> {
        if !self.anim.hiwind || cls.high_wind.is_empty() {
            return Ok(());
        }
        match self.anim.blink_mode {
            BlinkMode::Single => self.blink_single(comp, outline, cls, sleeper).await,
            BlinkMode::Batched => self.blink_batched(comp, outline, cls, sleeper).await,
        }
    }

    /// One station at a time on the visible frame; one hold per station
    async fn blink_single<P: PanelDriver, S: Sleeper>(
        &self,
        comp: &mut FrameCompositor<P>,
        outline: &OutlineCache,
        cls: &Classification,
        sleeper: &S,
    ) -> Result<(), MapError> {
        let projector = outline.projector().ok_or(MapError::NoCachedOutline)?.clone();
        let hold = ms(self.anim.timings.blink_single_ms);

        for ap in cls.high_wind_airports() {
            let Some(p) = marker_point(&projector, ap) else { continue };
            comp.set_brightness(self.hiwind_percent)?;
            comp.draw_pixel_visible(p.x, p.y, BLACK);
            comp.present()?;
            sleeper.sleep(hold).await;

            comp.draw_pixel_visible(p.x, p.y, ap.category.color());
            self.restore_brightness(comp, sleeper).await?;
            comp.present()?;
        }
        Ok(())
    }

    /// All stations dark in one off-screen frame, shown with a single swap
    /// and swapped back after the hold.
    async fn blink_batched<P: PanelDriver, S: Sleeper>(
        &self,
        comp: &mut FrameCompositor<P>,
        outline: &OutlineCache,
        cls: &Classification,
        sleeper: &S,
    ) -> Result<(), MapError> {
        let projector = outline.projector().ok_or(MapError::NoCachedOutline)?.clone();
        let hold = ms(self.anim.timings.blink_batched_ms);

        rebaseline(comp, outline, cls)?;
        for ap in cls.high_wind_airports() {
            if let Some(p) = marker_point(&projector, ap) {
                comp.draw_pixel(p.x, p.y, BLACK);
            }
        }

        comp.set_brightness(self.hiwind_percent)?;
        comp.swap()?;
        sleeper.sleep(hold).await;

        comp.swap()?;
        self.restore_brightness(comp, sleeper).await?;
        sleeper.sleep(hold).await;
        Ok(())
    }
}
