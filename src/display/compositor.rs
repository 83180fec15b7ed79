/*
 *  display/compositor.rs
 *
 *  ledmap - aviation weather on an LED matrix
 *  (c) 2020-26 Stuart Hunter
 *
 *  Double buffered frame composition, swap and brightness scheduling
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

use chrono::NaiveTime;
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Line, PrimitiveStyle};
use log::{debug, info};

use crate::config::{BrightnessSettings, ConfigError};
use crate::display::error::DisplayError;
use crate::display::framebuffer::DisplayFrame;
use crate::display::traits::PanelDriver;

/// Time-of-day brightness policy
///
/// Inside the dimming window the default level is divided by `divisor`.
/// The window may wrap midnight (21:30 to 06:30). Equal start and end
/// disables dimming.
#[derive(Debug, Clone, PartialEq)]
pub struct BrightnessSchedule {
    pub default_percent: u8,
    pub dim_start: NaiveTime,
    pub dim_end: NaiveTime,
    pub divisor: u8,
}

impl BrightnessSchedule {
    pub fn from_settings(settings: &BrightnessSettings) -> Result<Self, ConfigError> {
        let (dim_start, dim_end) = settings.dim_window()?;
        Ok(Self {
            default_percent: settings.default_percent,
            dim_start,
            dim_end,
            divisor: settings.dim_divisor,
        })
    }

    pub fn in_dim_window(&self, now: NaiveTime) -> bool {
        if self.dim_start == self.dim_end {
            false
        } else if self.dim_start < self.dim_end {
            self.dim_start <= now && now < self.dim_end
        } else {
            now >= self.dim_start || now < self.dim_end
        }
    }

    /// Brightness the panel should rest at for this time of day
    pub fn level_at(&self, now: NaiveTime) -> u8 {
        if self.in_dim_window(now) {
            self.default_percent / self.divisor.max(1)
        } else {
            self.default_percent
        }
    }
}

/// Owns the visible and off-screen frames and the panel they are shown on.
///
/// All drawing targets the off-screen frame unless a `_visible` method is
/// used. `swap` exchanges the two roles and latches the new visible frame,
/// so the panel never receives a half drawn frame.
pub struct FrameCompositor<P: PanelDriver> {
    panel: P,
    visible: DisplayFrame,
    offscreen: DisplayFrame,
    schedule: BrightnessSchedule,
    brightness: Option<u8>,
    dimmed: Option<bool>,
}

impl<P: PanelDriver> FrameCompositor<P> {
    /// Initialize the panel and allocate both frames at its resolution
    pub fn new(mut panel: P, schedule: BrightnessSchedule) -> Result<Self, DisplayError> {
        let (width, height) = panel.dimensions();
        if width == 0 || height == 0 {
            return Err(DisplayError::InvalidConfiguration(
                format!("panel reports {}x{}", width, height)));
        }
        panel.init()?;
        debug!("Compositor ready at {}x{}", width, height);

        Ok(Self {
            panel,
            visible: DisplayFrame::new(width, height),
            offscreen: DisplayFrame::new(width, height),
            schedule,
            brightness: None,
            dimmed: None,
        })
    }

    pub fn width(&self) -> u32 {
        self.visible.dimensions().0
    }

    pub fn height(&self) -> u32 {
        self.visible.dimensions().1
    }

    pub fn panel(&self) -> &P {
        &self.panel
    }

    pub fn schedule(&self) -> &BrightnessSchedule {
        &self.schedule
    }

    pub fn visible(&self) -> &DisplayFrame {
        &self.visible
    }

    pub fn offscreen(&self) -> &DisplayFrame {
        &self.offscreen
    }

    /// Off-screen frame as an embedded-graphics draw target
    pub fn offscreen_mut(&mut self) -> &mut DisplayFrame {
        &mut self.offscreen
    }

    pub fn draw_pixel(&mut self, x: i32, y: i32, color: Rgb888) {
        self.offscreen.set_pixel(x, y, color);
    }

    pub fn draw_line(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, color: Rgb888) {
        draw_segment(&mut self.offscreen, x1, y1, x2, y2, color);
    }

    pub fn draw_pixel_visible(&mut self, x: i32, y: i32, color: Rgb888) {
        self.visible.set_pixel(x, y, color);
    }

    pub fn draw_line_visible(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, color: Rgb888) {
        draw_segment(&mut self.visible, x1, y1, x2, y2, color);
    }

    /// Same pixel on both frames, so a later swap shows the same baseline
    pub fn draw_pixel_both(&mut self, x: i32, y: i32, color: Rgb888) {
        self.visible.set_pixel(x, y, color);
        self.offscreen.set_pixel(x, y, color);
    }

    pub fn draw_line_both(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, color: Rgb888) {
        draw_segment(&mut self.visible, x1, y1, x2, y2, color);
        draw_segment(&mut self.offscreen, x1, y1, x2, y2, color);
    }

    pub fn fill(&mut self, color: Rgb888) {
        self.offscreen.fill(color);
    }

    /// Blank both frames and the panel
    pub fn clear_all(&mut self) -> Result<(), DisplayError> {
        self.visible.fill(Rgb888::BLACK);
        self.offscreen.fill(Rgb888::BLACK);
        self.panel.clear()
    }

    /// Latch the visible frame after direct edits
    pub fn present(&mut self) -> Result<(), DisplayError> {
        self.panel.show(&self.visible)
    }

    /// Exchange visible and off-screen roles and show the new visible frame
    pub fn swap(&mut self) -> Result<(), DisplayError> {
        std::mem::swap(&mut self.visible, &mut self.offscreen);
        self.panel.show(&self.visible)
    }

    /// Current device brightness, if one has been set
    pub fn brightness(&self) -> Option<u8> {
        self.brightness
    }

    /// Set global brightness (percent); skipped when unchanged
    pub fn set_brightness(&mut self, percent: u8) -> Result<(), DisplayError> {
        if percent > 100 {
            return Err(DisplayError::InvalidBrightness(percent));
        }
        if self.brightness == Some(percent) {
            return Ok(());
        }
        self.panel.set_brightness(percent)?;
        self.brightness = Some(percent);
        Ok(())
    }

    /// Default brightness for this time of day
    pub fn default_level(&self, now: NaiveTime) -> u8 {
        self.schedule.level_at(now)
    }

    /// Re-evaluate the dimming window and apply the resting brightness
    pub fn apply_schedule(&mut self, now: NaiveTime) -> Result<u8, DisplayError> {
        let dimmed = self.schedule.in_dim_window(now);
        if self.dimmed != Some(dimmed) {
            if dimmed {
                info!("Entering dimming window at {}", now.format("%H:%M"));
            } else {
                info!("Leaving dimming window at {}", now.format("%H:%M"));
            }
            self.dimmed = Some(dimmed);
        }
        let level = self.schedule.level_at(now);
        self.set_brightness(level)?;
        Ok(level)
    }
}

fn draw_segment(frame: &mut DisplayFrame, x1: i32, y1: i32, x2: i32, y2: i32, color: Rgb888) {
    // Infallible
    let _ = Line::new(Point::new(x1, y1), Point::new(x2, y2))
        .into_styled(PrimitiveStyle::with_stroke(color, 1))
        .draw(frame);
}
