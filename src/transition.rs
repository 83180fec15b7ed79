/*
 *  transition.rs
 *
 *  ledmap - aviation weather on an LED matrix
 *  (c) 2020-26 Stuart Hunter
 *
 *  Between region presentation: clock card, wipe and title card
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

use embedded_graphics::mono_font::ascii::{FONT_10X20, FONT_4X6, FONT_5X8, FONT_6X10};
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle};
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Alignment, Baseline, Text, TextStyleBuilder};
use log::debug;
use rand::Rng;

use crate::config::TransitionSettings;
use crate::constants::{BLACK, BLUE, CLOCK_COLOR, TITLE_COLOR};
use crate::display::compositor::FrameCompositor;
use crate::display::framebuffer::DisplayFrame;
use crate::display::traits::PanelDriver;
use crate::error::MapError;
use crate::pacer::Sleeper;

/// Shown before each region activation, while the new data loads
#[allow(async_fn_in_trait)]
pub trait Transition {
    async fn run<P: PanelDriver, S: Sleeper>(
        &mut self,
        comp: &mut FrameCompositor<P>,
        title: &str,
        sleeper: &S,
    ) -> Result<(), MapError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoTransition;

impl Transition for NoTransition {
    async fn run<P: PanelDriver, S: Sleeper>(
        &mut self,
        _comp: &mut FrameCompositor<P>,
        _title: &str,
        _sleeper: &S,
    ) -> Result<(), MapError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wipe {
    /// Blue column, left to right and back
    Columns,
    /// Blue row, top to bottom and back
    Rows,
}

/// Clock card, wipe, then the region name
#[derive(Debug, Clone)]
pub struct TitleTransition {
    settings: TransitionSettings,
    /// None picks a wipe at random each time
    wipe: Option<Wipe>,
}

impl TitleTransition {
    pub fn new(settings: &TransitionSettings) -> Self {
        Self { settings: settings.clone(), wipe: None }
    }

    pub fn with_wipe(mut self, wipe: Wipe) -> Self {
        self.wipe = Some(wipe);
        self
    }

    fn pick_wipe(&self) -> Wipe {
        self.wipe.unwrap_or_else(|| {
            if rand::rng().random_bool(0.5) { Wipe::Columns } else { Wipe::Rows }
        })
    }

    async fn sweep<P: PanelDriver, S: Sleeper>(
        &self,
        comp: &mut FrameCompositor<P>,
        wipe: Wipe,
        sleeper: &S,
    ) -> Result<(), MapError> {
        let step = Duration::from_millis(self.settings.wipe_step_ms);
        let (w, h) = (comp.width() as i32, comp.height() as i32);
        let span = if wipe == Wipe::Columns { w } else { h };

        // out and back; the bar leaves a black trail
        let forward = (0..span).map(|i| (i, i - 1));
        let back = (-1..=span).rev().map(|i| (i, i + 1));
        for (bar, trail) in forward.chain(back) {
            match wipe {
                Wipe::Columns => {
                    comp.draw_line_visible(bar, 0, bar, h - 1, BLUE);
                    comp.draw_line_visible(trail, 0, trail, h - 1, BLACK);
                }
                Wipe::Rows => {
                    comp.draw_line_visible(0, bar, w - 1, bar, BLUE);
                    comp.draw_line_visible(0, trail, w - 1, trail, BLACK);
                }
            }
            comp.present()?;
            sleeper.sleep(step).await;
        }
        Ok(())
    }
}

impl Transition for TitleTransition {
    async fn run<P: PanelDriver, S: Sleeper>(
        &mut self,
        comp: &mut FrameCompositor<P>,
        title: &str,
        sleeper: &S,
    ) -> Result<(), MapError> {
        comp.apply_schedule(sleeper.local_time())?;

        if self.settings.clock {
            let now = sleeper.local_time().format("%H:%M").to_string();
            comp.fill(BLACK);
            draw_card(comp.offscreen_mut(), &[now.as_str()], CLOCK_COLOR);
            comp.swap()?;
            sleeper.sleep(Duration::from_secs(self.settings.clock_secs)).await;
        }

        if self.settings.wipe {
            let wipe = self.pick_wipe();
            debug!("Wipe {:?}", wipe);
            self.sweep(comp, wipe, sleeper).await?;
        }

        if self.settings.title {
            let lines = title_lines(title, comp.width());
            let lines: Vec<&str> = lines.iter().map(String::as_str).collect();
            comp.fill(BLACK);
            draw_card(comp.offscreen_mut(), &lines, TITLE_COLOR);
            comp.swap()?;
            sleeper.sleep(Duration::from_secs(self.settings.title_secs)).await;
        }
        Ok(())
    }
}

/// Largest font whose widest line fits the panel
fn fit_font(lines: &[&str], width: u32, height: u32) -> &'static MonoFont<'static> {
    let widest = lines.iter().map(|l| l.chars().count() as u32).max().unwrap_or(0);
    let rows = lines.len().max(1) as u32;
    [&FONT_10X20, &FONT_6X10, &FONT_5X8]
        .into_iter()
        .find(|f| widest * f.character_size.width <= width.saturating_sub(2)
            && rows * f.character_size.height <= height.saturating_sub(2))
        .unwrap_or(&FONT_4X6)
}

/// One line if the title fits in the medium font, else split in two at a
/// word boundary.
pub fn title_lines(title: &str, width: u32) -> Vec<String> {
    let words: Vec<&str> = title.split_whitespace().collect();
    let one_line = words.join(" ");
    if words.len() < 2 || one_line.chars().count() as u32 * FONT_6X10.character_size.width <= width {
        return vec![one_line];
    }
    let half = words.len().div_ceil(2);
    vec![words[..half].join(" "), words[half..].join(" ")]
}

/// Bordered card with centered lines of text
fn draw_card(frame: &mut DisplayFrame, lines: &[&str], color: Rgb888) {
    let (w, h) = frame.dimensions();
    let font = fit_font(lines, w, h);
    let char_style = MonoTextStyle::new(font, color);
    let text_style = TextStyleBuilder::new()
        .alignment(Alignment::Center)
        .baseline(Baseline::Middle)
        .build();

    let _ = Rectangle::new(Point::zero(), Size::new(w, h))
        .into_styled(PrimitiveStyle::with_stroke(BLUE, 1))
        .draw(frame);

    let line_h = font.character_size.height as i32;
    let top = h as i32 / 2 - line_h * (lines.len() as i32 - 1) / 2;
    for (i, line) in lines.iter().enumerate() {
        let at = Point::new(w as i32 / 2, top + i as i32 * line_h);
        let _ = Text::with_text_style(line, at, char_style, text_style).draw(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::compositor::BrightnessSchedule;
    use crate::display::drivers::memory::MemoryPanel;
    use crate::pacer::RecordingSleeper;
    use chrono::NaiveTime;

    fn comp(w: u32, h: u32) -> FrameCompositor<MemoryPanel> {
        let t = NaiveTime::from_hms_opt(21, 30, 0).unwrap();
        let schedule = BrightnessSchedule { default_percent: 40, dim_start: t, dim_end: NaiveTime::from_hms_opt(6, 30, 0).unwrap(), divisor: 4 };
        FrameCompositor::new(MemoryPanel::new(w, h).recording(), schedule).unwrap()
    }

    #[test]
    fn test_title_lines() {
        assert_eq!(title_lines("COLORADO", 64), vec!["COLORADO"]);
        assert_eq!(title_lines("NORTH CAROLINA", 64), vec!["NORTH", "CAROLINA"]);
        assert_eq!(title_lines("Northern Arizona Custom Map", 64), vec!["Northern Arizona", "Custom Map"]);
        assert_eq!(title_lines("NEW YORK", 128), vec!["NEW YORK"]);
    }

    #[test]
    fn test_fit_font_shrinks() {
        assert_eq!(fit_font(&["12:34"], 64, 32).character_size, FONT_10X20.character_size);
        assert_eq!(fit_font(&["MASSACHUSETTS"], 64, 32).character_size, FONT_4X6.character_size);
        assert_eq!(fit_font(&["NORTH", "CAROLINA"], 64, 32).character_size, FONT_6X10.character_size);
    }

    #[tokio::test]
    async fn test_full_transition_sequence() {
        let mut c = comp(16, 8);
        let sleeper = RecordingSleeper::new(NaiveTime::from_hms_opt(12, 5, 0).unwrap());
        let mut t = TitleTransition::new(&TransitionSettings::default()).with_wipe(Wipe::Columns);

        t.run(&mut c, "COLORADO", &sleeper).await.unwrap();

        let sleeps = sleeper.sleeps();
        assert_eq!(sleeps.first(), Some(&Duration::from_secs(5)));
        assert_eq!(sleeps.last(), Some(&Duration::from_secs(3)));
        // 16 columns out, 18 back
        assert_eq!(sleeps.len(), 1 + 34 + 1);
        assert!(c.visible().lit_count() > 0);
        assert_eq!(c.brightness(), Some(40));
    }

    #[tokio::test]
    async fn test_wipe_leaves_panel_dark() {
        let mut c = comp(8, 8);
        let settings = TransitionSettings { clock: false, title: false, ..Default::default() };
        let mut t = TitleTransition::new(&settings).with_wipe(Wipe::Rows);
        t.run(&mut c, "X", &RecordingSleeper::default()).await.unwrap();
        assert_eq!(c.visible().lit_count(), 0);
    }

    #[tokio::test]
    async fn test_no_transition() {
        let mut c = comp(8, 8);
        let sleeper = RecordingSleeper::default();
        NoTransition.run(&mut c, "X", &sleeper).await.unwrap();
        assert!(sleeper.sleeps().is_empty());
    }
}
