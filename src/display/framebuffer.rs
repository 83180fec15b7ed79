/*
 *  display/framebuffer.rs
 *
 *  ledmap - aviation weather on an LED matrix
 *  (c) 2020-26 Stuart Hunter
 *
 *  RGB display frame shared by the compositor and panel drivers
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

use core::convert::Infallible;
use embedded_graphics::prelude::*;
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::primitives::Rectangle;

use crate::vframebuf::VarFrameBuf;

/// One full-panel RGB frame.
///
/// Two of these back the compositor (visible and off-screen). Panels receive
/// a whole frame at a time, never a partially drawn one.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayFrame {
    fb: VarFrameBuf<Rgb888>,
}

impl DisplayFrame {
    /// Create a black frame
    pub fn new(width: u32, height: u32) -> Self {
        Self { fb: VarFrameBuf::new(width, height, Rgb888::BLACK) }
    }

    /// Get dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.fb.width() as u32, self.fb.height() as u32)
    }

    pub fn set_pixel(&mut self, x: i32, y: i32, color: Rgb888) {
        // Infallible
        let _ = self.fb.draw_iter([Pixel(Point::new(x, y), color)]);
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<Rgb888> {
        self.fb.pixel(Point::new(x, y))
    }

    pub fn fill(&mut self, color: Rgb888) {
        self.fb.clear_color(color);
    }

    /// Row-major pixel slice
    pub fn pixels(&self) -> &[Rgb888] {
        self.fb.as_slice()
    }

    /// Number of pixels that are not black
    pub fn lit_count(&self) -> usize {
        self.fb.as_slice().iter().filter(|&&c| c != Rgb888::BLACK).count()
    }

    /// Packed RGB bytes, three per pixel, row major
    ///
    /// This is the wire layout handed to panel plugins and PPM snapshots.
    pub fn to_rgb_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.fb.as_slice().len() * 3);
        for c in self.fb.as_slice() {
            out.extend_from_slice(&[c.r(), c.g(), c.b()]);
        }
        out
    }
}

impl OriginDimensions for DisplayFrame {
    fn size(&self) -> Size {
        self.fb.size()
    }
}

impl DrawTarget for DisplayFrame {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        self.fb.draw_iter(pixels)
    }

    fn fill_contiguous<I>(&mut self, area: &Rectangle, colors: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Self::Color>,
    {
        self.fb.fill_contiguous(area, colors)
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.fb.clear(color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_pixels_and_bytes() {
        let mut frame = DisplayFrame::new(4, 2);
        frame.set_pixel(1, 1, Rgb888::new(1, 2, 3));
        frame.set_pixel(10, 10, Rgb888::WHITE);

        assert_eq!(frame.lit_count(), 1);
        assert_eq!(frame.pixel(1, 1), Some(Rgb888::new(1, 2, 3)));

        let bytes = frame.to_rgb_bytes();
        assert_eq!(bytes.len(), 4 * 2 * 3);
        assert_eq!(&bytes[15..18], &[1, 2, 3]);
    }

    #[test]
    fn test_fill() {
        let mut frame = DisplayFrame::new(3, 3);
        frame.fill(Rgb888::RED);
        assert_eq!(frame.lit_count(), 9);
        frame.fill(Rgb888::BLACK);
        assert_eq!(frame.lit_count(), 0);
    }
}
