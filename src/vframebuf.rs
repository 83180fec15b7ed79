/*
 *  vframebuf.rs
 *
 *  ledmap - aviation weather on an LED matrix
 *	(c) 2020-26 Stuart Hunter
 *
 *	Runtime sized embedded-graphics frame buffer
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */

use core::convert::Infallible;
use embedded_graphics::geometry::{OriginDimensions, Size};
use embedded_graphics::pixelcolor::PixelColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;

/// A runtime-sized framebuffer for embedded-graphics.
///
/// Panel geometry comes from configuration (rows x chain, cols x parallel),
/// so the size is only known at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct VarFrameBuf<C: PixelColor> {
    buf: Vec<C>,
    w: usize,
    h: usize,
}

impl<C: PixelColor> VarFrameBuf<C> {
    pub fn new(width: u32, height: u32, fill: C) -> Self {
        let (w, h) = (width as usize, height as usize);
        Self { buf: vec![fill; w * h], w, h }
    }

    pub fn width(&self) -> usize { self.w }
    pub fn height(&self) -> usize { self.h }

    /// Immutable raw access, row major
    pub fn as_slice(&self) -> &[C] { &self.buf }

    /// Clear to a color
    pub fn clear_color(&mut self, color: C) {
        self.buf.fill(color);
    }

    /// Read back a single pixel
    pub fn pixel(&self, p: Point) -> Option<C> {
        self.idx(p).map(|i| self.buf[i])
    }

    /// Map (x,y) to linear index; returns None if out of bounds
    #[inline]
    fn idx(&self, p: Point) -> Option<usize> {
        if p.x >= 0 && p.y >= 0 {
            let (x, y) = (p.x as usize, p.y as usize);
            if x < self.w && y < self.h {
                return Some(y * self.w + x);
            }
        }
        None
    }
}

impl<C: PixelColor> OriginDimensions for VarFrameBuf<C> {
    fn size(&self) -> Size {
        Size::new(self.w as u32, self.h as u32)
    }
}

impl<C: PixelColor> DrawTarget for VarFrameBuf<C> {
    type Color = C;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(p, c) in pixels {
            if let Some(i) = self.idx(p) {
                self.buf[i] = c;
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.clear_color(color);
        Ok(())
    }

    fn fill_contiguous<I>(&mut self, area: &Rectangle, colors: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Self::Color>,
    {
        // areas may hang off the panel edge (title text), clip per pixel
        let pixels = area
            .points()
            .zip(colors)
            .map(|(p, c)| Pixel(p, c));
        self.draw_iter(pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::pixelcolor::Rgb888;
    use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};

    #[test]
    fn test_out_of_bounds_pixels_are_dropped() {
        let mut fb = VarFrameBuf::new(8, 4, Rgb888::BLACK);
        fb.draw_iter([Pixel(Point::new(9, 1), Rgb888::RED), Pixel(Point::new(-1, 0), Rgb888::RED)])
            .unwrap();
        assert!(fb.as_slice().iter().all(|&c| c == Rgb888::BLACK));
        assert_eq!(fb.pixel(Point::new(8, 0)), None);
    }

    #[test]
    fn test_fill_clips_at_edge() {
        let mut fb = VarFrameBuf::new(8, 4, Rgb888::BLACK);
        Rectangle::new(Point::new(6, 2), Size::new(4, 4))
            .into_styled(PrimitiveStyle::with_fill(Rgb888::GREEN))
            .draw(&mut fb)
            .unwrap();
        let lit = fb.as_slice().iter().filter(|&&c| c == Rgb888::GREEN).count();
        assert_eq!(lit, 4);
        assert_eq!(fb.pixel(Point::new(7, 3)), Some(Rgb888::GREEN));
    }
}
