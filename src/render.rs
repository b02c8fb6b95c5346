use anyhow::Result;
use embedded_graphics::{
    pixelcolor::BinaryColor,
    prelude::*,
    primitives::{Primitive as _, PrimitiveStyle, Rectangle},
};
use std::convert::Infallible;

use crate::fonts::{draw_mono, IconFont, TextFont, LABEL_FONT};
use crate::panel::Panel;
use crate::screen::{Frame, Ink, Primitive, HEIGHT, WIDTH};

const BYTES: usize = (WIDTH * HEIGHT / 8) as usize;

/// 128x64 1-bit framebuffer, row-major, MSB first.
#[derive(Clone, PartialEq, Eq)]
pub struct Canvas {
    bits: [u8; BYTES],
}

impl Default for Canvas {
    fn default() -> Self {
        Canvas { bits: [0; BYTES] }
    }
}

impl std::fmt::Debug for Canvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Canvas({} lit)", self.lit_count())
    }
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }

    fn index(x: i32, y: i32) -> Option<(usize, u8)> {
        if x < 0 || y < 0 || x >= WIDTH as i32 || y >= HEIGHT as i32 {
            return None;
        }
        let bit = y as usize * WIDTH as usize + x as usize;
        Some((bit / 8, 0x80 >> (bit % 8)))
    }

    pub fn get(&self, x: i32, y: i32) -> bool {
        Self::index(x, y).is_some_and(|(byte, mask)| self.bits[byte] & mask != 0)
    }

    pub fn set(&mut self, x: i32, y: i32, on: bool) {
        if let Some((byte, mask)) = Self::index(x, y) {
            if on {
                self.bits[byte] |= mask;
            } else {
                self.bits[byte] &= !mask;
            }
        }
    }

    pub fn lit_count(&self) -> u32 {
        self.bits.iter().map(|b| b.count_ones()).sum()
    }

    #[cfg(test)]
    pub fn is_blank(&self) -> bool {
        self.bits.iter().all(|&b| b == 0)
    }

    #[cfg(test)]
    pub fn lit_in(&self, area: &Rectangle) -> u32 {
        area.points().filter(|p| self.get(p.x, p.y)).count() as u32
    }

    /// Every pixel with its color, for pushing into another draw target.
    pub fn pixels(&self) -> impl Iterator<Item = Pixel<BinaryColor>> + '_ {
        (0..HEIGHT as i32).flat_map(move |y| {
            (0..WIDTH as i32).map(move |x| Pixel(Point::new(x, y), BinaryColor::from(self.get(x, y))))
        })
    }
}

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        Size::new(WIDTH, HEIGHT)
    }
}

impl DrawTarget for Canvas {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            self.set(point.x, point.y, color.is_on());
        }
        Ok(())
    }
}

fn color(ink: Ink) -> BinaryColor {
    match ink {
        Ink::On => BinaryColor::On,
        Ink::Off => BinaryColor::Off,
    }
}

pub struct Renderer {
    text_font: TextFont,
    icon_font: IconFont,
}

impl Renderer {
    pub fn new(text_font: TextFont, icon_font: IconFont) -> Self {
        Renderer { text_font, icon_font }
    }

    /// Paints `frame` on a fresh canvas.
    pub fn render(&self, frame: &Frame) -> Canvas {
        let mut canvas = Canvas::new();
        for primitive in &frame.primitives {
            // Canvas drawing cannot fail
            self.draw(primitive, &mut canvas).unwrap_or_else(|never| match never {});
        }
        canvas
    }

    pub fn render_to(&self, frame: &Frame, panel: &mut dyn Panel) -> Result<()> {
        let canvas = self.render(frame);
        panel.display(&canvas)
    }

    fn draw<D>(&self, primitive: &Primitive, target: &mut D) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = BinaryColor>,
    {
        match primitive {
            Primitive::FillRect { area, ink } => area
                .into_styled(PrimitiveStyle::with_fill(color(*ink)))
                .draw(target),
            Primitive::OutlineRect { area, ink } => area
                .into_styled(PrimitiveStyle::with_stroke(color(*ink), 1))
                .draw(target),
            Primitive::Text { at, text, ink } => self.text_font.draw(text, *at, color(*ink), target),
            Primitive::Icon { at, icon, ink } => {
                if !self.icon_font.draw(*icon, *at, color(*ink), target)? {
                    draw_mono(LABEL_FONT, icon.fallback_label(), *at, color(*ink), target)?;
                }
                Ok(())
            }
        }
    }
}
