//! Font resources for the panel.
//!
//! Both fonts are TrueType files on disk. The text font degrades to a
//! built-in bitmap font; the icon font degrades to short text labels, which
//! the renderer draws in the icon's place.

use anyhow::{anyhow, Context, Result};
use embedded_graphics::{
    mono_font::{ascii::FONT_5X8, iso_8859_1::FONT_6X10, MonoFont, MonoTextStyle},
    pixelcolor::BinaryColor,
    prelude::*,
    text::{Baseline, Text},
};
use fontdue::{Font, FontSettings};
use log::{info, warn};
use std::path::Path;

/// Used when the text font file cannot be loaded. Latin-1 so "°C" survives.
pub const BUILTIN_TEXT_FONT: &MonoFont<'static> = &FONT_6X10;
/// Small enough that every fallback label fits in the icon column.
pub const LABEL_FONT: &MonoFont<'static> = &FONT_5X8;

const COVERAGE_THRESHOLD: u8 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Icon {
    Wifi,
    Processor,
    Thermometer,
    Tx,
    Rx,
    Microphone,
    Antenna,
}

impl Icon {
    /// Font Awesome 5 solid code points.
    pub fn glyph(self) -> char {
        match self {
            Icon::Wifi => '\u{f1eb}',
            Icon::Processor => '\u{f2db}',
            Icon::Thermometer => '\u{f2c8}',
            Icon::Tx => '\u{f7c0}',
            Icon::Rx => '\u{f519}',
            Icon::Microphone => '\u{f130}',
            Icon::Antenna => '\u{f0c1}',
        }
    }

    pub fn fallback_label(self) -> &'static str {
        match self {
            Icon::Wifi => "IP:",
            Icon::Processor => "CPU",
            Icon::Thermometer => "T:",
            Icon::Tx => ">",
            Icon::Rx => "<",
            Icon::Microphone => "S:",
            Icon::Antenna => "CH:",
        }
    }
}

/// A rasterized TrueType face at a fixed pixel size.
pub struct TtfFace {
    font: Font,
    px: f32,
    ascent: i32,
}

impl TtfFace {
    pub fn load(path: &Path, px: f32) -> Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_bytes(&bytes, px).with_context(|| format!("loading {}", path.display()))
    }

    pub fn from_bytes(bytes: &[u8], px: f32) -> Result<Self> {
        let settings = FontSettings {
            scale: px,
            ..FontSettings::default()
        };
        let font = Font::from_bytes(bytes, settings).map_err(|e| anyhow!(e))?;
        let ascent = font
            .horizontal_line_metrics(px)
            .map(|m| m.ascent.round() as i32)
            .unwrap_or(px.round() as i32);
        Ok(TtfFace { font, px, ascent })
    }

    pub fn has_glyph(&self, ch: char) -> bool {
        self.font.lookup_glyph_index(ch) != 0
    }

    /// Lit pixels for `text` with its ascender line at `origin.y`.
    pub fn pixels(&self, text: &str, origin: Point) -> Vec<Point> {
        let baseline = origin.y + self.ascent;
        let mut pen_x = 0.0f32;
        let mut lit = Vec::new();

        for ch in text.chars() {
            let (metrics, coverage) = self.font.rasterize(ch, self.px);
            let left = origin.x + pen_x.round() as i32 + metrics.xmin;
            let top = baseline - (metrics.ymin + metrics.height as i32);

            for (i, &alpha) in coverage.iter().enumerate() {
                if alpha >= COVERAGE_THRESHOLD {
                    let col = (i % metrics.width) as i32;
                    let row = (i / metrics.width) as i32;
                    lit.push(Point::new(left + col, top + row));
                }
            }
            pen_x += metrics.advance_width;
        }
        lit
    }

    pub fn draw<D>(&self, text: &str, origin: Point, color: BinaryColor, target: &mut D) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = BinaryColor>,
    {
        target.draw_iter(self.pixels(text, origin).into_iter().map(|p| Pixel(p, color)))
    }
}

pub enum TextFont {
    Ttf(TtfFace),
    Builtin(&'static MonoFont<'static>),
}

impl TextFont {
    pub fn load(path: &Path, px: f32) -> Self {
        match TtfFace::load(path, px) {
            Ok(face) => {
                info!("Text font: {} @ {}px", path.display(), px);
                TextFont::Ttf(face)
            }
            Err(e) => {
                warn!("{:#}; using built-in text font", e);
                TextFont::builtin()
            }
        }
    }

    pub fn builtin() -> Self {
        TextFont::Builtin(BUILTIN_TEXT_FONT)
    }

    pub fn draw<D>(&self, text: &str, origin: Point, color: BinaryColor, target: &mut D) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = BinaryColor>,
    {
        match self {
            TextFont::Ttf(face) => face.draw(text, origin, color, target),
            TextFont::Builtin(font) => draw_mono(font, text, origin, color, target),
        }
    }
}

pub struct IconFont {
    face: Option<TtfFace>,
}

impl IconFont {
    pub fn load(path: &Path, px: f32) -> Self {
        match TtfFace::load(path, px) {
            Ok(face) => {
                info!("Icon font: {} @ {}px", path.display(), px);
                IconFont { face: Some(face) }
            }
            Err(e) => {
                warn!("{:#}; icons will be shown as text labels", e);
                IconFont::unavailable()
            }
        }
    }

    pub fn unavailable() -> Self {
        IconFont { face: None }
    }

    #[cfg(test)]
    pub fn is_available(&self) -> bool {
        self.face.is_some()
    }

    /// Draws the icon if the font has it. `Ok(false)` means the caller must
    /// substitute something else.
    pub fn draw<D>(&self, icon: Icon, origin: Point, color: BinaryColor, target: &mut D) -> Result<bool, D::Error>
    where
        D: DrawTarget<Color = BinaryColor>,
    {
        match &self.face {
            Some(face) if face.has_glyph(icon.glyph()) => {
                let mut buf = [0u8; 4];
                face.draw(icon.glyph().encode_utf8(&mut buf), origin, color, target)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

pub fn draw_mono<D>(
    font: &MonoFont<'_>,
    text: &str,
    origin: Point,
    color: BinaryColor,
    target: &mut D,
) -> Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    Text::with_baseline(text, origin, MonoTextStyle::new(font, color), Baseline::Top)
        .draw(target)
        .map(|_| ())
}
