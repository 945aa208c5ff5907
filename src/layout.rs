use ab_glyph::{Font, FontArc, PxScale, ScaleFont};

use crate::error::ShowError;

/// Largest candidate font size the fit search starts from.
pub const FONT_CEILING: u32 = 50;

/// A text box in pixels, top-left origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl LayoutRect {
    /// Resolve a box authored in screen fractions against the frame size.
    pub fn from_fractions(fx: f32, fy: f32, fw: f32, fh: f32, screen_w: f32, screen_h: f32) -> Self {
        Self {
            x: fx * screen_w,
            y: fy * screen_h,
            width: fw * screen_w,
            height: fh * screen_h,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

/// Width/height source for the fit simulation. The app measures with the
/// real font; tests use fixed advances.
pub trait TextMetrics {
    fn word_width(&self, word: &str, font_size: f32) -> f32;
    fn space_width(&self, font_size: f32) -> f32;
    fn line_height(&self, font_size: f32) -> f32;
}

/// Glyph advances from the shipped TTF.
pub struct FontMetrics {
    font: FontArc,
}

impl FontMetrics {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ShowError> {
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| ShowError::InvalidFont(e.to_string()))?;
        Ok(Self { font })
    }
}

impl TextMetrics for FontMetrics {
    fn word_width(&self, word: &str, font_size: f32) -> f32 {
        let scaled = self.font.as_scaled(PxScale::from(font_size));
        word.chars()
            .map(|c| scaled.h_advance(self.font.glyph_id(c)))
            .sum()
    }

    fn space_width(&self, font_size: f32) -> f32 {
        self.word_width(" ", font_size)
    }

    fn line_height(&self, font_size: f32) -> f32 {
        let scaled = self.font.as_scaled(PxScale::from(font_size));
        scaled.height() + scaled.line_gap()
    }
}

/// One word's glyph-run origin inside the resolved box.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedWord {
    pub text: String,
    pub x: f32,
    pub y: f32,
}

/// A fitted text block: the box, the chosen size, and where every word goes.
/// Recomputed whenever text or box changes, never patched in place.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLayout {
    pub rect: LayoutRect,
    pub font_size: f32,
    pub words: Vec<PlacedWord>,
}

/// Fit `text` into `rect`: walk candidate sizes down from the ceiling and
/// keep the first one whose greedy wrap stays inside the box. Size 1 is the
/// floor; the result may overflow there but the call never fails.
pub fn fit(text: &str, rect: LayoutRect, metrics: &impl TextMetrics) -> TextLayout {
    for size in (2..=FONT_CEILING).rev() {
        let (words, fits) = wrap(text, rect, metrics, size as f32);
        if fits {
            return TextLayout {
                rect,
                font_size: size as f32,
                words,
            };
        }
    }

    let (words, _) = wrap(text, rect, metrics, 1.0);
    TextLayout {
        rect,
        font_size: 1.0,
        words,
    }
}

/// Greedy word wrap at one size. Words are ASCII-space splits; a word that
/// would cross the box's right edge starts a new line. Both the fit search
/// and glyph placement go through here, so measuring and rendering share one
/// overflow threshold.
///
/// Returns the placements and whether they stayed inside the box.
fn wrap(
    text: &str,
    rect: LayoutRect,
    metrics: &impl TextMetrics,
    font_size: f32,
) -> (Vec<PlacedWord>, bool) {
    let line_height = metrics.line_height(font_size);
    let space = metrics.space_width(font_size);

    let mut words = Vec::new();
    let mut fits = true;
    let mut x = rect.x;
    let mut y = rect.y;

    for word in text.split(' ').filter(|w| !w.is_empty()) {
        let width = metrics.word_width(word, font_size);

        if x + width > rect.right() && x > rect.x {
            x = rect.x;
            y += line_height;
        }
        if x + width > rect.right() {
            // A single word wider than the box can never wrap into it.
            fits = false;
        }

        words.push(PlacedWord {
            text: word.to_string(),
            x,
            y,
        });
        x += width + space;
    }

    if y + line_height > rect.bottom() {
        fits = false;
    }

    (words, fits)
}
