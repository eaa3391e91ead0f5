use serde::{Deserialize, Deserializer, Serialize};

use super::Element;

/// Default canvas width in CSS pixels
pub const DEFAULT_WIDTH: f64 = 750.0;
/// Default canvas height in CSS pixels
pub const DEFAULT_HEIGHT: f64 = 1334.0;

// Upper bound on viewport and clip size to keep a single request from
// asking the browser for an unbounded surface.
const MAX_PIXEL_DIMENSION: u32 = 8192;

/// One render job: canvas size plus elements in paint order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderRequest {
    #[serde(default = "default_width")]
    pub width: f64,
    #[serde(default = "default_height")]
    pub height: f64,
    /// `null` is treated like an empty list
    #[serde(default, deserialize_with = "null_as_empty")]
    pub elements: Vec<Element>,
}

fn default_width() -> f64 {
    DEFAULT_WIDTH
}

fn default_height() -> f64 {
    DEFAULT_HEIGHT
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Element>, D::Error> {
    Ok(Option::<Vec<Element>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            elements: Vec::new(),
        }
    }
}

impl RenderRequest {
    /// Viewport and clip width in whole pixels
    pub fn pixel_width(&self) -> u32 {
        to_pixels(self.width)
    }

    /// Viewport and clip height in whole pixels
    pub fn pixel_height(&self) -> u32 {
        to_pixels(self.height)
    }

    /// Element counts for the request log: (images, texts, texts with a custom font URL)
    pub fn element_counts(&self) -> (usize, usize, usize) {
        let mut images = 0;
        let mut texts = 0;
        let mut custom_fonts = 0;
        for element in &self.elements {
            match element {
                Element::Image(_) => images += 1,
                Element::Text(text) => {
                    texts += 1;
                    if text.custom_font_url.is_some() {
                        custom_fonts += 1;
                    }
                }
                Element::Unknown => {}
            }
        }
        (images, texts, custom_fonts)
    }
}

fn to_pixels(value: f64) -> u32 {
    if !value.is_finite() {
        return 1;
    }
    (value.round().max(1.0) as u32).min(MAX_PIXEL_DIMENSION)
}
