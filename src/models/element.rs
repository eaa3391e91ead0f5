use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// Placement shared by every element kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    /// Element opacity (1.0 when absent)
    #[serde(default)]
    pub opacity: Option<f64>,
}

impl Frame {
    pub fn opacity(&self) -> f64 {
        self.opacity.unwrap_or(1.0)
    }
}

/// Text orientation of a text box
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WritingMode {
    #[default]
    Horizontal,
    Vertical,
}

impl<'de> Deserialize<'de> for WritingMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(match value.as_str() {
            "vertical" | "vertical-rl" => WritingMode::Vertical,
            _ => WritingMode::Horizontal,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextElement {
    #[serde(flatten)]
    pub frame: Frame,
    /// Text to draw; JSON numbers and booleans are shown as written
    #[serde(default, deserialize_with = "string_or_number")]
    pub content: Option<String>,
    #[serde(default)]
    pub font_size: Option<f64>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub font_family: Option<String>,
    /// CSS font weight; JSON numbers such as `700` are accepted
    #[serde(default, deserialize_with = "string_or_number")]
    pub font_weight: Option<String>,
    #[serde(default)]
    pub line_height: Option<f64>,
    #[serde(default)]
    pub letter_spacing: Option<f64>,
    #[serde(default)]
    pub writing_mode: WritingMode,
    /// Accepted for compatibility; only locally indexed fonts are embedded
    #[serde(default)]
    pub custom_font_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageElement {
    #[serde(flatten)]
    pub frame: Frame,
    #[serde(default)]
    pub src: Option<String>,
}

/// One positioned box on the canvas.
///
/// The `type` field selects the variant. Elements with a missing or
/// unrecognized type, or with fields of the wrong shape, become
/// [`Element::Unknown`] and render nothing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    Text(TextElement),
    Image(ImageElement),
    Unknown,
}

impl<'de> Deserialize<'de> for Element {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let kind = value.get("type").and_then(|t| t.as_str());

        let parsed = match kind {
            Some("text") => serde_json::from_value(value).map(Element::Text),
            Some("image") => serde_json::from_value(value).map(Element::Image),
            _ => return Ok(Element::Unknown),
        };

        // One malformed element must not fail the whole render
        Ok(parsed.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Skipping malformed element");
            Element::Unknown
        }))
    }
}

impl Element {
    pub fn frame(&self) -> Option<&Frame> {
        match self {
            Element::Text(text) => Some(&text.frame),
            Element::Image(image) => Some(&image.frame),
            Element::Unknown => None,
        }
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(serde_json::Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}
