//! Turns a [`RenderRequest`] into a self-contained HTML document.
//!
//! Composition is pure: image locations and embedded fonts are resolved by
//! the caller beforehand and passed in through [`ResolvedResources`].

use std::collections::HashMap;
use std::fmt::Write;

use crate::models::{Element, ImageElement, RenderRequest, TextElement, WritingMode};

/// Family used when a text element names no font
const FALLBACK_FAMILY: &str = "Arial, sans-serif";
const DEFAULT_LINE_HEIGHT: f64 = 1.5;
/// Letter spacing for vertical text without an explicit value
const VERTICAL_LETTER_SPACING: &str = "0.2em";

const BASE_STYLE: &str = "body{margin:0;padding:0;background:white;overflow:hidden}\
.element{position:absolute;box-sizing:border-box}\
.text-inner{width:100%;height:100%;display:flex;align-items:center;justify-content:center;white-space:pre-wrap;word-wrap:break-word;word-break:break-word}\
.text-inner.vertical{writing-mode:vertical-rl;text-orientation:upright}\
.image-inner{width:100%;height:100%;object-fit:contain;display:block}";

/// Lookups performed before composition
#[derive(Debug, Default, Clone)]
pub struct ResolvedResources {
    /// Declared font family → `data:` URI of a local font file
    pub fonts: HashMap<String, String>,
    /// Original image `src` → location the document should load
    pub images: HashMap<String, String>,
}

/// Escape `&`, `<` and `>` for a text node
pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

/// Escape for a single-quoted CSS string inside a `<style>` block
fn escape_css_string(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('<', "\\3c ")
}

/// Build the document for `request`.
pub fn compose(request: &RenderRequest, resources: &ResolvedResources) -> String {
    let mut html = String::with_capacity(4096);

    html.push_str("<!doctype html><html><head><meta charset=\"utf-8\"><style>");
    html.push_str(BASE_STYLE);
    let _ = write!(
        html,
        ".canvas{{width:{}px;height:{}px;position:relative}}",
        request.width, request.height
    );
    for (family, data_uri) in font_faces(request, resources) {
        let _ = write!(
            html,
            "@font-face{{font-family:'{}';src:url('{}')}}",
            escape_css_string(family),
            data_uri
        );
    }
    html.push_str("</style></head><body><div class=\"canvas\">");

    for (index, element) in request.elements.iter().enumerate() {
        match element {
            Element::Text(text) => push_text(&mut html, index, text, resources),
            Element::Image(image) => push_image(&mut html, index, image, resources),
            Element::Unknown => {}
        }
    }

    html.push_str("</div></body></html>");
    html
}

/// One `@font-face` per distinct embedded family, in first-use order
fn font_faces<'a>(
    request: &'a RenderRequest,
    resources: &'a ResolvedResources,
) -> Vec<(&'a str, &'a str)> {
    let mut faces: Vec<(&str, &str)> = Vec::new();
    for element in &request.elements {
        let Element::Text(text) = element else {
            continue;
        };
        let Some(family) = text.font_family.as_deref() else {
            continue;
        };
        if faces.iter().any(|(f, _)| *f == family) {
            continue;
        }
        if let Some(data_uri) = resources.fonts.get(family) {
            faces.push((family, data_uri.as_str()));
        }
    }
    faces
}

fn box_style(index: usize, frame: &crate::models::Frame) -> String {
    format!(
        "left:{}px;top:{}px;width:{}px;height:{}px;opacity:{};z-index:{};",
        frame.x,
        frame.y,
        frame.width,
        frame.height,
        frame.opacity(),
        index
    )
}

fn push_text(html: &mut String, index: usize, text: &TextElement, resources: &ResolvedResources) {
    let Some(content) = text.content.as_deref().filter(|c| !c.is_empty()) else {
        return;
    };

    let mut style = String::new();
    if let Some(size) = text.font_size {
        let _ = write!(style, "font-size:{size}px;");
    }
    if let Some(color) = text.color.as_deref() {
        let _ = write!(style, "color:{color};");
    }
    match text.font_family.as_deref() {
        Some(family) if resources.fonts.contains_key(family) => {
            let _ = write!(
                style,
                "font-family:'{}', sans-serif;",
                escape_css_string(family)
            );
        }
        Some(family) if !family.is_empty() => {
            let _ = write!(style, "font-family:{family};");
        }
        _ => {
            let _ = write!(style, "font-family:{FALLBACK_FAMILY};");
        }
    }
    let _ = write!(
        style,
        "font-weight:{};line-height:{};",
        text.font_weight.as_deref().unwrap_or("normal"),
        text.line_height.unwrap_or(DEFAULT_LINE_HEIGHT)
    );

    let vertical = text.writing_mode == WritingMode::Vertical;
    match (vertical, text.letter_spacing) {
        (_, Some(spacing)) => {
            let _ = write!(style, "letter-spacing:{spacing}px;");
        }
        (true, None) => {
            let _ = write!(style, "letter-spacing:{VERTICAL_LETTER_SPACING};");
        }
        (false, None) => style.push_str("letter-spacing:0px;"),
    }

    let class = if vertical {
        "text-inner vertical"
    } else {
        "text-inner"
    };

    let _ = write!(
        html,
        "<div class=\"element\" style=\"{}\"><div class=\"{}\" style=\"{}\">{}</div></div>",
        escape_attr(&box_style(index, &text.frame)),
        class,
        escape_attr(&style),
        escape_text(content)
    );
}

fn push_image(
    html: &mut String,
    index: usize,
    image: &ImageElement,
    resources: &ResolvedResources,
) {
    let Some(src) = image.src.as_deref().filter(|s| !s.is_empty()) else {
        return;
    };
    let location = resources.images.get(src).map(String::as_str).unwrap_or(src);

    let _ = write!(
        html,
        "<div class=\"element\" style=\"{}\"><img src=\"{}\" class=\"image-inner\" /></div>",
        escape_attr(&box_style(index, &image.frame)),
        escape_attr(location)
    );
}
