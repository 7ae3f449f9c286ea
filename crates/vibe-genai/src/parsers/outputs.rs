//! Typed model outputs

use super::{parse_json, strip_code_fences, ModelOutput};
use crate::error::ParseError;
use serde::{Deserialize, Deserializer, Serialize};
use vibe_document::HtmlDocument;

/// Scores and coordinates are percentages
fn clamp_percent<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = f64::deserialize(deserializer)?;
    Ok(if value.is_nan() { 0.0 } else { value.clamp(0.0, 100.0) })
}

fn clamp_score<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let value = clamp_percent(deserializer)?;
    // clamped to 0..=100 above
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(value.round() as u8)
}

/// Whole page from a generation call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedPage {
    pub html: String,
    #[serde(default)]
    pub css: String,
}

impl ModelOutput for GeneratedPage {
    const KIND: &'static str = "page";

    fn from_response(raw: &str) -> Result<Self, ParseError> {
        let page: Self = parse_json(Self::KIND, raw)?;
        if page.html.trim().is_empty() {
            return Err(ParseError::invalid(Self::KIND, "html is empty"));
        }
        Ok(page)
    }
}

/// Replacement markup for one section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemixMarkup(pub String);

impl RemixMarkup {
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl ModelOutput for RemixMarkup {
    const KIND: &'static str = "remix";

    fn from_response(raw: &str) -> Result<Self, ParseError> {
        let mut markup = strip_code_fences(raw);

        // tolerate {"html": "..."} even though raw HTML was asked for
        if markup.starts_with('{') {
            if let Ok(wrapped) = serde_json::from_str::<GeneratedPage>(&markup) {
                markup = wrapped.html;
            }
        }

        let lowered = markup.to_ascii_lowercase();
        if lowered.contains("<body") || lowered.contains("<html") {
            markup = HtmlDocument::parse(&markup)
                .body_markup()
                .map_err(|e| ParseError::invalid(Self::KIND, e.to_string()))?;
        }

        let markup = markup.trim();
        if markup.is_empty() {
            return Err(ParseError::Empty { kind: Self::KIND });
        }
        Ok(Self(markup.to_owned()))
    }
}

/// Rewritten copy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolishedCopy {
    pub text: String,
}

impl ModelOutput for PolishedCopy {
    const KIND: &'static str = "copy";

    fn from_response(raw: &str) -> Result<Self, ParseError> {
        let copy: Self = parse_json(Self::KIND, raw)?;
        let text = copy.text.trim();
        if text.is_empty() {
            return Err(ParseError::invalid(Self::KIND, "text is empty"));
        }
        Ok(Self { text: text.to_owned() })
    }
}

/// Design roast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roast {
    pub roast: String,
    #[serde(deserialize_with = "clamp_score")]
    pub score: u8,
    #[serde(default)]
    pub improvements: Vec<String>,
}

impl ModelOutput for Roast {
    const KIND: &'static str = "roast";

    fn from_response(raw: &str) -> Result<Self, ParseError> {
        parse_json(Self::KIND, raw)
    }
}

/// Aesthetic score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VibeScore {
    #[serde(deserialize_with = "clamp_score")]
    pub score: u8,
    pub vibe: String,
    #[serde(default)]
    pub explanation: String,
}

impl ModelOutput for VibeScore {
    const KIND: &'static str = "vibe-score";

    fn from_response(raw: &str) -> Result<Self, ParseError> {
        parse_json(Self::KIND, raw)
    }
}

/// Predicted attention point, coordinates in percent of the image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocalPoint {
    #[serde(deserialize_with = "clamp_percent")]
    pub x: f64,
    #[serde(deserialize_with = "clamp_percent")]
    pub y: f64,
    pub label: String,
    #[serde(default)]
    pub reason: String,
}

/// Focal points, most attention first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Heatmap(pub Vec<FocalPoint>);

impl ModelOutput for Heatmap {
    const KIND: &'static str = "heatmap";

    fn from_response(raw: &str) -> Result<Self, ParseError> {
        parse_json(Self::KIND, raw).map(Self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandColor {
    pub name: String,
    pub hex: String,
    #[serde(default)]
    pub usage: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandFonts {
    pub primary: String,
    pub secondary: String,
}

/// Extracted design system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandKit {
    pub vibe: String,
    pub colors: Vec<BrandColor>,
    pub fonts: BrandFonts,
}

impl ModelOutput for BrandKit {
    const KIND: &'static str = "brand-match";

    fn from_response(raw: &str) -> Result<Self, ParseError> {
        let mut kit: Self = parse_json(Self::KIND, raw)?;
        for color in &mut kit.colors {
            let hex = color.hex.trim().trim_start_matches('#');
            if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(ParseError::invalid(Self::KIND, format!("bad color {:?}", color.hex)));
            }
            color.hex = format!("#{}", hex.to_ascii_uppercase());
        }
        Ok(kit)
    }
}
