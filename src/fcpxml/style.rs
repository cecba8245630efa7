// Title styling.
//
// Every property is resolved once, in order: explicit override, then the
// preference file, then a built-in default.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{CuesmithError, Result};

/// RGBA color with 0-1 components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ColorRepr", into = "String")]
pub struct Rgba(pub [f64; 4]);

#[derive(Deserialize)]
#[serde(untagged)]
enum ColorRepr {
    List(Vec<f64>),
    Text(String),
}

impl TryFrom<ColorRepr> for Rgba {
    type Error = String;

    fn try_from(repr: ColorRepr) -> std::result::Result<Self, Self::Error> {
        let values = match repr {
            ColorRepr::List(values) => values,
            ColorRepr::Text(text) => text
                .split_whitespace()
                .map(|p| p.parse::<f64>().map_err(|e| format!("bad color component '{}': {}", p, e)))
                .collect::<std::result::Result<_, _>>()?,
        };
        match values.as_slice() {
            [r, g, b, a] => Ok(Rgba([*r, *g, *b, *a])),
            [r, g, b] => Ok(Rgba([*r, *g, *b, 1.0])),
            _ => Err(format!("expected 3 or 4 color components, got {}", values.len())),
        }
    }
}

impl From<Rgba> for String {
    fn from(color: Rgba) -> Self {
        color.to_string()
    }
}

impl std::fmt::Display for Rgba {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [r, g, b, a] = self.0;
        write!(f, "{} {} {} {}", r, g, b, a)
    }
}

impl Rgba {
    pub fn alpha(&self) -> f64 {
        self.0[3]
    }
}

/// Drop-shadow offset in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "OffsetRepr", into = "[f64; 2]")]
pub struct ShadowOffset {
    pub x: f64,
    pub y: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OffsetRepr {
    Pair([f64; 2]),
    Text(String),
}

impl TryFrom<OffsetRepr> for ShadowOffset {
    type Error = String;

    fn try_from(repr: OffsetRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            OffsetRepr::Pair([x, y]) => Ok(Self { x, y }),
            OffsetRepr::Text(text) => {
                let parts: Vec<f64> = text
                    .split_whitespace()
                    .map(|p| p.parse::<f64>())
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|e| format!("bad shadow offset '{}': {}", text, e))?;
                match parts.as_slice() {
                    [x, y] => Ok(Self { x: *x, y: *y }),
                    _ => Err(format!("expected 'x y' shadow offset, got '{}'", text)),
                }
            }
        }
    }
}

impl From<ShadowOffset> for [f64; 2] {
    fn from(offset: ShadowOffset) -> Self {
        [offset.x, offset.y]
    }
}

impl ShadowOffset {
    /// Distance and angle (degrees, 0-360, counted from the positive x axis).
    pub fn polar(&self) -> (f64, f64) {
        let distance = self.x.hypot(self.y);
        let mut angle = self.y.atan2(self.x).to_degrees();
        if angle < 0.0 {
            angle += 360.0;
        }
        (distance, angle)
    }
}

/// Numbers in preference files are sometimes written as strings.
fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Number {
        Value(f64),
        Text(String),
    }

    match Option::<Number>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Number::Value(v)) => Ok(Some(v)),
        Some(Number::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| serde::de::Error::custom(format!("bad number '{}': {}", text, e))),
    }
}

/// Optional style properties for one lane. Unset fields fall through to
/// the next layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_color: Option<Rgba>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub line_spacing: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<Rgba>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_stroke: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow_color: Option<Rgba>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow_offset: Option<ShadowOffset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_shadow: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<Rgba>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_background: Option<bool>,
    /// Vertical position of the title
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub pos: Option<f64>,
}

impl StyleOverrides {
    /// Fields set on `self` win; the rest come from `fallback`.
    pub fn or(self, fallback: StyleOverrides) -> StyleOverrides {
        StyleOverrides {
            alignment: self.alignment.or(fallback.alignment),
            font: self.font.or(fallback.font),
            font_size: self.font_size.or(fallback.font_size),
            bold: self.bold.or(fallback.bold),
            italic: self.italic.or(fallback.italic),
            font_color: self.font_color.or(fallback.font_color),
            line_spacing: self.line_spacing.or(fallback.line_spacing),
            stroke_color: self.stroke_color.or(fallback.stroke_color),
            stroke_width: self.stroke_width.or(fallback.stroke_width),
            use_stroke: self.use_stroke.or(fallback.use_stroke),
            shadow_color: self.shadow_color.or(fallback.shadow_color),
            shadow_offset: self.shadow_offset.or(fallback.shadow_offset),
            use_shadow: self.use_shadow.or(fallback.use_shadow),
            background_color: self.background_color.or(fallback.background_color),
            use_background: self.use_background.or(fallback.use_background),
            pos: self.pos.or(fallback.pos),
        }
    }
}

/// Which timeline lane a style applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    Source,
    Translation,
}

impl Lane {
    /// Key prefix used in the preference file.
    fn pref_prefix(self) -> &'static str {
        match self {
            Lane::Source => "source_",
            Lane::Translation => "trans_",
        }
    }

    fn default_pos(self) -> f64 {
        match self {
            Lane::Source => -45.0,
            Lane::Translation => -38.0,
        }
    }
}

/// Style preferences shared between runs, stored as one flat JSON object
/// with `source_` and `trans_` prefixed keys (`source_fontSize`, `trans_pos`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StylePreferences {
    pub source: StyleOverrides,
    pub translation: StyleOverrides,
}

impl StylePreferences {
    pub fn from_json_str(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content)?;
        let Value::Object(map) = value else {
            return Err(CuesmithError::Config("Style preferences must be a JSON object".to_string()));
        };

        let mut prefs = Self::default();
        for (key, value) in map {
            let (lane, field) = if let Some(field) = key.strip_prefix(Lane::Source.pref_prefix()) {
                (Lane::Source, field)
            } else if let Some(field) = key.strip_prefix(Lane::Translation.pref_prefix()) {
                (Lane::Translation, field)
            } else {
                continue;
            };

            let mut single = serde_json::Map::new();
            single.insert(field.to_string(), value);
            match serde_json::from_value::<StyleOverrides>(Value::Object(single)) {
                Ok(parsed) => {
                    let slot = match lane {
                        Lane::Source => &mut prefs.source,
                        Lane::Translation => &mut prefs.translation,
                    };
                    *slot = parsed.or(std::mem::take(slot));
                }
                Err(e) => warn!("Ignoring style preference '{}': {}", key, e),
            }
        }
        Ok(prefs)
    }

    /// Loads preferences if the file exists; a missing file means none.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No style preferences at {}", path.display());
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_json_str(&content)
    }

    pub fn for_lane(&self, lane: Lane) -> &StyleOverrides {
        match lane {
            Lane::Source => &self.source,
            Lane::Translation => &self.translation,
        }
    }
}

/// A fully resolved title style.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub alignment: String,
    pub font: String,
    pub font_size: f64,
    pub bold: bool,
    pub italic: bool,
    pub font_color: Rgba,
    pub line_spacing: f64,
    pub stroke_color: Rgba,
    pub stroke_width: f64,
    pub use_stroke: bool,
    pub shadow_color: Rgba,
    pub shadow_offset: ShadowOffset,
    pub use_shadow: bool,
    pub background_color: Rgba,
    pub use_background: bool,
    pub position_y: f64,
}

impl TextStyle {
    pub fn resolve(explicit: &StyleOverrides, prefs: &StylePreferences, lane: Lane) -> Self {
        let layered = explicit.clone().or(prefs.for_lane(lane).clone());

        let stroke_width = layered.stroke_width.unwrap_or(0.0);
        let shadow_color = layered.shadow_color.unwrap_or(Rgba([0.0, 0.0, 0.0, 0.5]));
        let background_color = layered.background_color.unwrap_or(Rgba([0.0, 0.0, 0.0, 0.0]));

        Self {
            alignment: layered.alignment.unwrap_or_else(|| "center".to_string()),
            font: layered.font.unwrap_or_else(|| "Arial".to_string()),
            font_size: layered.font_size.unwrap_or(50.0),
            bold: layered.bold.unwrap_or(false),
            italic: layered.italic.unwrap_or(false),
            font_color: layered.font_color.unwrap_or(Rgba([1.0, 1.0, 1.0, 1.0])),
            line_spacing: layered.line_spacing.unwrap_or(0.0),
            stroke_color: layered.stroke_color.unwrap_or(Rgba([1.0, 1.0, 1.0, 1.0])),
            stroke_width,
            use_stroke: layered.use_stroke.unwrap_or(stroke_width > 0.0),
            shadow_color,
            shadow_offset: layered.shadow_offset.unwrap_or(ShadowOffset { x: 2.0, y: 2.0 }),
            use_shadow: layered.use_shadow.unwrap_or(shadow_color.alpha() > 0.0),
            background_color,
            use_background: layered.use_background.unwrap_or(background_color.alpha() > 0.0),
            position_y: layered.pos.unwrap_or(lane.default_pos()),
        }
    }

    /// Attributes of the `text-style` element inside `text-style-def`.
    pub fn attributes(&self) -> Vec<(&'static str, String)> {
        let flag = |b: bool| if b { "1" } else { "0" }.to_string();
        let (distance, angle) = self.shadow_offset.polar();

        vec![
            ("alignment", self.alignment.clone()),
            ("fontColor", self.font_color.to_string()),
            ("bold", flag(self.bold)),
            ("italic", flag(self.italic)),
            ("font", self.font.clone()),
            ("fontSize", self.font_size.to_string()),
            ("lineSpacing", self.line_spacing.to_string()),
            ("strokeColor", self.stroke_color.to_string()),
            ("strokeWidth", self.stroke_width.to_string()),
            ("useStroke", flag(self.use_stroke)),
            ("shadowColor", self.shadow_color.to_string()),
            ("shadowOffset", format!("{:.1} {:.1}", distance, angle)),
            ("useDropShadow", flag(self.use_shadow)),
            ("backgroundColor", self.background_color.to_string()),
            ("useBackground", flag(self.use_background)),
        ]
    }

    /// Value of the `position` attribute of `adjust-transform`.
    pub fn position(&self) -> String {
        format!("0 {}", self.position_y)
    }
}
