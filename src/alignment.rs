// TTS response ingestion.
//
// The speech service answers with a JSON body holding the synthesized audio
// (base64) and character-level alignment as three parallel arrays. This module
// turns that body into an `Alignment`, which the segment builders consume.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{CuesmithError, Result};

/// One character with its timing, as produced by the TTS service.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedChar {
    pub ch: char,
    pub start: f64,
    pub end: f64,
}

/// Character-level alignment: parallel arrays of equal length.
///
/// Timing arrays may be shorter than `characters` or contain holes; accessors
/// coerce anything missing to `0.0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Alignment {
    pub characters: Vec<String>,
    #[serde(alias = "character_start_times")]
    pub character_start_times_seconds: Vec<Option<f64>>,
    #[serde(alias = "character_end_times")]
    pub character_end_times_seconds: Vec<Option<f64>>,
}

impl Alignment {
    pub fn new(characters: Vec<String>, starts: Vec<f64>, ends: Vec<f64>) -> Self {
        Self {
            characters,
            character_start_times_seconds: starts.into_iter().map(Some).collect(),
            character_end_times_seconds: ends.into_iter().map(Some).collect(),
        }
    }

    /// Builds an alignment from a string, one entry per code point.
    pub fn from_chars(text: &str, starts: Vec<f64>, ends: Vec<f64>) -> Self {
        Self::new(text.chars().map(String::from).collect(), starts, ends)
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    pub fn start(&self, index: usize) -> f64 {
        self.character_start_times_seconds
            .get(index)
            .copied()
            .flatten()
            .unwrap_or(0.0)
    }

    pub fn end(&self, index: usize) -> f64 {
        self.character_end_times_seconds
            .get(index)
            .copied()
            .flatten()
            .unwrap_or(0.0)
    }

    /// Whether any timing entry had to be defaulted.
    pub fn has_missing_timing(&self) -> bool {
        let n = self.characters.len();
        self.character_start_times_seconds.len() < n
            || self.character_end_times_seconds.len() < n
            || self.character_start_times_seconds.iter().take(n).any(Option::is_none)
            || self.character_end_times_seconds.iter().take(n).any(Option::is_none)
    }

    /// Flattens the alignment into timed code points.
    ///
    /// An entry holding several code points spreads its timing over each of
    /// them; empty entries are skipped.
    pub fn timed_chars(&self) -> Vec<TimedChar> {
        if self.has_missing_timing() {
            warn!(
                "Alignment has {} characters but incomplete timing; missing values default to 0.0",
                self.characters.len()
            );
        }

        let mut out = Vec::with_capacity(self.characters.len());
        for (i, entry) in self.characters.iter().enumerate() {
            let (start, end) = (self.start(i), self.end(i));
            if entry.is_empty() {
                debug!("Skipping empty alignment entry at index {}", i);
                continue;
            }
            out.extend(entry.chars().map(|ch| TimedChar { ch, start, end }));
        }
        out
    }
}

impl Alignment {
    /// Reads either a bare alignment object or a whole TTS response.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content)?;
        if value.get("characters").is_some() {
            let raw: RawAlignment = serde_json::from_value(value)?;
            return Ok(convert_raw_alignment(raw));
        }
        let response = TtsResponse::from_json_str(content)?;
        response.require_alignment().cloned()
    }

    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CuesmithError::FileNotFound(path.display().to_string()));
        }
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_json_str(&content)
    }
}

/// Raw alignment object as it appears on the wire. Times may be numbers or
/// numeric strings.
#[derive(Debug, Deserialize)]
struct RawAlignment {
    #[serde(default)]
    characters: Vec<String>,
    #[serde(default, alias = "character_start_times")]
    character_start_times_seconds: Vec<Value>,
    #[serde(default, alias = "character_end_times")]
    character_end_times_seconds: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawTtsResponse {
    #[serde(default, alias = "audio")]
    audio_base64: Option<String>,
    #[serde(default)]
    alignment: Option<RawAlignment>,
    #[serde(default)]
    normalized_alignment: Option<RawAlignment>,
}

/// Parsed TTS response.
#[derive(Debug, Clone, Default)]
pub struct TtsResponse {
    pub audio: Option<Vec<u8>>,
    pub alignment: Option<Alignment>,
}

impl TtsResponse {
    pub fn from_json_str(content: &str) -> Result<Self> {
        let raw: RawTtsResponse = serde_json::from_str(content)?;

        let audio = match raw.audio_base64.as_deref().map(str::trim) {
            Some(encoded) if !encoded.is_empty() => Some(STANDARD.decode(encoded)?),
            _ => None,
        };

        let alignment = raw
            .alignment
            .filter(|a| !a.characters.is_empty())
            .or(raw.normalized_alignment)
            .map(convert_raw_alignment)
            .filter(|a| !a.is_empty());

        Ok(Self { audio, alignment })
    }

    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CuesmithError::FileNotFound(path.display().to_string()));
        }
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_json_str(&content)
    }

    /// Alignment or an error naming what is missing.
    pub fn require_alignment(&self) -> Result<&Alignment> {
        self.alignment
            .as_ref()
            .ok_or_else(|| CuesmithError::Alignment("TTS response carries no character alignment".to_string()))
    }
}

fn convert_raw_alignment(raw: RawAlignment) -> Alignment {
    let starts = raw.character_start_times_seconds.iter().map(time_value).collect();
    let ends = raw.character_end_times_seconds.iter().map(time_value).collect();
    Alignment {
        characters: raw.characters,
        character_start_times_seconds: starts,
        character_end_times_seconds: ends,
    }
}

fn time_value(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_time_string(s),
        _ => None,
    };
    if parsed.is_none() {
        warn!("Unparseable alignment time value: {}", value);
    }
    parsed
}

/// Accepts `"1.23"`, `"00:01.230"` and `"00:00:01.230"`.
fn parse_time_string(s: &str) -> Option<f64> {
    let s = s.trim();
    if !s.contains(':') {
        return s.parse().ok();
    }
    let parts: Vec<f64> = s
        .split(':')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    match parts.as_slice() {
        [h, m, sec] => Some(h * 3600.0 + m * 60.0 + sec),
        [m, sec] => Some(m * 60.0 + sec),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_timing_defaults_to_zero() {
        let alignment = Alignment::new(
            vec!["a".into(), "b".into(), "c".into()],
            vec![0.1, 0.2],
            vec![0.2],
        );
        assert!(alignment.has_missing_timing());
        assert_eq!(alignment.start(2), 0.0);
        assert_eq!(alignment.end(1), 0.0);

        let chars = alignment.timed_chars();
        assert_eq!(chars.len(), 3);
        assert_eq!(chars[0], TimedChar { ch: 'a', start: 0.1, end: 0.2 });
        assert_eq!(chars[2].start, 0.0);
    }

    #[test]
    fn test_bare_or_wrapped_alignment() {
        let bare = r#"{"characters": ["a"], "character_start_times_seconds": [0.5], "character_end_times_seconds": [0.75]}"#;
        let alignment = Alignment::from_json_str(bare).unwrap();
        assert_eq!(alignment.end(0), 0.75);

        let wrapped = format!(r#"{{"alignment": {}}}"#, bare);
        assert_eq!(Alignment::from_json_str(&wrapped).unwrap(), alignment);

        assert!(matches!(
            Alignment::from_json_str(r#"{"audio_base64": ""}"#),
            Err(CuesmithError::Alignment(_))
        ));
    }

    #[test]
    fn test_parse_response_with_aliases() {
        let body = r#"{
            "audio_base64": "aGVsbG8=",
            "alignment": {
                "characters": ["H", "i"],
                "character_start_times": [0, "0.25"],
                "character_end_times_seconds": ["00:00:00.250", null]
            }
        }"#;
        let response = TtsResponse::from_json_str(body).unwrap();
        assert_eq!(response.audio.as_deref(), Some(&b"hello"[..]));

        let alignment = response.require_alignment().unwrap();
        assert_eq!(alignment.characters, vec!["H", "i"]);
        assert_eq!(alignment.start(1), 0.25);
        assert_eq!(alignment.end(0), 0.25);
        assert_eq!(alignment.end(1), 0.0);
    }

    #[test]
    fn test_falls_back_to_normalized_alignment() {
        let body = r#"{
            "audio": "",
            "normalized_alignment": {
                "characters": ["x"],
                "character_start_times_seconds": [1.0],
                "character_end_times_seconds": [1.5]
            }
        }"#;
        let response = TtsResponse::from_json_str(body).unwrap();
        assert!(response.audio.is_none());
        assert_eq!(response.require_alignment().unwrap().end(0), 1.5);
    }

    #[test]
    fn test_absent_alignment_is_an_error() {
        let response = TtsResponse::from_json_str(r#"{"audio_base64": "aGk="}"#).unwrap();
        assert!(matches!(response.require_alignment(), Err(CuesmithError::Alignment(_))));
    }

    #[test]
    fn test_bad_base64_is_an_error() {
        let err = TtsResponse::from_json_str(r#"{"audio_base64": "***"}"#).unwrap_err();
        assert!(matches!(err, CuesmithError::Base64(_)));
    }

    #[test]
    fn test_multi_codepoint_entry_is_split() {
        let alignment = Alignment::new(vec!["ab".into(), "".into()], vec![1.0, 2.0], vec![1.5, 2.5]);
        let chars = alignment.timed_chars();
        assert_eq!(chars.len(), 2);
        assert!(chars.iter().all(|c| c.start == 1.0 && c.end == 1.5));
    }
}
