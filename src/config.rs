use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CuesmithError, Result};
use crate::fcpxml::StyleOverrides;

fn default_delimiters() -> Vec<String> {
    [" ", "\n", "।", "？", "?", "!", "！", ",", "，", "\"", "“", "”"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_sentence_enders() -> Vec<String> {
    [".", "\n", "。", "।", "？", "?", "!", "！", "…"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_max_chars() -> usize {
    35
}

fn default_pause_threshold() -> f64 {
    0.2
}

fn default_words_per_line() -> usize {
    1
}

fn default_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

fn default_endpoint() -> String {
    "https://api.groq.com/openai/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "openai/gpt-oss-120b".to_string()
}

fn default_target_language() -> String {
    "Simplified Chinese".to_string()
}

fn default_batch_size() -> usize {
    20
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_secs() -> f64 {
    5.0
}

fn default_retry_delay_secs() -> f64 {
    2.0
}

fn default_timeout_secs() -> u64 {
    45
}

fn default_temperature() -> f32 {
    0.3
}

fn default_fps() -> u32 {
    30
}

fn default_width() -> u32 {
    1920
}

fn default_height() -> u32 {
    1080
}

fn default_preferences_path() -> Option<PathBuf> {
    Some(PathBuf::from("subtitle_pref.json"))
}

fn default_word_suffix() -> String {
    "_word".to_string()
}

fn default_translated_suffix() -> String {
    "_cn".to_string()
}

fn default_audio_extension() -> String {
    "mp3".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub subtitle: SubtitleConfig,
    #[serde(default)]
    pub translate: TranslateConfig,
    #[serde(default)]
    pub fcpxml: FcpxmlConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleConfig {
    /// Characters at which an over-long line may be broken
    #[serde(default = "default_delimiters")]
    pub srt_delimiters: Vec<String>,
    /// Characters that always close a cue
    #[serde(default = "default_sentence_enders")]
    pub srt_sentence_enders: Vec<String>,
    /// Line length after which the next delimiter closes a cue
    #[serde(default = "default_max_chars")]
    pub srt_max_chars: usize,
    /// Silence (seconds) treated as a cue boundary
    #[serde(default = "default_pause_threshold")]
    pub srt_pause_threshold: f64,
    /// How standard mode measures a pause
    #[serde(default)]
    pub pause_rule: PauseRule,
    /// Tokens per cue in word-level mode
    #[serde(default = "default_words_per_line")]
    pub words_per_line: usize,
}

/// Pause measurement used by the standard segmentation mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PauseRule {
    /// A character whose own duration reaches the threshold closes the cue
    #[default]
    Duration,
    /// The silence between a character's end and the next start closes the cue
    Gap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// API key; falls back to the environment variable named by `api_key_env`
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// OpenAI-compatible chat completions endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Language name placed in the translation instruction
    #[serde(default = "default_target_language")]
    pub target_language: String,
    /// Segments per request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Additional attempts after the first failed request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First backoff step after a 429, doubled on every further 429
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: f64,
    /// Fixed pause after any other failure
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: f64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FcpxmlConfig {
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// Remove gaps between cues
    #[serde(default)]
    pub seamless: bool,
    /// JSON preference file consulted after explicit overrides
    #[serde(default = "default_preferences_path")]
    pub preferences_path: Option<PathBuf>,
    /// Explicit style for the source-language lane
    #[serde(default)]
    pub source: StyleOverrides,
    /// Explicit style for translation lanes
    #[serde(default)]
    pub translate: StyleOverrides,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Also write a word-level SRT
    #[serde(default)]
    pub word_level: bool,
    /// Also write a translated SRT
    #[serde(default)]
    pub translate: bool,
    /// Also export an FCPXML timeline
    #[serde(default)]
    pub export_fcpxml: bool,
    #[serde(default = "default_word_suffix")]
    pub word_suffix: String,
    #[serde(default = "default_translated_suffix")]
    pub translated_suffix: String,
    /// Extension for the decoded audio payload
    #[serde(default = "default_audio_extension")]
    pub audio_extension: String,
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self {
            srt_delimiters: default_delimiters(),
            srt_sentence_enders: default_sentence_enders(),
            srt_max_chars: default_max_chars(),
            srt_pause_threshold: default_pause_threshold(),
            pause_rule: PauseRule::default(),
            words_per_line: default_words_per_line(),
        }
    }
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_api_key_env(),
            endpoint: default_endpoint(),
            model: default_model(),
            target_language: default_target_language(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            base_delay_secs: default_base_delay_secs(),
            retry_delay_secs: default_retry_delay_secs(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
        }
    }
}

impl Default for FcpxmlConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            width: default_width(),
            height: default_height(),
            seamless: false,
            preferences_path: default_preferences_path(),
            source: StyleOverrides::default(),
            translate: StyleOverrides::default(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            word_level: false,
            translate: false,
            export_fcpxml: false,
            word_suffix: default_word_suffix(),
            translated_suffix: default_translated_suffix(),
            audio_extension: default_audio_extension(),
        }
    }
}

impl TranslateConfig {
    /// Explicit key first, then the configured environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|k| !k.trim().is_empty())
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CuesmithError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| CuesmithError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| CuesmithError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.translate.batch_size == 0 {
            return Err(CuesmithError::Config("translate.batch_size must be at least 1".to_string()));
        }
        if self.subtitle.words_per_line == 0 {
            return Err(CuesmithError::Config("subtitle.words_per_line must be at least 1".to_string()));
        }
        if self.fcpxml.fps == 0 {
            return Err(CuesmithError::Config("fcpxml.fps must be at least 1".to_string()));
        }
        if !self.subtitle.srt_pause_threshold.is_finite() || self.subtitle.srt_pause_threshold < 0.0 {
            return Err(CuesmithError::Config(
                "subtitle.srt_pause_threshold must be a non-negative number".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.subtitle.srt_max_chars, 35);
        assert_eq!(config.subtitle.srt_pause_threshold, 0.2);
        assert_eq!(config.subtitle.pause_rule, PauseRule::Duration);
        assert_eq!(config.translate.batch_size, 20);
        assert_eq!(config.translate.max_retries, 3);
        assert_eq!(config.translate.timeout_secs, 45);
        assert_eq!(config.fcpxml.fps, 30);
        assert!(config.subtitle.srt_sentence_enders.contains(&"。".to_string()));
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::from_toml_str(
            r#"
            [subtitle]
            srt_max_chars = 50
            pause_rule = "gap"

            [translate]
            batch_size = 5
            target_language = "Japanese"

            [fcpxml.source]
            fontSize = 64
            "#,
        )
        .unwrap();
        assert_eq!(config.subtitle.srt_max_chars, 50);
        assert_eq!(config.subtitle.pause_rule, PauseRule::Gap);
        assert_eq!(config.subtitle.srt_pause_threshold, 0.2);
        assert_eq!(config.translate.batch_size, 5);
        assert_eq!(config.translate.target_language, "Japanese");
        assert_eq!(config.fcpxml.source.font_size, Some(64.0));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let err = Config::from_toml_str("[translate]\nbatch_size = 0\n").unwrap_err();
        assert!(matches!(err, CuesmithError::Config(_)));
    }

    #[test]
    fn test_malformed_toml() {
        let err = Config::from_toml_str("[subtitle\nsrt_max_chars = 1").unwrap_err();
        assert!(matches!(err, CuesmithError::Toml(_)));
    }

    #[test]
    fn test_explicit_key_wins() {
        let config = TranslateConfig {
            api_key: Some("explicit".to_string()),
            api_key_env: "CUESMITH_TEST_UNSET_VARIABLE".to_string(),
            ..TranslateConfig::default()
        };
        assert_eq!(config.resolve_api_key().as_deref(), Some("explicit"));

        let blank = TranslateConfig {
            api_key: Some("   ".to_string()),
            api_key_env: "CUESMITH_TEST_UNSET_VARIABLE".to_string(),
            ..TranslateConfig::default()
        };
        assert_eq!(blank.resolve_api_key(), None);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cuesmith.toml");
        let mut config = Config::default();
        config.output.word_level = true;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert!(loaded.output.word_level);
        assert_eq!(loaded.translate.model, config.translate.model);
    }
}
