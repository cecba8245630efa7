// Subtitle segmentation
//
// Turns character-level alignment into subtitle cues:
// - Standard: sentence enders, pauses and line length close a cue
// - Word-level: tokens grouped N per cue, CJK aware
// - Lines: one cue per line of the original script

pub mod cjk;
pub mod grapheme;
pub mod lines;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use crate::alignment::{Alignment, TimedChar};
use crate::config::{PauseRule, SubtitleConfig};
use cjk::Token;

/// A subtitle cue in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

impl Segment {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// How the builder groups characters into segments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BuildMode {
    /// Sentence/pause based. `ignore_line_length` disables the line-length
    /// break, which keeps whole sentences together for translation.
    Standard { ignore_line_length: bool },
    /// `words_per_line` tokens per segment.
    WordLevel { words_per_line: usize },
}

impl BuildMode {
    /// Standard mode honouring the line length, for on-screen subtitles.
    pub fn display() -> Self {
        Self::Standard { ignore_line_length: false }
    }

    /// Standard mode without the line length, for translation input.
    pub fn sentences() -> Self {
        Self::Standard { ignore_line_length: true }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentBuilderConfig {
    pub delimiters: HashSet<String>,
    pub sentence_enders: HashSet<String>,
    pub max_chars_per_line: usize,
    pub pause_threshold: f64,
    pub pause_rule: PauseRule,
}

impl Default for SegmentBuilderConfig {
    fn default() -> Self {
        Self::from(&SubtitleConfig::default())
    }
}

impl From<&SubtitleConfig> for SegmentBuilderConfig {
    fn from(config: &SubtitleConfig) -> Self {
        Self {
            delimiters: config.srt_delimiters.iter().cloned().collect(),
            sentence_enders: config.srt_sentence_enders.iter().cloned().collect(),
            max_chars_per_line: config.srt_max_chars,
            pause_threshold: config.srt_pause_threshold,
            pause_rule: config.pause_rule,
        }
    }
}

/// Field replacements for [`SegmentBuilder::reconfigure`]. `None` keeps the
/// current value.
#[derive(Debug, Clone, Default)]
pub struct BuilderOverrides {
    pub delimiters: Option<HashSet<String>>,
    pub sentence_enders: Option<HashSet<String>>,
    pub max_chars_per_line: Option<usize>,
    pub pause_threshold: Option<f64>,
    pub pause_rule: Option<PauseRule>,
}

pub struct SegmentBuilder {
    config: SegmentBuilderConfig,
}

fn set_contains(set: &HashSet<String>, ch: char) -> bool {
    let mut buf = [0u8; 4];
    set.contains(&*ch.encode_utf8(&mut buf))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl SegmentBuilder {
    pub fn new(config: SegmentBuilderConfig) -> Self {
        Self { config }
    }

    pub fn from_subtitle_config(config: &SubtitleConfig) -> Self {
        Self::new(SegmentBuilderConfig::from(config))
    }

    pub fn config(&self) -> &SegmentBuilderConfig {
        &self.config
    }

    /// Replaces the given fields. Segments already returned are unaffected.
    pub fn reconfigure(&mut self, overrides: BuilderOverrides) {
        if let Some(delimiters) = overrides.delimiters {
            self.config.delimiters = delimiters;
        }
        if let Some(enders) = overrides.sentence_enders {
            self.config.sentence_enders = enders;
        }
        if let Some(max_chars) = overrides.max_chars_per_line {
            self.config.max_chars_per_line = max_chars;
        }
        if let Some(threshold) = overrides.pause_threshold {
            self.config.pause_threshold = threshold;
        }
        if let Some(rule) = overrides.pause_rule {
            self.config.pause_rule = rule;
        }
    }

    /// Builds segments from a TTS alignment.
    pub fn build_segments(&self, alignment: &Alignment, mode: BuildMode) -> Vec<Segment> {
        self.build(&alignment.timed_chars(), mode)
    }

    /// Builds segments from timed characters. Empty input yields no segments.
    pub fn build(&self, chars: &[TimedChar], mode: BuildMode) -> Vec<Segment> {
        if chars.is_empty() {
            return Vec::new();
        }

        let segments = match mode {
            BuildMode::Standard { ignore_line_length } => self.build_standard(chars, ignore_line_length),
            BuildMode::WordLevel { words_per_line } => self.build_word_level(chars, words_per_line),
        };

        debug!("Built {} segments from {} characters ({:?})", segments.len(), chars.len(), mode);
        segments
    }

    fn is_pause_after(&self, chars: &[TimedChar], i: usize) -> bool {
        let Some(next) = chars.get(i + 1) else {
            return false;
        };
        let current = &chars[i];
        let silence = match self.config.pause_rule {
            PauseRule::Duration => current.end - current.start,
            PauseRule::Gap => next.start - current.end,
        };
        silence >= self.config.pause_threshold
    }

    fn build_standard(&self, chars: &[TimedChar], ignore_line_length: bool) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut text_len = 0usize;
        let mut start: Option<f64> = None;

        for (i, current) in chars.iter().enumerate() {
            let line_start = *start.get_or_insert(current.start);
            text.push(current.ch);
            text_len += 1;

            let is_sentence_end = set_contains(&self.config.sentence_enders, current.ch);
            let is_pause_after = self.is_pause_after(chars, i);
            let is_long_at_delimiter = !ignore_line_length
                && text_len > self.config.max_chars_per_line
                && set_contains(&self.config.delimiters, current.ch);
            let is_last = i + 1 == chars.len();

            if is_sentence_end || is_pause_after || is_long_at_delimiter || is_last {
                let clean = collapse_whitespace(&text);
                if !clean.is_empty() {
                    segments.push(Segment::new(clean, line_start, current.end.max(line_start)));
                }
                text.clear();
                text_len = 0;
                start = None;
            }
        }

        segments
    }

    fn build_word_level(&self, chars: &[TimedChar], words_per_line: usize) -> Vec<Segment> {
        let clusters = grapheme::cluster(chars);
        let tokens = self.merge_punctuation_with_previous(cjk::tokenize(&clusters));
        let groups = cjk::group_words(
            &tokens,
            words_per_line,
            &self.config.sentence_enders,
            self.config.pause_threshold,
        );

        groups
            .iter()
            .filter_map(|group| {
                let (first, last) = (group.first()?, group.last()?);
                let text = cjk::smart_join(group);
                if text.is_empty() {
                    return None;
                }
                Some(Segment::new(text, first.start, last.end.max(first.start)))
            })
            .collect()
    }

    fn is_punctuation_token(&self, token: &Token) -> bool {
        let mut visible = token.text.chars().filter(|c| !c.is_whitespace()).peekable();
        visible.peek().is_some()
            && visible.all(|c| {
                cjk::is_punctuation(c)
                    || set_contains(&self.config.delimiters, c)
                    || set_contains(&self.config.sentence_enders, c)
            })
    }

    /// Appends punctuation-only tokens to the token before them so a bare
    /// mark never fills a subtitle line on its own.
    fn merge_punctuation_with_previous(&self, tokens: Vec<Token>) -> Vec<Token> {
        let mut merged: Vec<Token> = Vec::with_capacity(tokens.len());
        for token in tokens {
            match merged.last_mut() {
                Some(prev) if self.is_punctuation_token(&token) => {
                    prev.text.push_str(&token.text);
                    prev.end = token.end;
                }
                _ => merged.push(token),
            }
        }
        merged
    }
}

impl Default for SegmentBuilder {
    fn default() -> Self {
        Self::new(SegmentBuilderConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(text: &str, step: f64) -> Vec<TimedChar> {
        text.chars()
            .enumerate()
            .map(|(i, ch)| TimedChar {
                ch,
                start: i as f64 * step,
                end: (i + 1) as f64 * step,
            })
            .collect()
    }

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn texts(segments: &[Segment]) -> Vec<&str> {
        segments.iter().map(|s| s.text.as_str()).collect()
    }

    #[test]
    fn test_standard_splits_at_sentence_enders() {
        let mut builder = SegmentBuilder::default();
        builder.reconfigure(BuilderOverrides {
            sentence_enders: Some(set(&["。", "."])),
            ..Default::default()
        });

        let segments = builder.build(&uniform("你好。This is fine, ok.", 0.1), BuildMode::display());
        assert_eq!(texts(&segments), vec!["你好。", "This is fine, ok."]);
        assert_eq!(segments[0].start, 0.0);
        assert!((segments[0].end - 0.3).abs() < 1e-9);
        assert!((segments[1].start - 0.3).abs() < 1e-9);
        for segment in &segments {
            assert_eq!(segment.text, segment.text.trim());
        }
    }

    #[test]
    fn test_standard_splits_after_long_character() {
        let chars = vec![
            TimedChar { ch: 'A', start: 0.0, end: 0.5 },
            TimedChar { ch: 'B', start: 0.5, end: 0.6 },
        ];
        let segments = SegmentBuilder::default().build(&chars, BuildMode::display());
        assert_eq!(segments, vec![Segment::new("A", 0.0, 0.5), Segment::new("B", 0.5, 0.6)]);
    }

    #[test]
    fn test_gap_rule_uses_silence_between_characters() {
        let mut builder = SegmentBuilder::default();
        builder.reconfigure(BuilderOverrides {
            pause_rule: Some(PauseRule::Gap),
            ..Default::default()
        });

        // Long 'A' but no silence after it
        let chars = vec![
            TimedChar { ch: 'A', start: 0.0, end: 0.5 },
            TimedChar { ch: 'B', start: 0.5, end: 0.6 },
            TimedChar { ch: 'C', start: 1.0, end: 1.1 },
        ];
        let segments = builder.build(&chars, BuildMode::display());
        assert_eq!(texts(&segments), vec!["AB", "C"]);
    }

    #[test]
    fn test_line_length_breaks_only_at_delimiters() {
        let mut builder = SegmentBuilder::default();
        builder.reconfigure(BuilderOverrides {
            max_chars_per_line: Some(10),
            ..Default::default()
        });
        let chars = uniform("one two three four five six", 0.01);

        let display = builder.build(&chars, BuildMode::display());
        assert_eq!(texts(&display), vec!["one two three", "four five six"]);

        let sentences = builder.build(&chars, BuildMode::sentences());
        assert_eq!(texts(&sentences), vec!["one two three four five six"]);
    }

    #[test]
    fn test_no_character_is_dropped() {
        let text = "Hello there. How are you? I am fine, thanks!  Good\nbye";
        let segments = SegmentBuilder::default().build(&uniform(text, 0.05), BuildMode::display());
        let rebuilt = segments.iter().map(|s| s.text.as_str()).collect::<Vec<_>>().join(" ");
        assert_eq!(collapse_whitespace(&rebuilt), collapse_whitespace(text));
    }

    #[test]
    fn test_segments_are_ordered_and_well_formed() {
        let text = "第一句。第二句！third one? fourth";
        let builder = SegmentBuilder::default();
        for mode in [BuildMode::display(), BuildMode::WordLevel { words_per_line: 2 }] {
            let segments = builder.build(&uniform(text, 0.1), mode);
            assert!(!segments.is_empty());
            for pair in segments.windows(2) {
                assert!(pair[0].start <= pair[1].start);
            }
            for segment in &segments {
                assert!(segment.start <= segment.end);
                assert!(!segment.text.is_empty());
            }
        }
    }

    #[test]
    fn test_empty_input() {
        let builder = SegmentBuilder::default();
        assert!(builder.build(&[], BuildMode::display()).is_empty());
        assert!(builder.build_segments(&Alignment::default(), BuildMode::WordLevel { words_per_line: 3 }).is_empty());
    }

    #[test]
    fn test_whitespace_only_segments_are_dropped() {
        let chars = vec![
            TimedChar { ch: ' ', start: 0.0, end: 0.5 },
            TimedChar { ch: 'x', start: 0.5, end: 0.6 },
        ];
        let segments = SegmentBuilder::default().build(&chars, BuildMode::display());
        assert_eq!(segments, vec![Segment::new("x", 0.5, 0.6)]);
    }

    #[test]
    fn test_missing_timing_does_not_invert_segments() {
        let alignment = Alignment::new(vec!["a".into(), "b".into(), ".".into()], vec![1.0, 1.1, 1.2], vec![1.1]);
        let segments = SegmentBuilder::default().build_segments(&alignment, BuildMode::display());
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start, 1.0);
        assert_eq!(segments[0].end, 1.0);
    }

    #[test]
    fn test_word_level_groups_cjk_glyphs() {
        let mut builder = SegmentBuilder::default();
        builder.reconfigure(BuilderOverrides {
            sentence_enders: Some(HashSet::new()),
            ..Default::default()
        });
        let segments = builder.build(&uniform("一二三四五六七八九十", 0.1), BuildMode::WordLevel { words_per_line: 3 });
        assert_eq!(texts(&segments), vec!["一二三", "四五六", "七八九", "十"]);
        assert!((segments[3].start - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_word_level_punctuation_joins_previous_word() {
        let segments = SegmentBuilder::default().build(
            &uniform("Hello, world. Bye", 0.1),
            BuildMode::WordLevel { words_per_line: 1 },
        );
        assert_eq!(texts(&segments), vec!["Hello", "world", "Bye"]);
        // "Hello," ends with the comma
        assert!((segments[0].end - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_word_level_splits_on_gap_between_tokens() {
        let mut chars = uniform("aa bb cc", 0.1);
        for c in chars.iter_mut().skip(6) {
            c.start += 1.0;
            c.end += 1.0;
        }
        let segments = SegmentBuilder::default().build(&chars, BuildMode::WordLevel { words_per_line: 5 });
        assert_eq!(texts(&segments), vec!["aa bb", "cc"]);
    }

    #[test]
    fn test_word_level_keeps_accents_with_base() {
        let text = "Tie\u{0302}\u{0301}ng Vie\u{0323}t";
        let segments = SegmentBuilder::default().build(&uniform(text, 0.1), BuildMode::WordLevel { words_per_line: 1 });
        assert_eq!(texts(&segments), vec!["Tie\u{0302}\u{0301}ng", "Vie\u{0323}t"]);
    }

    #[test]
    fn test_reconfigure_replaces_only_given_fields() {
        let mut builder = SegmentBuilder::default();
        let before = builder.config().clone();
        builder.reconfigure(BuilderOverrides {
            pause_threshold: Some(0.5),
            ..Default::default()
        });
        assert_eq!(builder.config().pause_threshold, 0.5);
        assert_eq!(builder.config().max_chars_per_line, before.max_chars_per_line);
        assert_eq!(builder.config().sentence_enders, before.sentence_enders);
    }
}
