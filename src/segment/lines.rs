use tracing::{debug, warn};

use super::Segment;
use super::cjk::is_punctuation;
use super::grapheme::{GraphemeCluster, cluster, is_combining_mark};
use crate::alignment::Alignment;

/// Per-character estimate once alignment runs out.
const ESTIMATED_CHAR_SECS: f64 = 0.05;
/// Length given to a line that received no timing at all.
const UNTIMED_LINE_SECS: f64 = 0.8;
/// Span of each cue when no character alignment exists.
const FALLBACK_CUE_SECS: f64 = 5.0;
const FALLBACK_TEXT_CHARS: usize = 200;

fn is_content(ch: char) -> bool {
    !ch.is_whitespace() && !is_punctuation(ch)
}

/// Emits one segment per non-blank line of the script that was synthesized.
///
/// Every content character of a line consumes the next content cluster of the
/// alignment, so accented and Indic text keeps its marks. Whitespace and
/// punctuation are copied from the script without consuming timing.
pub fn align_lines(text: &str, alignment: Option<&Alignment>) -> Vec<Segment> {
    let segments = match alignment.filter(|a| !a.is_empty()) {
        Some(alignment) => align_with_clusters(text, &cluster(&alignment.timed_chars())),
        None => {
            debug!("No character alignment; using fixed-length cues per line");
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(|line| Segment::new(line, 0.0, FALLBACK_CUE_SECS))
                .collect()
        }
    };

    if segments.is_empty() {
        let head: String = text.chars().take(FALLBACK_TEXT_CHARS).collect();
        if !head.trim().is_empty() {
            return vec![Segment::new(head.trim(), 0.0, FALLBACK_CUE_SECS)];
        }
    }
    segments
}

fn align_with_clusters(text: &str, clusters: &[GraphemeCluster]) -> Vec<Segment> {
    let mut content = clusters
        .iter()
        .filter(|c| c.base().is_some_and(is_content));
    let mut exhausted = false;
    let mut segments = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }

        let mut line_text = String::new();
        let mut line_start: Option<f64> = None;
        let mut line_end: Option<f64> = None;

        for ch in line.chars() {
            if is_combining_mark(ch) {
                continue;
            }
            if !is_content(ch) {
                line_text.push(ch);
                continue;
            }

            match content.next() {
                Some(unit) => {
                    line_text.push_str(&unit.text);
                    line_start.get_or_insert(unit.start);
                    line_end = Some(unit.end);
                }
                None => {
                    if !exhausted {
                        warn!("Alignment exhausted before the end of the script; estimating remaining timing");
                        exhausted = true;
                    }
                    line_text.push(ch);
                    let start = *line_start.get_or_insert(0.0);
                    line_end = Some(line_end.unwrap_or(start) + ESTIMATED_CHAR_SECS);
                }
            }
        }

        let text_line = line_text.trim();
        if text_line.is_empty() {
            continue;
        }

        let start = line_start.unwrap_or(0.0);
        let end = line_end.unwrap_or(start + UNTIMED_LINE_SECS).max(start);
        segments.push(Segment::new(text_line, start, end));
    }

    segments
}
