use std::path::Path;
use tracing::{info, warn};

use crate::error::{CuesmithError, Result};
use crate::output::write_atomic;
use crate::segment::Segment;

/// An SRT cue in integer milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    pub index: usize,
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
}

impl Cue {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }

    pub fn from_segment(index: usize, segment: &Segment) -> Self {
        Self {
            index,
            start_ms: seconds_to_ms(segment.start),
            end_ms: seconds_to_ms(segment.end),
            text: segment.text.trim().to_string(),
        }
    }

    pub fn to_segment(&self) -> Segment {
        Segment::new(
            self.text.clone(),
            self.start_ms as f64 / 1000.0,
            self.end_ms as f64 / 1000.0,
        )
    }
}

/// Segments to cues, numbered from 1, skipping blank text.
pub fn segments_to_cues(segments: &[Segment]) -> Vec<Cue> {
    segments
        .iter()
        .filter(|s| !s.text.trim().is_empty())
        .enumerate()
        .map(|(i, s)| Cue::from_segment(i + 1, s))
        .collect()
}

pub fn cues_to_segments(cues: &[Cue]) -> Vec<Segment> {
    cues.iter().map(Cue::to_segment).collect()
}

fn seconds_to_ms(seconds: f64) -> u64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    (seconds * 1000.0).round() as u64
}

/// Format time in seconds to SRT time format (HH:MM:SS,mmm)
pub fn format_time(seconds: f64) -> String {
    format_ms(seconds_to_ms(seconds))
}

/// Format milliseconds to SRT time format (HH:MM:SS,mmm)
pub fn format_ms(total_milliseconds: u64) -> String {
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

fn validate(segments: &[Segment]) -> Result<()> {
    for (index, segment) in segments.iter().enumerate() {
        for (name, value) in [("start", segment.start), ("end", segment.end)] {
            if !value.is_finite() {
                return Err(CuesmithError::InvalidSegment {
                    index,
                    reason: format!("'{}' is missing or not a finite number ({})", name, value),
                });
            }
        }
    }
    Ok(())
}

/// Render segments as SRT text. Blank segments are skipped and the survivors
/// numbered consecutively from 1; a segment without usable timing is an error.
pub fn render_srt(segments: &[Segment]) -> Result<String> {
    validate(segments)?;

    let mut srt_content = String::new();
    for cue in segments_to_cues(segments) {
        srt_content.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            cue.index,
            format_ms(cue.start_ms),
            format_ms(cue.end_ms),
            cue.text
        ));
    }
    Ok(srt_content)
}

/// Generate an SRT subtitle file from segments. An empty list writes an
/// empty file.
pub async fn write_srt<P: AsRef<Path>>(output_path: P, segments: &[Segment]) -> Result<()> {
    let output_path = output_path.as_ref();
    info!("Generating SRT file: {}", output_path.display());

    let srt_content = render_srt(segments)?;
    write_atomic(output_path, srt_content).await?;

    info!("SRT file generated successfully");
    Ok(())
}

/// Parses `HH:MM:SS,mmm` (also `.` before the milliseconds and `MM:SS,mmm`).
pub fn parse_timestamp(timestamp: &str) -> Option<u64> {
    let (clock, millis) = timestamp.trim().rsplit_once([',', '.'])?;
    let millis: u64 = match millis.len() {
        1..=3 => millis.parse::<u64>().ok()? * 10u64.pow(3 - millis.len() as u32),
        _ => return None,
    };

    let parts: Vec<u64> = clock
        .split(':')
        .map(|p| p.trim().parse::<u64>().ok())
        .collect::<Option<_>>()?;
    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => (*h, *m, *s),
        [m, s] => (0, *m, *s),
        _ => return None,
    };
    if minutes >= 60 || seconds >= 60 {
        return None;
    }

    Some(hours * 3_600_000 + minutes * 60_000 + seconds * 1_000 + millis)
}

fn parse_timing_line(line: &str) -> Option<(u64, u64)> {
    let (start, rest) = line.split_once("-->")?;
    // cue settings may follow the end time
    let end = rest.split_whitespace().next()?;
    Some((parse_timestamp(start)?, parse_timestamp(end)?))
}

/// Parse SRT text into cues. Malformed blocks are skipped with a warning.
pub fn parse_srt(content: &str) -> Vec<Cue> {
    let content = content.trim_start_matches('\u{feff}');
    let mut cues = Vec::new();
    let mut block: Vec<(usize, &str)> = Vec::new();

    for (number, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            if !block.is_empty() {
                parse_block(&block, &mut cues);
                block.clear();
            }
        } else {
            block.push((number + 1, line.trim_end()));
        }
    }
    if !block.is_empty() {
        parse_block(&block, &mut cues);
    }

    cues
}

fn parse_block(block: &[(usize, &str)], cues: &mut Vec<Cue>) {
    let Some(timing_at) = block.iter().take(2).position(|(_, l)| l.contains("-->")) else {
        warn!("Skipping SRT block without a timing line at line {}", block[0].0);
        return;
    };

    let (line_no, timing) = block[timing_at];
    let Some((start_ms, end_ms)) = parse_timing_line(timing) else {
        warn!("Skipping SRT block with malformed timing at line {}: {}", line_no, timing);
        return;
    };

    let index = match timing_at {
        1 => block[0].1.trim().parse().unwrap_or(cues.len() + 1),
        _ => cues.len() + 1,
    };
    let text = block[timing_at + 1..]
        .iter()
        .map(|(_, l)| l.trim())
        .collect::<Vec<_>>()
        .join("\n");

    cues.push(Cue {
        index,
        start_ms,
        end_ms: end_ms.max(start_ms),
        text,
    });
}

/// Read and parse an SRT file.
pub async fn read_srt<P: AsRef<Path>>(path: P) -> Result<Vec<Cue>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(CuesmithError::FileNotFound(path.display().to_string()));
    }
    let content = tokio::fs::read_to_string(path).await?;
    Ok(parse_srt(&content))
}
