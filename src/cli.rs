use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::Config;
use crate::segment::BuildMode;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Switches shared by `process` and `batch`; each one turns an output on
/// in addition to what the configuration asks for.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct OutputFlags {
    /// Also write a word-level SRT
    #[arg(long)]
    pub word_level: bool,

    /// Tokens per cue in the word-level SRT
    #[arg(long)]
    pub words_per_line: Option<usize>,

    /// Also write a translated SRT
    #[arg(long)]
    pub translate: bool,

    /// Also export an FCPXML timeline
    #[arg(long)]
    pub fcpxml: bool,

    /// Remove gaps between cues in the FCPXML timeline
    #[arg(long)]
    pub seamless: bool,

    /// Translation target language
    #[arg(long)]
    pub target_language: Option<String>,

    /// Translation model
    #[arg(long)]
    pub model: Option<String>,
}

impl OutputFlags {
    pub fn apply(&self, config: &mut Config) {
        config.output.word_level |= self.word_level;
        config.output.translate |= self.translate;
        config.output.export_fcpxml |= self.fcpxml;
        config.fcpxml.seamless |= self.seamless;
        if let Some(words) = self.words_per_line {
            config.subtitle.words_per_line = words.max(1);
        }
        if let Some(language) = &self.target_language {
            config.translate.target_language = language.clone();
        }
        if let Some(model) = &self.model {
            config.translate.model = model.clone();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SegmentMode {
    /// Sentence, pause and line-length breaks
    Standard,
    /// Whole sentences, ignoring line length
    Sentences,
    /// N tokens per cue
    Words,
}

impl SegmentMode {
    pub fn build_mode(self, words_per_line: usize) -> BuildMode {
        match self {
            SegmentMode::Standard => BuildMode::display(),
            SegmentMode::Sentences => BuildMode::sentences(),
            SegmentMode::Words => BuildMode::WordLevel { words_per_line },
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Turn one TTS response (JSON with audio and alignment) into subtitles
    Process {
        /// TTS response file
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory (defaults to the input's directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        #[command(flatten)]
        outputs: OutputFlags,
    },

    /// Process every TTS response (*.json) in a directory
    Batch {
        /// Directory containing TTS responses
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Output directory (defaults to each input's directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        #[command(flatten)]
        outputs: OutputFlags,
    },

    /// Build an SRT from an alignment or TTS response file
    Segment {
        /// Alignment JSON or full TTS response
        #[arg(short, long)]
        input: PathBuf,

        /// Output SRT file
        #[arg(short, long)]
        output: PathBuf,

        /// Segmentation mode
        #[arg(short, long, value_enum, default_value = "standard")]
        mode: SegmentMode,

        /// Tokens per cue in words mode
        #[arg(long)]
        words_per_line: Option<usize>,

        /// Script text; emits one cue per script line
        #[arg(long)]
        script: Option<PathBuf>,
    },

    /// Translate an SRT file
    Translate {
        /// Input SRT file
        #[arg(short, long)]
        input: PathBuf,

        /// Output SRT file
        #[arg(short, long)]
        output: PathBuf,

        /// Translation target language
        #[arg(long)]
        target_language: Option<String>,

        /// Translation model
        #[arg(long)]
        model: Option<String>,
    },

    /// Combine SRT files into an FCPXML timeline
    Fcpxml {
        /// Source-language SRT
        #[arg(short, long)]
        source: PathBuf,

        /// Translated SRT, one lane each (repeatable)
        #[arg(short, long)]
        translation: Vec<PathBuf>,

        /// Output FCPXML file
        #[arg(short, long)]
        output: PathBuf,

        /// Remove gaps between cues
        #[arg(long)]
        seamless: bool,

        /// Frame rate
        #[arg(long)]
        fps: Option<u32>,
    },

    /// Write a configuration file with every default filled in
    InitConfig {
        /// Where to write the file
        #[arg(short, long, default_value = "cuesmith.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
