use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, warn};
use walkdir::WalkDir;

use crate::alignment::{Alignment, TtsResponse};
use crate::config::Config;
use crate::error::{CuesmithError, Result};
use crate::fcpxml::FcpxmlExporter;
use crate::output::write_atomic;
use crate::progress::ProgressSink;
use crate::segment::lines::align_lines;
use crate::segment::{BuildMode, Segment, SegmentBuilder};
use crate::subtitle::{read_srt, segments_to_cues, write_srt};
use crate::translate::{TranslationManager, TranslationOutcome};

/// Files produced for one TTS response and the problems met along the way.
#[derive(Debug, Clone, Default)]
pub struct ProcessReport {
    pub audio: Option<PathBuf>,
    pub standard_srt: Option<PathBuf>,
    pub word_srt: Option<PathBuf>,
    pub translated_srt: Option<PathBuf>,
    pub fcpxml: Option<PathBuf>,
    /// Failures of optional outputs; the files listed above are still valid
    pub warnings: Vec<String>,
}

/// Outcome of a directory run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub processed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

/// `<base><suffix>.<extension>`, keeping any dots already in the base name.
fn sibling(base: &Path, suffix: &str, extension: &str) -> PathBuf {
    let mut name: OsString = base.as_os_str().to_owned();
    name.push(suffix);
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

pub struct Workflow {
    config: Config,
    builder: SegmentBuilder,
    translator: TranslationManager,
}

impl Workflow {
    pub fn new(config: Config) -> Result<Self> {
        let translator = TranslationManager::new(&config.translate)?;
        Ok(Self::with_translator(config, translator))
    }

    pub fn with_translator(config: Config, translator: TranslationManager) -> Self {
        let builder = SegmentBuilder::from_subtitle_config(&config.subtitle);
        Self {
            config,
            builder,
            translator,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn translator(&self) -> &TranslationManager {
        &self.translator
    }

    fn output_base(input_path: &Path, output_dir: Option<&Path>) -> Result<PathBuf> {
        let stem = input_path
            .file_stem()
            .ok_or_else(|| CuesmithError::Config(format!("Invalid input filename: {}", input_path.display())))?;
        let dir = match output_dir {
            Some(dir) => dir.to_path_buf(),
            None => input_path.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        Ok(dir.join(stem))
    }

    /// Process a single TTS response file
    pub async fn process_file<P: AsRef<Path>>(
        &self,
        input_path: P,
        output_dir: Option<&Path>,
        progress: &dyn ProgressSink,
    ) -> Result<ProcessReport> {
        let input_path = input_path.as_ref();
        info!("Processing TTS response: {}", input_path.display());

        let response = TtsResponse::from_file(input_path).await?;
        let base = Self::output_base(input_path, output_dir)?;
        if let Some(dir) = base.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }

        self.process_response(&response, &base, progress).await
    }

    /// Writes every configured output next to `base`. The standard SRT is
    /// required; the word-level SRT, translation and FCPXML are best effort.
    pub async fn process_response(
        &self,
        response: &TtsResponse,
        base: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<ProcessReport> {
        let output = &self.config.output;
        let mut report = ProcessReport::default();

        match &response.audio {
            Some(audio) => {
                let audio_path = sibling(base, "", &output.audio_extension);
                write_atomic(&audio_path, audio).await?;
                info!("Audio saved: {}", audio_path.display());
                report.audio = Some(audio_path);
            }
            None => {
                warn!("TTS response carries no audio payload");
                report.warnings.push("no audio payload in response".to_string());
            }
        }

        let alignment = response.require_alignment()?;

        // Step 1: standard subtitles
        let standard = self.builder.build_segments(alignment, BuildMode::display());
        let standard_path = sibling(base, "", "srt");
        write_srt(&standard_path, &standard).await?;
        info!("Standard subtitles saved: {}", standard_path.display());
        report.standard_srt = Some(standard_path);

        // Step 2: word-level subtitles
        if output.word_level {
            let mode = BuildMode::WordLevel {
                words_per_line: self.config.subtitle.words_per_line,
            };
            let words = self.builder.build_segments(alignment, mode);
            let word_path = sibling(base, &output.word_suffix, "srt");
            match write_srt(&word_path, &words).await {
                Ok(()) => report.word_srt = Some(word_path),
                Err(e) => {
                    error!("Word-level subtitles failed: {}", e);
                    report.warnings.push(format!("word-level subtitles: {}", e));
                }
            }
        }

        // Step 3: translation, from whole sentences
        let mut translated_pair: Option<(Vec<Segment>, Vec<Segment>)> = None;
        if output.translate {
            if self.translator.is_available() {
                let sentences = self.builder.build_segments(alignment, BuildMode::sentences());
                let outcome = self.translator.translate_segments(&sentences, progress).await;
                for failure in &outcome.failed_batches {
                    report.warnings.push(format!(
                        "translation batch {} kept original text: {}",
                        failure.batch + 1,
                        failure.error
                    ));
                }

                let translated_path = sibling(base, &output.translated_suffix, "srt");
                match write_srt(&translated_path, &outcome.segments).await {
                    Ok(()) => {
                        info!("Translated subtitles saved: {}", translated_path.display());
                        report.translated_srt = Some(translated_path);
                        translated_pair = Some((sentences, outcome.segments));
                    }
                    Err(e) => {
                        error!("Translated subtitles failed: {}", e);
                        report.warnings.push(format!("translated subtitles: {}", e));
                    }
                }
            } else {
                warn!("Translation requested but no API key is configured, skipping");
                report.warnings.push("translation skipped: no API key".to_string());
            }
        }

        // Step 4: FCPXML timeline. Lanes pair with source titles by position;
        // a translated timeline takes the translated sentences as its source.
        if output.export_fcpxml {
            let fcpxml_path = sibling(base, "", "fcpxml");
            let exported = match &translated_pair {
                Some((sentences, translated)) => {
                    self.export_segments(sentences, std::slice::from_ref(translated), &fcpxml_path).await
                }
                None => self.export_segments(&standard, &[], &fcpxml_path).await,
            };
            match exported {
                Ok(()) => {
                    info!("FCPXML exported: {}", fcpxml_path.display());
                    report.fcpxml = Some(fcpxml_path);
                }
                Err(e) => {
                    error!("FCPXML export failed: {}", e);
                    report.warnings.push(format!("fcpxml export: {}", e));
                }
            }
        }

        Ok(report)
    }

    /// Process every `*.json` TTS response under `input_dir`. A failing file
    /// is logged and recorded; the rest still run.
    pub async fn process_directory<P: AsRef<Path>>(
        &self,
        input_dir: P,
        output_dir: Option<&Path>,
        progress: &dyn ProgressSink,
    ) -> Result<BatchSummary> {
        let input_dir = input_dir.as_ref();
        info!("Processing directory: {}", input_dir.display());

        if !input_dir.is_dir() {
            return Err(CuesmithError::Config(format!(
                "Input path is not a directory: {}",
                input_dir.display()
            )));
        }

        let mut response_files: Vec<PathBuf> = WalkDir::new(input_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| {
                p.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
            })
            .collect();
        response_files.sort();

        info!("Found {} TTS responses to process", response_files.len());

        let mut summary = BatchSummary::default();
        for path in response_files {
            match self.process_file(&path, output_dir, progress).await {
                Ok(report) => {
                    for warning in &report.warnings {
                        warn!("{}: {}", path.display(), warning);
                    }
                    info!("Successfully processed: {}", path.display());
                    summary.processed.push(path);
                }
                Err(e) => {
                    warn!("Failed to process {}: {}", path.display(), e);
                    summary.failed.push((path, e.to_string()));
                }
            }
        }

        Ok(summary)
    }

    /// Builds subtitles from a bare alignment and writes them to `output_path`.
    /// With a script, one cue per script line is produced instead.
    pub async fn segment_alignment(
        &self,
        alignment: &Alignment,
        mode: BuildMode,
        script: Option<&str>,
        output_path: &Path,
    ) -> Result<Vec<Segment>> {
        let segments = match script {
            Some(text) => align_lines(text, Some(alignment)),
            None => self.builder.build_segments(alignment, mode),
        };
        write_srt(output_path, &segments).await?;
        info!("Wrote {} cues to {}", segments.len(), output_path.display());
        Ok(segments)
    }

    /// Translate an existing SRT file into `output_path`.
    pub async fn translate_srt(
        &self,
        input_path: &Path,
        output_path: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<TranslationOutcome> {
        if !self.translator.is_available() {
            return Err(CuesmithError::Translation("No translation API key configured".to_string()));
        }

        let cues = read_srt(input_path).await?;
        let segments: Vec<Segment> = cues.iter().map(|c| c.to_segment()).collect();
        let outcome = self.translator.translate_segments(&segments, progress).await;
        write_srt(output_path, &outcome.segments).await?;
        Ok(outcome)
    }

    /// Combine a source SRT and any number of translated SRTs into one
    /// FCPXML timeline.
    pub async fn export_fcpxml(&self, source_srt: &Path, translation_srts: &[&Path], output_path: &Path) -> Result<()> {
        let source = read_srt(source_srt).await?;
        let mut translations = Vec::with_capacity(translation_srts.len());
        for path in translation_srts {
            translations.push(read_srt(path).await?);
        }

        let exporter = FcpxmlExporter::from_config(&self.config.fcpxml).await?;
        exporter.export(&source, &translations, output_path).await
    }

    /// Exports segments that are already in memory.
    pub async fn export_segments(&self, source: &[Segment], translations: &[Vec<Segment>], output_path: &Path) -> Result<()> {
        let translations: Vec<_> = translations.iter().map(|t| segments_to_cues(t)).collect();
        let exporter = FcpxmlExporter::from_config(&self.config.fcpxml).await?;
        exporter.export(&segments_to_cues(source), &translations, output_path).await
    }
}
