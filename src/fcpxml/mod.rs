// FCPXML timeline export
//
// The source cues sit on the primary storyline, one title each. Every
// translation list becomes a lane of titles nested in the source title at the
// same position. Times are snapped to frames and written as fractions.

pub mod style;
pub mod timecode;

use std::path::Path;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use tracing::{info, warn};

pub use style::{Lane, Rgba, ShadowOffset, StyleOverrides, StylePreferences, TextStyle};

use crate::config::FcpxmlConfig;
use crate::error::{CuesmithError, Result};
use crate::output::write_atomic;
use crate::subtitle::Cue;
use timecode::{frame_at, frame_duration, frames_to_fraction, fraction_time};

/// Lead-in subtracted from cue starts in seamless mode, in milliseconds.
const SEAMLESS_LEAD_IN_MS: u64 = 34;

const TITLE_EFFECT_UID: &str = ".../Titles.localized/Bumper:Opener.localized/Basic Title.localized/Basic Title.moti";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoSettings {
    pub fps: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self { fps: 30, width: 1920, height: 1080 }
    }
}

/// Where a title lands on the timeline, in frames. Both ends are snapped
/// before the duration is taken so that consecutive spine items add up to
/// the next item's offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Placement {
    start: u64,
    duration: u64,
}

impl Placement {
    fn end(&self) -> u64 {
        self.start + self.duration
    }
}

fn placements(cues: &[Cue], seamless: bool, fps: u32) -> Vec<Placement> {
    if !seamless {
        return cues
            .iter()
            .map(|c| {
                let start = frame_at(c.start_ms, fps);
                Placement { start, duration: frame_at(c.end_ms, fps).saturating_sub(start) }
            })
            .collect();
    }

    let starts: Vec<u64> = cues
        .iter()
        .enumerate()
        .map(|(i, c)| {
            if i > 0 && c.start_ms > SEAMLESS_LEAD_IN_MS {
                c.start_ms - SEAMLESS_LEAD_IN_MS
            } else {
                c.start_ms
            }
        })
        .collect();

    cues.iter()
        .enumerate()
        .map(|(i, cue)| {
            let start = frame_at(starts[i], fps);
            // the last cue keeps its own length from the shifted start
            let end = match starts.get(i + 1) {
                Some(next) => frame_at(*next, fps),
                None => frame_at(starts[i] + cue.duration_ms(), fps),
            };
            Placement { start, duration: end.saturating_sub(start) }
        })
        .collect()
}

pub struct FcpxmlExporter {
    video: VideoSettings,
    seamless: bool,
    source_style: TextStyle,
    translation_style: TextStyle,
}

impl FcpxmlExporter {
    pub fn new(
        video: VideoSettings,
        seamless: bool,
        source_style: TextStyle,
        translation_style: TextStyle,
    ) -> Self {
        Self {
            video: VideoSettings { fps: video.fps.max(1), ..video },
            seamless,
            source_style,
            translation_style,
        }
    }

    /// Resolves both lane styles from the configured overrides and the
    /// preference file.
    pub async fn from_config(config: &FcpxmlConfig) -> Result<Self> {
        let prefs = match &config.preferences_path {
            Some(path) => StylePreferences::load(path).await?,
            None => StylePreferences::default(),
        };
        let video = VideoSettings {
            fps: config.fps,
            width: config.width,
            height: config.height,
        };
        Ok(Self::new(
            video,
            config.seamless,
            TextStyle::resolve(&config.source, &prefs, Lane::Source),
            TextStyle::resolve(&config.translate, &prefs, Lane::Translation),
        ))
    }

    fn time(&self, ms: u64) -> String {
        fraction_time(ms, self.video.fps)
    }

    /// Builds the document. Translation lists are matched to source cues by
    /// position; entries beyond the source count are ignored.
    pub fn render(&self, project_name: &str, source: &[Cue], translations: &[Vec<Cue>]) -> Result<String> {
        let Some(last) = source.last() else {
            return Err(CuesmithError::Export("No source cues to export".to_string()));
        };

        for (lane, list) in translations.iter().enumerate() {
            if list.len() != source.len() {
                warn!(
                    "Translation lane {} has {} cues for {} source cues",
                    lane + 1,
                    list.len(),
                    source.len()
                );
            }
        }

        let fps = self.video.fps;
        let source_places = placements(source, self.seamless, fps);
        let lane_places: Vec<Vec<Placement>> = translations
            .iter()
            .map(|list| placements(list, self.seamless, fps))
            .collect();

        // text-style ids: all source titles first, then each lane in turn
        let mut lane_base = Vec::with_capacity(translations.len());
        let mut next_id = source.len();
        for list in translations {
            lane_base.push(next_id);
            next_id += list.len().min(source.len());
        }

        let mut writer = Writer::new_with_indent(Vec::new(), b'\t', 1);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut root = BytesStart::new("fcpxml");
        root.push_attribute(("version", "1.9"));
        writer.write_event(Event::Start(root))?;

        self.write_resources(&mut writer)?;

        writer.write_event(Event::Start(BytesStart::new("library")))?;
        let mut event = BytesStart::new("event");
        event.push_attribute(("name", project_name));
        writer.write_event(Event::Start(event))?;
        let mut project = BytesStart::new("project");
        project.push_attribute(("name", project_name));
        writer.write_event(Event::Start(project))?;

        let sequence_duration = self.time(last.end_ms);
        let mut sequence = BytesStart::new("sequence");
        sequence.push_attribute(("tcFormat", "NDF"));
        sequence.push_attribute(("tcStart", "0/1s"));
        sequence.push_attribute(("duration", sequence_duration.as_str()));
        sequence.push_attribute(("format", "r0"));
        writer.write_event(Event::Start(sequence))?;
        writer.write_event(Event::Start(BytesStart::new("spine")))?;

        let mut previous_end = 0u64;
        for (i, cue) in source.iter().enumerate() {
            let place = source_places[i];
            if !self.seamless && previous_end < place.start {
                let offset = frames_to_fraction(previous_end, fps);
                let duration = frames_to_fraction(place.start - previous_end, fps);
                let mut gap = BytesStart::new("gap");
                gap.push_attribute(("name", "Gap"));
                gap.push_attribute(("start", "3600/1s"));
                gap.push_attribute(("offset", offset.as_str()));
                gap.push_attribute(("duration", duration.as_str()));
                writer.write_event(Event::Empty(gap))?;
            }

            self.open_title(&mut writer, None, place)?;
            self.write_title_body(&mut writer, &cue.text, i, &self.source_style)?;

            for (lane, list) in translations.iter().enumerate() {
                let Some(translated) = list.get(i) else {
                    continue;
                };
                self.open_title(&mut writer, Some(lane + 1), lane_places[lane][i])?;
                self.write_title_body(&mut writer, &translated.text, lane_base[lane] + i, &self.translation_style)?;
                writer.write_event(Event::End(BytesEnd::new("title")))?;
            }

            writer.write_event(Event::End(BytesEnd::new("title")))?;
            previous_end = place.end();
        }

        for name in ["spine", "sequence", "project", "event", "library", "fcpxml"] {
            writer.write_event(Event::End(BytesEnd::new(name)))?;
        }

        let mut xml = String::from_utf8(writer.into_inner())
            .map_err(|e| CuesmithError::Export(format!("Generated XML is not UTF-8: {}", e)))?;
        xml.push('\n');
        Ok(xml)
    }

    fn write_resources(&self, writer: &mut Writer<Vec<u8>>) -> Result<()> {
        writer.write_event(Event::Start(BytesStart::new("resources")))?;

        let name = format!("FFVideoFormat{}p{}", self.video.height, self.video.fps);
        let frame = frame_duration(self.video.fps);
        let width = self.video.width.to_string();
        let height = self.video.height.to_string();
        let mut format = BytesStart::new("format");
        format.push_attribute(("name", name.as_str()));
        format.push_attribute(("frameDuration", frame.as_str()));
        format.push_attribute(("width", width.as_str()));
        format.push_attribute(("height", height.as_str()));
        format.push_attribute(("id", "r0"));
        writer.write_event(Event::Empty(format))?;

        let mut effect = BytesStart::new("effect");
        effect.push_attribute(("name", "Basic Title"));
        effect.push_attribute(("uid", TITLE_EFFECT_UID));
        effect.push_attribute(("id", "r1"));
        writer.write_event(Event::Empty(effect))?;

        writer.write_event(Event::End(BytesEnd::new("resources")))?;
        Ok(())
    }

    fn open_title(&self, writer: &mut Writer<Vec<u8>>, lane: Option<usize>, place: Placement) -> Result<()> {
        let start = frames_to_fraction(place.start, self.video.fps);
        let duration = frames_to_fraction(place.duration, self.video.fps);
        let lane = lane.map(|l| l.to_string());

        let mut title = BytesStart::new("title");
        title.push_attribute(("name", "Subtitle"));
        if let Some(lane) = &lane {
            title.push_attribute(("lane", lane.as_str()));
        }
        title.push_attribute(("ref", "r1"));
        title.push_attribute(("enabled", "1"));
        title.push_attribute(("start", start.as_str()));
        title.push_attribute(("offset", start.as_str()));
        title.push_attribute(("duration", duration.as_str()));
        writer.write_event(Event::Start(title))?;
        Ok(())
    }

    fn write_title_body(
        &self,
        writer: &mut Writer<Vec<u8>>,
        text: &str,
        style_index: usize,
        style: &TextStyle,
    ) -> Result<()> {
        let style_id = format!("ts{}", style_index);
        // '@' marks a manual line break
        let content = text.trim().replace('@', "\n");

        let mut text_el = BytesStart::new("text");
        text_el.push_attribute(("roll-up-height", "0"));
        writer.write_event(Event::Start(text_el))?;
        let mut text_style = BytesStart::new("text-style");
        text_style.push_attribute(("ref", style_id.as_str()));
        writer.write_event(Event::Start(text_style))?;
        writer.write_event(Event::Text(BytesText::new(&content)))?;
        writer.write_event(Event::End(BytesEnd::new("text-style")))?;
        writer.write_event(Event::End(BytesEnd::new("text")))?;

        let mut def = BytesStart::new("text-style-def");
        def.push_attribute(("id", style_id.as_str()));
        writer.write_event(Event::Start(def))?;
        let mut def_style = BytesStart::new("text-style");
        for (name, value) in style.attributes() {
            def_style.push_attribute((name, value.as_str()));
        }
        writer.write_event(Event::Empty(def_style))?;
        writer.write_event(Event::End(BytesEnd::new("text-style-def")))?;

        let mut conform = BytesStart::new("adjust-conform");
        conform.push_attribute(("type", "fit"));
        writer.write_event(Event::Empty(conform))?;

        let position = style.position();
        let mut transform = BytesStart::new("adjust-transform");
        transform.push_attribute(("scale", "1 1"));
        transform.push_attribute(("position", position.as_str()));
        transform.push_attribute(("anchor", "0 0"));
        writer.write_event(Event::Empty(transform))?;
        Ok(())
    }

    /// Writes the timeline to `output_path`; the project is named after the
    /// file stem.
    pub async fn export(&self, source: &[Cue], translations: &[Vec<Cue>], output_path: &Path) -> Result<()> {
        let project_name = output_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Subtitles".to_string());

        info!(
            "Exporting FCPXML with {} cues and {} translation lanes: {}",
            source.len(),
            translations.len(),
            output_path.display()
        );
        let xml = self.render(&project_name, source, translations)?;
        write_atomic(output_path, xml).await
    }
}

impl Default for FcpxmlExporter {
    fn default() -> Self {
        let prefs = StylePreferences::default();
        Self::new(
            VideoSettings::default(),
            false,
            TextStyle::resolve(&StyleOverrides::default(), &prefs, Lane::Source),
            TextStyle::resolve(&StyleOverrides::default(), &prefs, Lane::Translation),
        )
    }
}
