use assert_fs::prelude::*;
use assert_fs::TempDir;

use cuesmith::alignment::{Alignment, TtsResponse};
use cuesmith::config::Config;
use cuesmith::progress::NoProgress;
use cuesmith::segment::{BuildMode, SegmentBuilder};
use cuesmith::subtitle::{parse_srt, render_srt};
use cuesmith::workflow::Workflow;

fn uniform_response(text: &str, step: f64) -> String {
    let chars: Vec<String> = text.chars().map(String::from).collect();
    let starts: Vec<f64> = (0..chars.len()).map(|i| i as f64 * step).collect();
    let ends: Vec<f64> = (0..chars.len()).map(|i| (i + 1) as f64 * step).collect();
    serde_json::json!({
        "audio_base64": "UklGRg==",
        "alignment": {
            "characters": chars,
            "character_start_times_seconds": starts,
            "character_end_times_seconds": ends,
        }
    })
    .to_string()
}

fn offline_config() -> Config {
    let mut config = Config::default();
    config.translate.api_key = None;
    config.translate.api_key_env = "CUESMITH_TEST_UNSET_KEY".to_string();
    config.fcpxml.preferences_path = None;
    config
}

#[test]
fn sentence_enders_split_mixed_text() {
    let body = uniform_response("你好。This is fine, ok.", 0.1);
    let response = TtsResponse::from_json_str(&body).unwrap();
    let alignment = response.require_alignment().unwrap();

    let segments = SegmentBuilder::default().build_segments(alignment, BuildMode::display());
    let texts: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["你好。", "This is fine, ok."]);

    for pair in segments.windows(2) {
        assert!(pair[0].start <= pair[1].start);
    }
    for segment in &segments {
        assert!(segment.start <= segment.end);
    }
}

#[test]
fn srt_text_survives_a_render_and_parse() {
    let alignment = Alignment::from_chars(
        "Hello there. 再见！",
        (0..16).map(|i| i as f64 * 0.1).collect(),
        (0..16).map(|i| (i + 1) as f64 * 0.1).collect(),
    );
    let segments = SegmentBuilder::default().build_segments(&alignment, BuildMode::display());
    let cues = parse_srt(&render_srt(&segments).unwrap());

    assert_eq!(cues.len(), segments.len());
    let joined: String = cues.iter().map(|c| c.text.as_str()).collect::<Vec<_>>().join(" ");
    assert_eq!(joined, "Hello there. 再见！");
    assert_eq!(cues[0].index, 1);
}

#[tokio::test]
async fn process_writes_every_requested_output() {
    let temp = TempDir::new().unwrap();
    let input = temp.child("narration.json");
    input.write_str(&uniform_response("第一句。Second one.", 0.1)).unwrap();

    let mut config = offline_config();
    config.output.word_level = true;
    config.output.export_fcpxml = true;
    config.subtitle.words_per_line = 2;
    let workflow = Workflow::new(config).unwrap();

    let out = temp.child("out");
    let report = workflow
        .process_file(input.path(), Some(out.path()), &NoProgress)
        .await
        .unwrap();
    assert!(report.warnings.is_empty());

    assert!(out.child("narration.mp3").path().exists());
    let standard = std::fs::read_to_string(out.child("narration.srt").path()).unwrap();
    assert!(standard.contains("第一句。"));
    assert!(standard.contains("Second one."));

    let words = parse_srt(&std::fs::read_to_string(out.child("narration_word.srt").path()).unwrap());
    assert!(words.iter().all(|c| !c.text.is_empty()));
    assert!(words.len() > 2);

    let xml = std::fs::read_to_string(out.child("narration.fcpxml").path()).unwrap();
    assert!(xml.contains("<project name=\"narration\">"));
    assert_eq!(xml.matches("<title ").count(), 2);
}
