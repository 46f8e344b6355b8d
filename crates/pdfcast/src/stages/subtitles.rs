//! Timed subtitle cues generated from the narration text.
//!
//! The narration audio carries no word timings, so cue timing is estimated:
//! every word gets a fixed duration and sentence or clause punctuation adds a
//! short pause. Cues are contiguous and start at zero.

use std::fmt::Write as _;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

const SENTENCE_PAUSE_MS: u64 = 300;
const CLAUSE_PAUSE_MS: u64 = 100;

static RE_DISALLOWED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s.,!?;:\-]").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleCue {
    pub index: usize,
    pub start: Duration,
    pub end: Duration,
    pub text: String,
}

#[derive(Debug, Clone, Copy)]
pub struct SubtitleTiming {
    pub words_per_cue: usize,
    pub per_word: Duration,
}

impl SubtitleTiming {
    pub fn new(words_per_cue: usize, seconds_per_word: f64) -> Self {
        Self {
            words_per_cue: words_per_cue.max(1),
            per_word: Duration::from_secs_f64(seconds_per_word.max(0.0)),
        }
    }
}

impl Default for SubtitleTiming {
    fn default() -> Self {
        Self::new(10, 0.375)
    }
}

fn word_duration(word: &str, per_word: Duration) -> Duration {
    let pause = if word.ends_with(['.', '!', '?']) {
        SENTENCE_PAUSE_MS
    } else if word.ends_with([',', ';', ':']) {
        CLAUSE_PAUSE_MS
    } else {
        0
    };
    per_word + Duration::from_millis(pause)
}

/// Splits narration text into timed cues.
pub fn build_cues(text: &str, timing: SubtitleTiming) -> Vec<SubtitleCue> {
    let cleaned = RE_DISALLOWED.replace_all(text, "");
    let words: Vec<&str> = cleaned.split_whitespace().collect();

    let mut cues = Vec::with_capacity(words.len().div_ceil(timing.words_per_cue));
    let mut current = Duration::ZERO;
    for chunk in words.chunks(timing.words_per_cue) {
        let length: Duration = chunk
            .iter()
            .map(|word| word_duration(word, timing.per_word))
            .sum();
        cues.push(SubtitleCue {
            index: cues.len() + 1,
            start: current,
            end: current + length,
            text: chunk.join(" "),
        });
        current += length;
    }
    cues
}

/// Formats a timestamp as `HH:MM:SS,mmm`.
pub fn format_timestamp(at: Duration) -> String {
    let total_ms = at.as_millis();
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
}

/// Renders cues in SubRip format.
pub fn to_srt(cues: &[SubtitleCue]) -> String {
    let mut out = String::new();
    for cue in cues {
        let _ = write!(
            out,
            "{}\n{} --> {}\n{}\n\n",
            cue.index,
            format_timestamp(cue.start),
            format_timestamp(cue.end),
            cue.text
        );
    }
    out
}
