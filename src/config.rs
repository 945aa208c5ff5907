use std::env;
use std::path::PathBuf;

use crate::quiz::CategoryMode;

/// Runtime configuration, read once at startup from the environment
/// (`.env` is loaded first when present).
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the per-category corpus JSON files.
    pub questions_dir: PathBuf,
    /// TTF used for both glyph measurement and on-screen text.
    pub font_path: PathBuf,
    /// Which corpus each round draws from.
    pub category: CategoryMode,
    /// Seconds the question stays up (votes accumulate here).
    pub question_secs: f32,
    /// Seconds the reveal stays up.
    pub answer_secs: f32,
    /// Final fraction of the question window in which the tick effect fires.
    pub remaining_ratio: f32,
    /// Fixed RNG seed; unset draws from OS entropy.
    pub seed: Option<u64>,
    /// Background music loudness, 0.0..=1.0.
    pub music_volume: f32,
    /// `host:port` of the live-event collaborator, one JSON gift per line.
    pub live_feed_addr: Option<String>,
    /// External text-to-speech command; silent narration when unset.
    pub tts_command: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        let questions_dir = env::var("QUESTIONS_DIR")
            .unwrap_or_else(|_| "questions".to_string())
            .into();

        let font_path = env::var("FONT_PATH")
            .unwrap_or_else(|_| "assets/fonts/Rubik-Medium.ttf".to_string())
            .into();

        let category = env::var("CATEGORY")
            .ok()
            .and_then(|s| CategoryMode::parse(&s))
            .unwrap_or_default();

        let question_secs = parse_var("QUESTION_SECS", 30.0);
        let answer_secs = parse_var("ANSWER_SECS", 10.0);
        let remaining_ratio = parse_var("REMAINING_RATIO", 0.2);
        let music_volume = parse_var("MUSIC_VOLUME", 0.3);

        let seed = env::var("SHOW_SEED").ok().and_then(|s| s.parse().ok());

        Self {
            questions_dir,
            font_path,
            category,
            question_secs,
            answer_secs,
            remaining_ratio,
            seed,
            music_volume,
            live_feed_addr: env::var("LIVE_FEED_ADDR").ok(),
            tts_command: env::var("TTS_COMMAND").ok(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
