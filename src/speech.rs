use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use tokio::runtime::Runtime;
use tokio::sync::Mutex;

use bevy::log::warn;

use crate::error::ShowError;

/// Text-to-speech collaborator. Synchronous and blocking; the show only ever
/// calls it from a background task.
pub trait SpeechSynthesizer: Send + Sync {
    fn synthesize(&self, text: &str) -> Result<PathBuf, ShowError>;
}

/// Synthesizer backed by an external command, invoked as
/// `<program> <args…> <wav path> <text>`. Output files are keyed by a hash
/// of the text, so repeated narrations reuse the file already on disk.
pub struct CommandSynthesizer {
    program: String,
    args: Vec<String>,
    cache_dir: PathBuf,
}

impl CommandSynthesizer {
    pub fn new(command: &str, cache_dir: PathBuf) -> Result<Self, ShowError> {
        let mut parts = command.split_whitespace().map(str::to_owned);
        let program = parts
            .next()
            .ok_or_else(|| ShowError::Synthesis("empty TTS command".to_string()))?;
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self {
            program,
            args: parts.collect(),
            cache_dir,
        })
    }

    pub fn cache_path(&self, text: &str) -> PathBuf {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        self.cache_dir.join(format!("narration-{:016x}.wav", hasher.finish()))
    }
}

impl SpeechSynthesizer for CommandSynthesizer {
    fn synthesize(&self, text: &str) -> Result<PathBuf, ShowError> {
        let path = self.cache_path(text);
        if path.exists() {
            return Ok(path);
        }

        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(&path)
            .arg(text)
            .status()
            .map_err(|e| ShowError::Synthesis(format!("{}: {e}", self.program)))?;

        if !status.success() {
            return Err(ShowError::Synthesis(format!(
                "{} exited with {status}",
                self.program
            )));
        }
        Ok(path)
    }
}

/// Where one narration stands for the current round.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum NarrationState {
    #[default]
    Pending,
    Ready(PathBuf),
    /// Synthesis failed; the cue is skipped for this round.
    Failed,
}

/// The per-round narration results, written by the synthesis task and polled
/// (never awaited) from the frame loop.
#[derive(Debug, Default)]
pub struct RoundNarration {
    pub round: u64,
    pub question: NarrationState,
    pub answer: NarrationState,
}

pub type NarrationSlot = Arc<Mutex<RoundNarration>>;

pub fn narration_slot() -> NarrationSlot {
    Arc::new(Mutex::new(RoundNarration::default()))
}

/// Kick off this round's narration synthesis. The task claims the slot for
/// `round` immediately, then fills in each narration as it finishes; a write
/// for a superseded round is dropped.
pub fn synthesize_round(
    runtime: &Runtime,
    synth: Arc<dyn SpeechSynthesizer>,
    slot: NarrationSlot,
    round: u64,
    question_text: String,
    answer_text: String,
) {
    runtime.spawn(async move {
        {
            let mut guard = slot.lock().await;
            *guard = RoundNarration {
                round,
                ..Default::default()
            };
        }

        let question = run_synthesis(&synth, question_text).await;
        {
            let mut guard = slot.lock().await;
            if guard.round != round {
                return;
            }
            guard.question = question;
        }

        let answer = run_synthesis(&synth, answer_text).await;
        let mut guard = slot.lock().await;
        if guard.round == round {
            guard.answer = answer;
        }
    });
}

async fn run_synthesis(synth: &Arc<dyn SpeechSynthesizer>, text: String) -> NarrationState {
    let synth = synth.clone();
    match tokio::task::spawn_blocking(move || synth.synthesize(&text)).await {
        Ok(Ok(path)) => NarrationState::Ready(path),
        Ok(Err(e)) => {
            warn!("narration skipped this round: {e}");
            NarrationState::Failed
        }
        Err(e) => {
            warn!("narration task died: {e}");
            NarrationState::Failed
        }
    }
}

/// Strip the Bevy asset root from a synthesized file path so the handle can
/// be loaded through the asset server. Files outside the asset root cannot
/// be played; the caller treats that as a failed narration.
pub fn asset_path(path: &Path) -> Option<PathBuf> {
    path.strip_prefix("assets").ok().map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct StubSynth {
        fail: bool,
    }

    impl SpeechSynthesizer for StubSynth {
        fn synthesize(&self, text: &str) -> Result<PathBuf, ShowError> {
            if self.fail {
                Err(ShowError::Synthesis("stub".to_string()))
            } else {
                Ok(PathBuf::from(format!("{}.wav", text.len())))
            }
        }
    }

    fn wait_for_round(rt: &Runtime, slot: &NarrationSlot, round: u64) -> RoundNarration {
        rt.block_on(async {
            for _ in 0..200 {
                {
                    let guard = slot.lock().await;
                    if guard.round == round
                        && guard.question != NarrationState::Pending
                        && guard.answer != NarrationState::Pending
                    {
                        return RoundNarration {
                            round: guard.round,
                            question: guard.question.clone(),
                            answer: guard.answer.clone(),
                        };
                    }
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            panic!("narration for round {round} never settled");
        })
    }

    #[test]
    fn narration_fills_in_the_background() {
        let rt = Runtime::new().unwrap();
        let slot = narration_slot();

        synthesize_round(
            &rt,
            Arc::new(StubSynth { fail: false }),
            slot.clone(),
            3,
            "question".to_string(),
            "answer".to_string(),
        );

        let result = wait_for_round(&rt, &slot, 3);
        assert_eq!(result.question, NarrationState::Ready("8.wav".into()));
        assert_eq!(result.answer, NarrationState::Ready("6.wav".into()));
    }

    #[test]
    fn failed_synthesis_marks_the_cue_skippable() {
        let rt = Runtime::new().unwrap();
        let slot = narration_slot();

        synthesize_round(
            &rt,
            Arc::new(StubSynth { fail: true }),
            slot.clone(),
            1,
            "q".to_string(),
            "a".to_string(),
        );

        let result = wait_for_round(&rt, &slot, 1);
        assert_eq!(result.question, NarrationState::Failed);
        assert_eq!(result.answer, NarrationState::Failed);
    }

    #[test]
    fn cache_path_is_stable_per_text() {
        let dir = std::env::temp_dir().join("livequiz-tts-test");
        let synth = CommandSynthesizer::new("echo -n", dir.clone()).unwrap();

        assert_eq!(synth.cache_path("hello"), synth.cache_path("hello"));
        assert_ne!(synth.cache_path("hello"), synth.cache_path("goodbye"));
        assert!(synth.cache_path("hello").starts_with(&dir));
    }

    #[test]
    fn asset_paths_resolve_under_the_asset_root() {
        assert_eq!(
            asset_path(Path::new("assets/tts/narration-00ff.wav")),
            Some(PathBuf::from("tts/narration-00ff.wav"))
        );
        assert_eq!(asset_path(Path::new("/tmp/out.wav")), None);
    }
}
