use std::collections::HashSet;

use rand::prelude::*;

/// Every discrete audio event the show can emit. Effects and narration are
/// separate playback channels but share the once-per-round guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cue {
    /// Countdown effect in the final stretch of the question window.
    Tick,
    /// Chime on entering the reveal.
    Answer,
    /// Voice reading the question and its options.
    QuestionNarration,
    /// Voice reading the correct answer.
    AnswerNarration,
}

/// Per-round cue bookkeeping plus the background-music slot.
///
/// Fired cues live in an owned set cleared at rotation; firing an
/// already-fired cue is a silent no-op. Music is its own channel: a track is
/// drawn at each reset and handed out exactly once, then loops on the device
/// until the next reset swaps it.
#[derive(Debug)]
pub struct CueBoard {
    fired: HashSet<Cue>,
    tracks: Vec<String>,
    current_track: Option<usize>,
    music_started: bool,
}

impl CueBoard {
    pub fn new(tracks: Vec<String>) -> Self {
        Self {
            fired: HashSet::new(),
            tracks,
            current_track: None,
            music_started: false,
        }
    }

    /// True exactly once per round per cue; the caller plays on true.
    pub fn fire(&mut self, cue: Cue) -> bool {
        self.fired.insert(cue)
    }

    pub fn has_fired(&self, cue: Cue) -> bool {
        self.fired.contains(&cue)
    }

    /// Clear the round's fired set and draw the next music track. The draw
    /// may land on the same track again; only the play state resets.
    pub fn reset_round(&mut self, rng: &mut impl Rng) {
        self.fired.clear();
        self.music_started = false;
        if !self.tracks.is_empty() {
            self.current_track = Some(rng.random_range(0..self.tracks.len()));
        }
    }

    /// The track to start looping, handed out once per round.
    pub fn music_to_start(&mut self) -> Option<&str> {
        if self.music_started {
            return None;
        }
        let idx = self.current_track?;
        self.music_started = true;
        Some(&self.tracks[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;

    #[test]
    fn each_cue_fires_once_per_round() {
        let mut board = CueBoard::new(vec![]);

        assert!(board.fire(Cue::Tick));
        assert!(!board.fire(Cue::Tick));
        assert!(!board.fire(Cue::Tick));

        // Independent cues are unaffected.
        assert!(board.fire(Cue::Answer));
        assert!(board.has_fired(Cue::Tick));
        assert!(!board.has_fired(Cue::QuestionNarration));
    }

    #[test]
    fn reset_rearms_every_cue() {
        let mut board = CueBoard::new(vec![]);
        let mut rng = StdRng::seed_from_u64(1);

        board.fire(Cue::Tick);
        board.fire(Cue::AnswerNarration);
        board.reset_round(&mut rng);

        assert!(!board.has_fired(Cue::Tick));
        assert!(board.fire(Cue::Tick));
        assert!(board.fire(Cue::AnswerNarration));
    }

    #[test]
    fn music_is_handed_out_once_per_round() {
        let mut board = CueBoard::new(vec!["a.ogg".into(), "b.ogg".into()]);
        let mut rng = StdRng::seed_from_u64(4);

        assert!(board.music_to_start().is_none(), "no track before a reset");

        board.reset_round(&mut rng);
        let first = board.music_to_start().map(str::to_owned);
        assert!(first.is_some());
        assert!(board.music_to_start().is_none());

        board.reset_round(&mut rng);
        assert!(board.music_to_start().is_some());
    }

    #[test]
    fn empty_track_pool_stays_silent() {
        let mut board = CueBoard::new(vec![]);
        let mut rng = StdRng::seed_from_u64(4);

        board.reset_round(&mut rng);
        assert!(board.music_to_start().is_none());
    }

    #[test]
    fn track_draw_covers_the_pool() {
        let mut board = CueBoard::new(vec!["a".into(), "b".into(), "c".into()]);
        let mut rng = StdRng::seed_from_u64(11);

        let mut seen = HashSet::new();
        for _ in 0..64 {
            board.reset_round(&mut rng);
            if let Some(track) = board.music_to_start() {
                seen.insert(track.to_owned());
            }
        }
        assert_eq!(seen.len(), 3);
    }
}
