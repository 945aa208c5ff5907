use rand::prelude::*;

use crate::quiz::QuestionRecord;

pub const SLOT_LABELS: [char; 4] = ['A', 'B', 'C', 'D'];

/// Lowest visible fill channel value, so a slot with zero votes still reads
/// as a card rather than vanishing.
const FILL_FLOOR: f32 = 100.0;
const FILL_CEIL: f32 = 255.0;

/// One displayed answer option. Rebuilt wholesale each round; only
/// `vote_count` mutates between rebuilds.
#[derive(Debug, Clone)]
pub struct AnswerSlot {
    pub label: char,
    pub text: String,
    pub is_correct: bool,
    pub vote_count: u32,
}

/// The current round's answer slots plus the audience vote tally.
#[derive(Debug, Default)]
pub struct RoundSlots {
    slots: Vec<AnswerSlot>,
}

impl RoundSlots {
    /// Build slots for a question, placing the correct answer at a uniformly
    /// random position. Boolean questions produce 2 slots, multiple choice 4.
    pub fn for_question(record: &QuestionRecord, rng: &mut impl Rng) -> Self {
        let count = record.incorrect_answers.len() + 1;
        let correct_pos = rng.random_range(0..count);

        let mut incorrect = record.incorrect_answers.iter();
        let slots = (0..count)
            .map(|pos| {
                let (text, is_correct) = if pos == correct_pos {
                    (record.correct_answer.clone(), true)
                } else {
                    // `incorrect` holds exactly count-1 entries.
                    (incorrect.next().cloned().unwrap_or_default(), false)
                };
                AnswerSlot {
                    label: SLOT_LABELS[pos],
                    text,
                    is_correct,
                    vote_count: 0,
                }
            })
            .collect();

        Self { slots }
    }

    /// Count one vote for a slot. Unknown labels come from an untrusted
    /// event source and are reported back as `false`, not an error.
    pub fn record_vote(&mut self, label: char) -> bool {
        match self.slots.iter_mut().find(|s| s.label == label) {
            Some(slot) => {
                slot.vote_count += 1;
                true
            }
            None => false,
        }
    }

    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.vote_count = 0;
        }
    }

    pub fn total_votes(&self) -> u32 {
        self.slots.iter().map(|s| s.vote_count).sum()
    }

    /// Smoothed share of the vote: `votes / (total + 1)`. The +1 keeps the
    /// ratio defined with zero votes and strictly below 1 even when one slot
    /// holds them all.
    pub fn fill_ratio(&self, label: char) -> f32 {
        let total = self.total_votes();
        let votes = self
            .slots
            .iter()
            .find(|s| s.label == label)
            .map_or(0, |s| s.vote_count);
        votes as f32 / (total + 1) as f32
    }

    /// Map a fill ratio onto the visible 0-255 channel range.
    pub fn fill_level(ratio: f32) -> u8 {
        (ratio * 255.0).clamp(FILL_FLOOR, FILL_CEIL) as u8
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnswerSlot> {
        self.slots.iter()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn correct(&self) -> Option<&AnswerSlot> {
        self.slots.iter().find(|s| s.is_correct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;

    fn four_way() -> QuestionRecord {
        QuestionRecord {
            id: 1,
            prompt: "Which planet is second from the sun?".to_string(),
            correct_answer: "W".to_string(),
            incorrect_answers: vec!["X".into(), "Y".into(), "Z".into()],
        }
    }

    #[test]
    fn builds_four_slots_with_one_correct() {
        let mut rng = StdRng::seed_from_u64(2);
        let slots = RoundSlots::for_question(&four_way(), &mut rng);

        assert_eq!(slots.len(), 4);
        assert_eq!(slots.iter().filter(|s| s.is_correct).count(), 1);
        assert_eq!(slots.correct().unwrap().text, "W");

        let labels: Vec<char> = slots.iter().map(|s| s.label).collect();
        assert_eq!(labels, vec!['A', 'B', 'C', 'D']);

        let mut texts: Vec<&str> = slots.iter().map(|s| s.text.as_str()).collect();
        texts.sort_unstable();
        assert_eq!(texts, vec!["W", "X", "Y", "Z"]);
    }

    #[test]
    fn boolean_question_builds_two_slots() {
        let record = QuestionRecord {
            id: 2,
            prompt: "The show never sleeps.".to_string(),
            correct_answer: "True".to_string(),
            incorrect_answers: vec!["False".into()],
        };
        let mut rng = StdRng::seed_from_u64(9);
        let slots = RoundSlots::for_question(&record, &mut rng);

        assert_eq!(slots.len(), 2);
        assert_eq!(slots.iter().filter(|s| s.is_correct).count(), 1);
    }

    #[test]
    fn correct_position_is_roughly_uniform() {
        let mut rng = StdRng::seed_from_u64(42);
        let record = four_way();
        let mut counts = [0u32; 4];

        const ROUNDS: u32 = 4000;
        for _ in 0..ROUNDS {
            let slots = RoundSlots::for_question(&record, &mut rng);
            let pos = slots.iter().position(|s| s.is_correct).unwrap();
            counts[pos] += 1;
        }

        // Each position expects ROUNDS/4 = 1000; allow a wide statistical band.
        for (pos, &c) in counts.iter().enumerate() {
            assert!(
                (850..=1150).contains(&c),
                "position {pos} hit {c} times out of {ROUNDS}"
            );
        }
    }

    #[test]
    fn unknown_label_is_a_no_op() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut slots = RoundSlots::for_question(&four_way(), &mut rng);

        assert!(!slots.record_vote('Z'));
        assert!(!slots.record_vote('1'));
        assert_eq!(slots.total_votes(), 0);
    }

    #[test]
    fn reset_zeroes_counts_and_ratios() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut slots = RoundSlots::for_question(&four_way(), &mut rng);

        for _ in 0..5 {
            assert!(slots.record_vote('B'));
        }
        slots.record_vote('D');
        assert_eq!(slots.total_votes(), 6);

        slots.reset();
        assert_eq!(slots.total_votes(), 0);
        for label in SLOT_LABELS {
            assert_eq!(slots.fill_ratio(label), 0.0);
        }
    }

    #[test]
    fn fill_ratio_is_smoothed() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut slots = RoundSlots::for_question(&four_way(), &mut rng);

        for _ in 0..9 {
            slots.record_vote('A');
        }
        // 9 of 9 votes still stays strictly below 1.
        assert_eq!(slots.fill_ratio('A'), 0.9);
        assert_eq!(slots.fill_ratio('B'), 0.0);
    }

    #[test]
    fn fill_level_clamps_into_visible_range() {
        assert_eq!(RoundSlots::fill_level(0.0), 100);
        assert_eq!(RoundSlots::fill_level(0.2), 100);
        assert_eq!(RoundSlots::fill_level(0.5), 127);
        assert_eq!(RoundSlots::fill_level(1.0), 255);
    }
}
