pub mod slots;

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use rand::prelude::*;
use serde::Deserialize;

use crate::error::ShowError;

/// Corpus category, matching the two files the offline fetcher persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Multiple,
    Boolean,
}

impl Category {
    pub fn corpus_file(self) -> &'static str {
        match self {
            Category::Multiple => "trivia_questions_multiple.json",
            Category::Boolean => "trivia_questions_boolean.json",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Multiple => write!(f, "multiple"),
            Category::Boolean => write!(f, "boolean"),
        }
    }
}

/// How each round picks its corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryMode {
    #[default]
    Multiple,
    Boolean,
    /// Uniform pick per round among categories that still have questions.
    Mixed,
}

impl CategoryMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "multiple" => Some(CategoryMode::Multiple),
            "boolean" => Some(CategoryMode::Boolean),
            "mixed" => Some(CategoryMode::Mixed),
            _ => None,
        }
    }
}

/// One trivia item as persisted by the fetcher. Text arrives already
/// HTML-entity-decoded; nothing here re-escapes or rewrites it.
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionRecord {
    #[serde(rename = "index")]
    pub id: u32,
    #[serde(rename = "question")]
    pub prompt: String,
    pub correct_answer: String,
    pub incorrect_answers: Vec<String>,
}

struct CategoryPool {
    records: Vec<QuestionRecord>,
    served: HashSet<usize>,
}

impl CategoryPool {
    fn load(dir: &Path, category: Category) -> Result<Self, ShowError> {
        let path = dir.join(category.corpus_file());
        let raw = fs::read_to_string(&path)?;

        let records: Vec<QuestionRecord> =
            serde_json::from_str(&raw).map_err(|e| ShowError::CorpusFormat {
                path: path.clone(),
                detail: e.to_string(),
            })?;

        for record in &records {
            let n = record.incorrect_answers.len();
            if !(1..=3).contains(&n) {
                return Err(ShowError::CorpusFormat {
                    path,
                    detail: format!(
                        "record {} has {} incorrect answers, expected 1-3",
                        record.id, n
                    ),
                });
            }
        }

        Ok(Self {
            records,
            served: HashSet::new(),
        })
    }

    fn next(&mut self, category: Category, rng: &mut impl Rng) -> Result<&QuestionRecord, ShowError> {
        let free: Vec<usize> = (0..self.records.len())
            .filter(|i| !self.served.contains(i))
            .collect();

        let idx = *free
            .choose(rng)
            .ok_or(ShowError::PoolExhausted(category))?;
        self.served.insert(idx);

        Ok(&self.records[idx])
    }

    fn remaining(&self) -> usize {
        self.records.len() - self.served.len()
    }
}

/// The full question corpus with per-category served-index tracking.
///
/// An index is never re-served while unseen indices remain; once a category
/// runs dry, `next` returns `PoolExhausted` instead of wrapping around.
pub struct QuestionPool {
    multiple: CategoryPool,
    boolean: CategoryPool,
}

impl QuestionPool {
    pub fn load(dir: &Path) -> Result<Self, ShowError> {
        Ok(Self {
            multiple: CategoryPool::load(dir, Category::Multiple)?,
            boolean: CategoryPool::load(dir, Category::Boolean)?,
        })
    }

    #[cfg(test)]
    fn from_records(multiple: Vec<QuestionRecord>, boolean: Vec<QuestionRecord>) -> Self {
        Self {
            multiple: CategoryPool {
                records: multiple,
                served: HashSet::new(),
            },
            boolean: CategoryPool {
                records: boolean,
                served: HashSet::new(),
            },
        }
    }

    pub fn next(
        &mut self,
        category: Category,
        rng: &mut impl Rng,
    ) -> Result<&QuestionRecord, ShowError> {
        match category {
            Category::Multiple => self.multiple.next(category, rng),
            Category::Boolean => self.boolean.next(category, rng),
        }
    }

    pub fn remaining(&self, category: Category) -> usize {
        match category {
            Category::Multiple => self.multiple.remaining(),
            Category::Boolean => self.boolean.remaining(),
        }
    }

    /// Resolve the configured mode to this round's category. `Mixed` only
    /// considers categories with questions left, so one corpus running dry
    /// does not end the show while the other still has material.
    pub fn pick_category(&self, mode: CategoryMode, rng: &mut impl Rng) -> Category {
        match mode {
            CategoryMode::Multiple => Category::Multiple,
            CategoryMode::Boolean => Category::Boolean,
            CategoryMode::Mixed => {
                let candidates: Vec<Category> = [Category::Multiple, Category::Boolean]
                    .into_iter()
                    .filter(|&c| self.remaining(c) > 0)
                    .collect();
                *candidates.choose(rng).unwrap_or(&Category::Multiple)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;

    fn record(id: u32, prompt: &str) -> QuestionRecord {
        QuestionRecord {
            id,
            prompt: prompt.to_string(),
            correct_answer: "right".to_string(),
            incorrect_answers: vec!["a".into(), "b".into(), "c".into()],
        }
    }

    #[test]
    fn never_serves_an_index_twice() {
        let records: Vec<_> = (0..20).map(|i| record(i, "q")).collect();
        let mut pool = QuestionPool::from_records(records, vec![]);
        let mut rng = StdRng::seed_from_u64(7);

        let mut seen = HashSet::new();
        for _ in 0..20 {
            let q = pool.next(Category::Multiple, &mut rng).unwrap();
            assert!(seen.insert(q.id), "id {} served twice", q.id);
        }
    }

    #[test]
    fn exhaustion_is_an_explicit_error() {
        let mut pool = QuestionPool::from_records(vec![record(0, "q0"), record(1, "q1")], vec![]);
        let mut rng = StdRng::seed_from_u64(3);

        let first = pool.next(Category::Multiple, &mut rng).unwrap().id;
        let second = pool.next(Category::Multiple, &mut rng).unwrap().id;
        assert_ne!(first, second);

        match pool.next(Category::Multiple, &mut rng) {
            Err(ShowError::PoolExhausted(Category::Multiple)) => {}
            other => panic!("expected PoolExhausted, got {other:?}"),
        }
    }

    #[test]
    fn empty_category_is_exhausted_immediately() {
        let mut pool = QuestionPool::from_records(vec![record(0, "q")], vec![]);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(pool.next(Category::Boolean, &mut rng).is_err());
    }

    #[test]
    fn mixed_mode_skips_a_dry_category() {
        let mut pool =
            QuestionPool::from_records(vec![record(0, "q")], vec![record(1, "t"), record(2, "f")]);
        let mut rng = StdRng::seed_from_u64(5);

        pool.next(Category::Multiple, &mut rng).unwrap();
        assert_eq!(pool.remaining(Category::Multiple), 0);

        for _ in 0..16 {
            let c = pool.pick_category(CategoryMode::Mixed, &mut rng);
            assert_eq!(c, Category::Boolean);
        }
    }

    #[test]
    fn malformed_corpus_fails_at_load() {
        let dir = std::env::temp_dir().join(format!("livequiz-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(Category::Multiple.corpus_file()),
            r#"[{"index": 0, "question": "no answers here"}]"#,
        )
        .unwrap();
        std::fs::write(dir.join(Category::Boolean.corpus_file()), "[]").unwrap();

        match QuestionPool::load(&dir) {
            Err(ShowError::CorpusFormat { .. }) => {}
            other => panic!("expected CorpusFormat, got {:?}", other.map(|_| ())),
        }
        std::fs::remove_dir_all(&dir).ok();
    }
}
