use std::path::PathBuf;

use thiserror::Error;

use crate::quiz::Category;

/// Central error enum for the show.
///
/// Corpus and pool errors are fatal: the loop stops and surfaces them rather
/// than rendering a corrupt round. Synthesis and feed errors are downgraded at
/// the collaborator boundary (the round just runs without that cue).
#[derive(Debug, Error)]
pub enum ShowError {
    #[error("malformed question corpus {}: {detail}", path.display())]
    CorpusFormat { path: PathBuf, detail: String },

    #[error("no unseen {0} question remains")]
    PoolExhausted(Category),

    #[error("speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("unusable font: {0}")]
    InvalidFont(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
