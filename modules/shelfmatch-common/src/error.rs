use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShelfMatchError {
    #[error("Input error: {0}")]
    Input(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
