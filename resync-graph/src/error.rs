use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum GraphError {
    #[error("integration error: {0}")]
    Integration(String),
}

pub type Result<T> = std::result::Result<T, GraphError>;
