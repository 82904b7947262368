use cascara_core::EngineError;
use cascara_parser::ParseError;
use thiserror::Error;

pub type CascaraResult<T> = Result<T, CascaraError>;

#[derive(Error, Debug)]
pub enum CascaraError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}
