use thiserror::Error;

use crate::core_types::SourceSystem;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source {0} is unavailable: {1}")]
    Unavailable(SourceSystem, String),

    #[error("record not found in {0}: {1}")]
    RecordNotFound(SourceSystem, String),

    #[error("write-back rejected by {0}: {1}")]
    WriteBackRejected(SourceSystem, String),

    #[error("malformed payload in {0}: {1}")]
    MalformedPayload(SourceSystem, String),
}
