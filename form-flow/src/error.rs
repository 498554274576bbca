use thiserror::Error;

use crate::protocol::{Flow, InsuranceType};

#[derive(Error, Debug)]
pub enum FormError {
    #[error("No form schema for {flow} / {insurance}")]
    UnsupportedForm { flow: Flow, insurance: InsuranceType },

    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    #[error("Malformed {event} payload: {source}")]
    MalformedPayload {
        event: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid field path: {0}")]
    InvalidFieldPath(String),

    #[error("Message channel closed")]
    ChannelClosed,

    #[error("Invalid brand catalog: {0}")]
    BrandCatalog(String),

    #[error("Submission failed: {0}")]
    SubmissionFailed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FormError>;
