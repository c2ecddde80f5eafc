use thiserror::Error;

use backoffice_types::EntityKind;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid updates URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },

    #[error("Access token cannot be sent as a header: {0}")]
    InvalidToken(#[from] tokio_tungstenite::tungstenite::http::header::InvalidHeaderValue),

    #[error("WebSocket transport needs a running tokio runtime")]
    NoRuntime,

    #[error("Connection to {namespace} refused")]
    Refused { namespace: String },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Malformed access token: {0}")]
    MalformedToken(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Failed to open {entity} subscription: {source}")]
    Open {
        entity: EntityKind,
        #[source]
        source: TransportError,
    },
}
