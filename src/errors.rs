use crate::state::Collection;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP error! status: {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    pub(crate) fn from_body(status: u16, body: &str) -> Self {
        #[derive(Deserialize)]
        struct Detail {
            detail: String,
        }

        let message = match serde_json::from_str::<Detail>(body) {
            Ok(detail) => detail.detail,
            Err(_) => body.trim().to_string(),
        };
        ApiError::Status { status, message }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to write store: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize store: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("record belongs to {found}, not the current user {expected:?}")]
    OwnerMismatch {
        expected: Option<String>,
        found: String,
    },

    #[error("{found:?} fetch ticket applied to {expected:?}")]
    WrongCollection {
        expected: Collection,
        found: Collection,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("no authenticated user")]
    NotAuthenticated,

    #[error("redirect URL carries no session_id")]
    InvalidRedirect,

    #[error("message is empty")]
    EmptyMessage,
}
