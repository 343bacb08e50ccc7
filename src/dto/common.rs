use serde::Serialize;
use utoipa::ToSchema;

/// Generic acknowledgement for endpoints without a richer payload.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub message: String,
}

impl ActionResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
