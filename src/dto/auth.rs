//! DTOs for account sign-up, sign-in and sign-out.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    auth::{AuthSession, Identity},
    dto::validation::validate_username,
};

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SignUpRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
    #[validate(custom(function = "validate_username"))]
    pub username: String,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SignInRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Bearer token and the user it authenticates.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub token: String,
    pub user: Identity,
}

impl From<AuthSession> for SessionResponse {
    fn from(session: AuthSession) -> Self {
        Self {
            token: session.token,
            user: session.identity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_up_rejects_bad_email_and_short_password() {
        let request = SignUpRequest {
            email: "not-an-email".into(),
            password: "123".into(),
            username: "ada".into(),
        };
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
        assert!(!fields.contains_key("username"));
    }

    #[test]
    fn sign_up_runs_username_rules() {
        let request = SignUpRequest {
            email: "ada@example.com".into(),
            password: "hunter22".into(),
            username: "  ".into(),
        };
        assert!(request.validate().unwrap_err().field_errors().contains_key("username"));
    }
}
