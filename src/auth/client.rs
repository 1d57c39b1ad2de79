use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::AuthError;

/// External authentication collaborator.
#[async_trait]
pub trait AuthClient: Send + Sync {
    /// Exchanges credentials for an opaque access token.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-2xx response, or a
    /// response body without an access token.
    async fn login(&self, email: &str, password: &str) -> Result<String, AuthError>;
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    data: LoginData,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    access_token: String,
}

/// Auth collaborator backed by the login endpoint's JSON contract:
/// `POST {email, password}` answered by `{data: {access_token}}`.
#[derive(Debug, Clone)]
pub struct HttpAuthClient {
    http: reqwest::Client,
    login_url: String,
}

impl HttpAuthClient {
    /// Creates a client posting to the given login endpoint.
    #[must_use]
    pub fn new(login_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            login_url: login_url.into(),
        }
    }
}

#[async_trait]
impl AuthClient for HttpAuthClient {
    #[instrument(skip(self, password), level = "debug", fields(url = %self.login_url))]
    async fn login(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let response = self
            .http
            .post(&self.login_url)
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Rejected {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        token_from_body(&body)
    }
}

fn token_from_body(body: &str) -> Result<String, AuthError> {
    let parsed: LoginResponse =
        serde_json::from_str(body).map_err(|_| AuthError::MalformedResponse)?;
    if parsed.data.access_token.is_empty() {
        return Err(AuthError::MalformedResponse);
    }
    Ok(parsed.data.access_token)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[test]
    fn token_is_read_from_nested_envelope() {
        let token = token_from_body(r#"{"data":{"access_token":"T1"}}"#)
            .expect("envelope should parse");
        assert_eq!("T1", token);
    }

    #[rstest]
    #[case::not_json("<html>login</html>")]
    #[case::flat_token(r#"{"access_token":"T1"}"#)]
    #[case::missing_field(r#"{"data":{}}"#)]
    #[case::empty_token(r#"{"data":{"access_token":""}}"#)]
    fn malformed_bodies_are_login_failures(#[case] body: &str) {
        assert_matches!(token_from_body(body), Err(AuthError::MalformedResponse));
    }
}
