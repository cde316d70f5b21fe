use crate::oauth2::{OAuth2Error, OAuth2Result, TokenRefresher, TokenResponse};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Google's token endpoint
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// OAuth2 client for the token refresh grant
pub struct OAuth2Client {
    client_id: String,
    client_secret: Option<String>,
    token_url: Url,
    http_client: HttpClient,
}

impl OAuth2Client {
    /// Create a new OAuth2 client
    pub fn new(
        client_id: String,
        client_secret: Option<String>,
        token_url: &str,
        timeout: Duration,
    ) -> OAuth2Result<Self> {
        if client_id.trim().is_empty() {
            return Err(OAuth2Error::InvalidConfig("Client ID is required".to_string()));
        }

        let token_url = Url::parse(token_url)?;

        let http_client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(OAuth2Error::NetworkError)?;

        Ok(Self {
            client_id,
            client_secret,
            token_url,
            http_client,
        })
    }

    /// Client for Google accounts
    pub fn google(client_id: String, client_secret: String, timeout: Duration) -> OAuth2Result<Self> {
        Self::new(client_id, Some(client_secret), GOOGLE_TOKEN_URL, timeout)
    }

    /// Refresh access token using refresh token
    pub async fn refresh_token(&self, refresh_token: &str) -> OAuth2Result<TokenResponse> {
        let mut params = HashMap::new();
        params.insert("grant_type", "refresh_token");
        params.insert("refresh_token", refresh_token);
        params.insert("client_id", &self.client_id);

        if let Some(client_secret) = &self.client_secret {
            params.insert("client_secret", client_secret);
        }

        let response = self
            .http_client
            .post(self.token_url.clone())
            .form(&params)
            .send()
            .await
            .map_err(OAuth2Error::NetworkError)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(OAuth2Error::TokenRefreshFailed(format!(
                "{}: {}",
                status,
                describe_error_body(&error_text)
            )));
        }

        let token_data: Value = response.json().await.map_err(OAuth2Error::NetworkError)?;

        parse_token_response(token_data)
    }

    pub fn token_url(&self) -> &Url {
        &self.token_url
    }
}

#[async_trait]
impl TokenRefresher for OAuth2Client {
    async fn refresh(&self, refresh_token: &str) -> OAuth2Result<TokenResponse> {
        self.refresh_token(refresh_token).await
    }
}

/// Parse a token response, tolerating provider differences
fn parse_token_response(data: Value) -> OAuth2Result<TokenResponse> {
    let access_token = data["access_token"]
        .as_str()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| OAuth2Error::InvalidToken("Missing access_token".to_string()))?
        .to_string();

    let refresh_token = data["refresh_token"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());

    let token_type = data["token_type"].as_str().unwrap_or("Bearer").to_string();

    // Some providers send expires_in as a string
    let expires_in = data["expires_in"]
        .as_u64()
        .or_else(|| data["expires_in"].as_str().and_then(|s| s.parse().ok()));

    let scope = data["scope"].as_str().map(|s| s.to_string());

    Ok(TokenResponse {
        access_token,
        refresh_token,
        token_type,
        expires_in,
        scope,
    })
}

/// Pull `error` / `error_description` out of an RFC 6749 error body
fn describe_error_body(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(json) => match (json["error"].as_str(), json["error_description"].as_str()) {
            (Some(error), Some(description)) => format!("{} ({})", error, description),
            (Some(error), None) => error.to_string(),
            _ => body.to_string(),
        },
        Err(_) => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OAuth2Client {
        OAuth2Client::new(
            "test-client-id".to_string(),
            Some("test-client-secret".to_string()),
            &format!("{}/token", server.uri()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_empty_client_id() {
        let result = OAuth2Client::new(
            "  ".to_string(),
            None,
            GOOGLE_TOKEN_URL,
            Duration::from_secs(5),
        );
        assert!(matches!(result, Err(OAuth2Error::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_bad_token_url() {
        let result = OAuth2Client::new(
            "id".to_string(),
            None,
            "not a url",
            Duration::from_secs(5),
        );
        assert!(matches!(result, Err(OAuth2Error::UrlParseError(_))));
    }

    #[test]
    fn test_parse_token_response_defaults() {
        let response = parse_token_response(json!({
            "access_token": "ya29.abc",
            "expires_in": "3599"
        }))
        .unwrap();

        assert_eq!(response.access_token, "ya29.abc");
        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.expires_in, Some(3599));
        assert!(response.refresh_token.is_none());
    }

    #[test]
    fn test_parse_token_response_requires_access_token() {
        let result = parse_token_response(json!({ "token_type": "Bearer" }));
        assert!(matches!(result, Err(OAuth2Error::InvalidToken(_))));
    }

    #[test]
    fn test_describe_error_body() {
        assert_eq!(
            describe_error_body(r#"{"error":"invalid_grant","error_description":"Token has been expired or revoked."}"#),
            "invalid_grant (Token has been expired or revoked.)"
        );
        assert_eq!(describe_error_body("gateway down"), "gateway down");
    }

    #[tokio::test]
    async fn test_refresh_posts_refresh_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=rt-1"))
            .and(body_string_contains("client_id=test-client-id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.new",
                "expires_in": 3599,
                "token_type": "Bearer",
                "scope": "https://www.googleapis.com/auth/gmail.send"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = client_for(&server).refresh("rt-1").await.unwrap();

        assert_eq!(response.access_token, "ya29.new");
        assert_eq!(response.expires_in, Some(3599));
        assert!(response.refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_refresh_surfaces_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Bad Request"
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).refresh("rt-1").await.unwrap_err();

        match err {
            OAuth2Error::TokenRefreshFailed(message) => {
                assert!(message.contains("invalid_grant"));
                assert!(message.contains("400"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
