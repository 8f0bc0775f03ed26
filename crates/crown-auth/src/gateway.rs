//! Backend identity API.

use crate::{AuthError, AuthResult};
use async_trait::async_trait;
use crown_storage::UserIdentity;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Result of a revoke call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevokeOutcome {
    /// The backend invalidated the token.
    Revoked,
    /// The backend no longer recognised the token (HTTP 401).
    AlreadyInvalid,
}

/// Play summary returned by the profile endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub all_cnt: u64,
    #[serde(default)]
    pub all_time: u64,
    #[serde(default)]
    pub profile: String,
}

/// Everything the session needs from the backend.
#[async_trait]
pub trait IdentityGateway: Send + Sync {
    /// URL of the provider consent page.
    async fn request_login_link(&self) -> AuthResult<String>;

    /// Ask the backend who `token` belongs to.
    ///
    /// An empty nickname is a failure.
    async fn fetch_identity(&self, token: &str) -> AuthResult<UserIdentity>;

    async fn fetch_profile(&self, token: &str) -> AuthResult<ProfileSummary>;

    /// Invalidate `token` server-side. A 401 is reported as
    /// [`RevokeOutcome::AlreadyInvalid`], not as an error.
    async fn revoke(&self, token: Option<&str>) -> AuthResult<RevokeOutcome>;

    async fn update_nickname(&self, token: &str, nickname: &str) -> AuthResult<()>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityResponse {
    #[serde(default)]
    nick_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    profile_image: Option<String>,
}

#[derive(Debug, Serialize)]
struct NicknameRequest<'a> {
    nickname: &'a str,
}

/// [`IdentityGateway`] over the backend's REST API.
pub struct HttpIdentityGateway {
    base_url: Url,
    http_client: Client,
}

impl HttpIdentityGateway {
    /// Create a gateway rooted at `base_url` with a per-request timeout.
    pub fn new(base_url: Url, timeout: Duration) -> AuthResult<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url,
            http_client,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `path` appended to the base URL, keeping any base path prefix.
    fn endpoint(&self, path: &str) -> AuthResult<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{}{}", base, path))?)
    }

    async fn error_for_status(response: Response) -> AuthError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        AuthError::Status { status, body }
    }
}

#[async_trait]
impl IdentityGateway for HttpIdentityGateway {
    async fn request_login_link(&self) -> AuthResult<String> {
        let url = self.endpoint("/oauth2/login")?;
        debug!(url = %url, "Requesting login link");

        let response = self.http_client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(Self::error_for_status(response).await);
        }

        // Either a JSON string or the bare URL
        let body = response.text().await?;
        let link = serde_json::from_str::<String>(&body).unwrap_or_else(|_| body.trim().to_string());
        Url::parse(&link)?;

        info!("Received login link");
        Ok(link)
    }

    async fn fetch_identity(&self, token: &str) -> AuthResult<UserIdentity> {
        let url = self.endpoint("/user")?;
        debug!(url = %url, "Probing identity");

        let response = self.http_client.get(url).bearer_auth(token).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Identity probe rejected");
            return Err(AuthError::IdentityProbeFailed(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let data: IdentityResponse = response.json().await?;
        let nickname = data.nick_name.unwrap_or_default();
        if nickname.trim().is_empty() {
            return Err(AuthError::IdentityProbeFailed(
                "Response carried no nickname".to_string(),
            ));
        }

        debug!(nickname = %nickname, "Identity confirmed");
        Ok(UserIdentity {
            nickname,
            email: data.email.unwrap_or_default(),
            profile_image: data.profile_image.unwrap_or_default(),
            ..Default::default()
        })
    }

    async fn fetch_profile(&self, token: &str) -> AuthResult<ProfileSummary> {
        let url = self.endpoint("/user/mypage")?;
        let response = self.http_client.get(url).bearer_auth(token).send().await?;
        if !response.status().is_success() {
            return Err(Self::error_for_status(response).await);
        }
        Ok(response.json().await?)
    }

    async fn revoke(&self, token: Option<&str>) -> AuthResult<RevokeOutcome> {
        let url = self.endpoint("/oauth2/logout")?;
        let mut request = self.http_client.post(url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        match response.status() {
            status if status.is_success() => {
                info!("Token revoked");
                Ok(RevokeOutcome::Revoked)
            }
            StatusCode::UNAUTHORIZED => {
                info!("Token already invalid on the server");
                Ok(RevokeOutcome::AlreadyInvalid)
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(AuthError::RevocationFailed(format!(
                    "HTTP {}: {}",
                    status, body
                )))
            }
        }
    }

    async fn update_nickname(&self, token: &str, nickname: &str) -> AuthResult<()> {
        let url = self.endpoint("/user")?;
        let response = self
            .http_client
            .patch(url)
            .bearer_auth(token)
            .json(&NicknameRequest { nickname })
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_for_status(response).await);
        }
        info!(nickname = %nickname, "Nickname updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN: &str = "a.b.c";

    fn gateway(server: &MockServer) -> HttpIdentityGateway {
        let base = Url::parse(&format!("{}/api", server.uri())).unwrap();
        HttpIdentityGateway::new(base, Duration::from_secs(5)).unwrap()
    }

    async fn mount(server: &MockServer, verb: &str, route: &str, response: ResponseTemplate) {
        Mock::given(method(verb))
            .and(path(route))
            .and(header("authorization", format!("Bearer {}", TOKEN).as_str()))
            .respond_with(response)
            .expect(1)
            .mount(server)
            .await;
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let base = Url::parse("https://flow.example.com/api/").unwrap();
        let gw = HttpIdentityGateway::new(base, Duration::from_secs(5)).unwrap();
        assert_eq!(
            gw.endpoint("/user/mypage").unwrap().as_str(),
            "https://flow.example.com/api/user/mypage"
        );
    }

    #[tokio::test]
    async fn test_fetch_identity_sends_bearer() {
        let server = MockServer::start().await;
        mount(
            &server,
            "GET",
            "/api/user",
            ResponseTemplate::new(200).set_body_json(json!({
                "nickName": "crowny",
                "email": "crowny@example.com",
            })),
        )
        .await;

        let identity = gateway(&server).fetch_identity(TOKEN).await.unwrap();
        assert_eq!(identity.nickname, "crowny");
        assert_eq!(identity.email, "crowny@example.com");
    }

    #[tokio::test]
    async fn test_fetch_identity_empty_nickname_fails() {
        for body in [json!({ "nickName": "" }), json!({})] {
            let server = MockServer::start().await;
            mount(
                &server,
                "GET",
                "/api/user",
                ResponseTemplate::new(200).set_body_json(body),
            )
            .await;

            assert!(matches!(
                gateway(&server).fetch_identity(TOKEN).await,
                Err(AuthError::IdentityProbeFailed(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_fetch_identity_rejected() {
        let server = MockServer::start().await;
        mount(
            &server,
            "GET",
            "/api/user",
            ResponseTemplate::new(401).set_body_json(json!({ "message": "expired" })),
        )
        .await;

        let result = gateway(&server).fetch_identity(TOKEN).await;
        assert!(matches!(result, Err(AuthError::IdentityProbeFailed(_))));
    }

    #[tokio::test]
    async fn test_revoke_sends_bearer() {
        let server = MockServer::start().await;
        mount(&server, "POST", "/api/oauth2/logout", ResponseTemplate::new(200)).await;

        let outcome = gateway(&server).revoke(Some(TOKEN)).await.unwrap();
        assert_eq!(outcome, RevokeOutcome::Revoked);
    }

    #[tokio::test]
    async fn test_revoke_unauthorized_is_already_invalid() {
        let server = MockServer::start().await;
        mount(&server, "POST", "/api/oauth2/logout", ResponseTemplate::new(401)).await;

        let outcome = gateway(&server).revoke(Some(TOKEN)).await.unwrap();
        assert_eq!(outcome, RevokeOutcome::AlreadyInvalid);
    }

    #[tokio::test]
    async fn test_revoke_without_token_and_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/oauth2/logout"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let result = gateway(&server).revoke(None).await;
        assert!(matches!(result, Err(AuthError::RevocationFailed(_))));

        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].headers.get("authorization").is_none());
    }

    #[tokio::test]
    async fn test_revoke_network_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let base = Url::parse(&format!("http://{}", addr)).unwrap();
        let gw = HttpIdentityGateway::new(base, Duration::from_secs(5)).unwrap();
        let result = gw.revoke(Some(TOKEN)).await;
        assert!(matches!(result, Err(AuthError::Http(_))));
    }

    #[tokio::test]
    async fn test_login_link_json_or_plain() {
        let cases = [
            (
                r#""https://kauth.example.com/authorize?client_id=1""#,
                Some("https://kauth.example.com/authorize?client_id=1"),
            ),
            (
                "https://kauth.example.com/authorize?client_id=2\n",
                Some("https://kauth.example.com/authorize?client_id=2"),
            ),
            ("not a url", None),
        ];

        for (body, expected) in cases {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/api/oauth2/login"))
                .respond_with(ResponseTemplate::new(200).set_body_string(body))
                .expect(1)
                .mount(&server)
                .await;

            let result = gateway(&server).request_login_link().await;
            match expected {
                Some(link) => assert_eq!(result.unwrap(), link),
                None => assert!(matches!(result, Err(AuthError::InvalidUrl(_)))),
            }
        }
    }

    #[tokio::test]
    async fn test_fetch_profile() {
        let server = MockServer::start().await;
        mount(
            &server,
            "GET",
            "/api/user/mypage",
            ResponseTemplate::new(200).set_body_json(json!({
                "name": "crowny",
                "allCnt": 12,
                "allTime": 3600,
                "profile": "https://img/1.png",
            })),
        )
        .await;

        let profile = gateway(&server).fetch_profile(TOKEN).await.unwrap();
        assert_eq!(
            profile,
            ProfileSummary {
                name: "crowny".into(),
                all_cnt: 12,
                all_time: 3600,
                profile: "https://img/1.png".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_fetch_profile_not_found() {
        let server = MockServer::start().await;
        mount(&server, "GET", "/api/user/mypage", ResponseTemplate::new(404)).await;

        let err = gateway(&server).fetch_profile(TOKEN).await.unwrap_err();
        assert!(matches!(err, AuthError::Status { status: 404, .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_update_nickname() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/api/user"))
            .and(header("authorization", "Bearer a.b.c"))
            .and(body_json(json!({ "nickname": "new-name" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/api/user"))
            .and(body_json(json!({ "nickname": "taken-name" })))
            .respond_with(ResponseTemplate::new(409).set_body_string("taken"))
            .expect(1)
            .mount(&server)
            .await;
        let gw = gateway(&server);

        gw.update_nickname(TOKEN, "new-name").await.unwrap();
        let err = gw.update_nickname(TOKEN, "taken-name").await.unwrap_err();
        assert!(matches!(err, AuthError::Status { status: 409, .. }));
    }
}
