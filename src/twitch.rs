#![forbid(unsafe_code)]

//! Synchronous Twitch Helix client plus the two OAuth2 token flows.
//!
//! All calls share one `ureq` agent with a fixed 30-second timeout and
//! are never retried here; a failed call surfaces as a typed error and
//! the operator re-runs the process. The read queries the orchestrator
//! needs are behind the [`VodSource`] trait so tests can swap in an
//! in-memory platform.

use crate::error::VodError;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const API_BASE: &str = "https://api.twitch.tv/helix";
pub const ID_BASE: &str = "https://id.twitch.tv/oauth2";

const CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// An archived broadcast as reported by the platform. Read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Vod {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
}

/// The three read queries the channel processor runs against the platform.
pub trait VodSource {
    fn resolve_user_id(&self, login: &str) -> Result<String, VodError>;
    fn is_live(&self, user_id: &str) -> Result<bool, VodError>;
    fn latest_archived_vod(&self, user_id: &str) -> Result<Option<Vod>, VodError>;
}

/// Helix wraps every list response in a `data` array.
#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct UserEntry {
    id: String,
}

pub struct TwitchClient {
    agent: ureq::Agent,
    client_id: String,
    token: String,
}

impl TwitchClient {
    pub fn new(client_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(CALL_TIMEOUT).build(),
            client_id: client_id.into(),
            token: token.into(),
        }
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, VodError> {
        let mut request = self
            .agent
            .get(url)
            .set("Authorization", &format!("Bearer {}", self.token))
            .set("Client-Id", &self.client_id);
        for (key, value) in query {
            request = request.query(key, value);
        }
        let response = request.call().map_err(map_api_error)?;
        response
            .into_json()
            .map_err(|err| VodError::Transport(format!("decoding response from {url}: {err}")))
    }
}

impl VodSource for TwitchClient {
    fn resolve_user_id(&self, login: &str) -> Result<String, VodError> {
        let page: Page<UserEntry> =
            self.get_json(&format!("{API_BASE}/users"), &[("login", login)])?;
        page.data
            .into_iter()
            .next()
            .map(|user| user.id)
            .ok_or_else(|| VodError::NotFound(format!("no Twitch user for login {login}")))
    }

    fn is_live(&self, user_id: &str) -> Result<bool, VodError> {
        let page: Page<serde_json::Value> =
            self.get_json(&format!("{API_BASE}/streams"), &[("user_id", user_id)])?;
        Ok(!page.data.is_empty())
    }

    fn latest_archived_vod(&self, user_id: &str) -> Result<Option<Vod>, VodError> {
        let page: Page<Vod> = self.get_json(
            &format!("{API_BASE}/videos"),
            &[
                ("user_id", user_id),
                ("first", "1"),
                ("type", "archive"),
                ("sort", "time"),
            ],
        )?;
        Ok(newest_vod(page.data))
    }
}

/// Callers rely on "latest" being monotonic across runs, so the newest
/// publish time wins even if the platform ever hands back more than one
/// entry per page.
fn newest_vod(entries: Vec<Vod>) -> Option<Vod> {
    entries.into_iter().max_by_key(|vod| vod.published_at)
}

/// A 401 means the token or client id is bad and the whole run should
/// stop; everything else on the API surface is a transport problem for
/// the current attempt only.
fn map_api_error(err: ureq::Error) -> VodError {
    match err {
        ureq::Error::Status(401, _) => {
            VodError::Auth("Twitch API unauthorized; check token and client id".into())
        }
        ureq::Error::Status(code, response) => VodError::Transport(format!(
            "unexpected HTTP status {code} from {}",
            response.get_url()
        )),
        ureq::Error::Transport(transport) => VodError::Transport(transport.to_string()),
    }
}

/// On the id server a rejected request means rejected credentials.
fn map_token_error(err: ureq::Error) -> VodError {
    match err {
        ureq::Error::Status(code, _) => {
            VodError::Auth(format!("token endpoint rejected the request (HTTP {code})"))
        }
        ureq::Error::Transport(transport) => VodError::Transport(transport.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct AppToken {
    access_token: String,
}

/// Client-credentials app token, used whenever no user token is
/// configured.
pub fn app_access_token(client_id: &str, client_secret: &str) -> Result<String, VodError> {
    let agent = ureq::AgentBuilder::new().timeout(CALL_TIMEOUT).build();
    let response = agent
        .post(&format!("{ID_BASE}/token"))
        .send_form(&[
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("grant_type", "client_credentials"),
        ])
        .map_err(map_token_error)?;
    let payload: AppToken = response
        .into_json()
        .map_err(|err| VodError::Transport(format!("decoding token response: {err}")))?;
    Ok(payload.access_token)
}

/// First half of the device-code flow: the platform hands out a code the
/// user confirms in a browser.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCodeGrant {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    #[serde(default = "default_poll_interval")]
    pub interval: u64,
}

fn default_poll_interval() -> u64 {
    5
}

/// Full token payload; `extra` keeps refresh token, scopes, and expiry
/// intact for the saved token file without naming every field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

pub fn request_device_code(client_id: &str, scopes: &str) -> Result<DeviceCodeGrant, VodError> {
    let agent = ureq::AgentBuilder::new().timeout(CALL_TIMEOUT).build();
    let response = agent
        .post(&format!("{ID_BASE}/device"))
        .send_form(&[("client_id", client_id), ("scopes", scopes)])
        .map_err(map_token_error)?;
    response
        .into_json()
        .map_err(|err| VodError::Transport(format!("decoding device grant: {err}")))
}

/// Pending/slow-down responses while the user has not confirmed yet; the
/// poll keeps going on these and dies on anything else.
pub fn device_poll_should_continue(status: u16) -> bool {
    matches!(status, 400 | 428 | 429)
}

/// Polls the token endpoint at the platform-suggested interval until the
/// user authorizes the device code. Runs until authorization or a fatal
/// status; the operator can always abort the process.
pub fn poll_device_token(
    client_id: &str,
    grant: &DeviceCodeGrant,
) -> Result<TokenResponse, VodError> {
    let agent = ureq::AgentBuilder::new().timeout(CALL_TIMEOUT).build();
    let interval = Duration::from_secs(grant.interval.max(1));
    loop {
        std::thread::sleep(interval);
        let result = agent
            .post(&format!("{ID_BASE}/token"))
            .send_form(&[
                ("client_id", client_id),
                ("device_code", grant.device_code.as_str()),
                ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
            ]);
        match result {
            Ok(response) => {
                return response.into_json().map_err(|err| {
                    VodError::Transport(format!("decoding token response: {err}"))
                });
            }
            Err(ureq::Error::Status(code, _)) if device_poll_should_continue(code) => continue,
            Err(err) => return Err(map_token_error(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn vod(id: &str, published_at: DateTime<Utc>) -> Vod {
        Vod {
            id: id.to_string(),
            user_id: "42".to_string(),
            title: format!("Broadcast {id}"),
            description: String::new(),
            url: format!("https://www.twitch.tv/videos/{id}"),
            published_at,
        }
    }

    #[test]
    fn vod_page_deserializes_helix_payload() {
        let raw = r#"{
            "data": [{
                "id": "101",
                "user_id": "42",
                "title": "Ep A",
                "description": "",
                "url": "https://www.twitch.tv/videos/101",
                "published_at": "2024-01-10T05:00:00Z",
                "type": "archive",
                "duration": "3h2m1s"
            }],
            "pagination": {}
        }"#;
        let page: Page<Vod> = serde_json::from_str(raw).unwrap();
        assert_eq!(page.data.len(), 1);
        let vod = &page.data[0];
        assert_eq!(vod.id, "101");
        assert_eq!(
            vod.published_at,
            Utc.with_ymd_and_hms(2024, 1, 10, 5, 0, 0).unwrap()
        );
    }

    #[test]
    fn empty_data_array_means_no_archives() {
        let page: Page<Vod> = serde_json::from_str(r#"{"data": [], "pagination": {}}"#).unwrap();
        assert!(newest_vod(page.data).is_none());
    }

    #[test]
    fn missing_data_field_defaults_to_empty() {
        let page: Page<UserEntry> = serde_json::from_str("{}").unwrap();
        assert!(page.data.is_empty());
    }

    #[test]
    fn newest_vod_wins_by_publish_time() {
        let older = vod("100", Utc.with_ymd_and_hms(2024, 1, 9, 4, 0, 0).unwrap());
        let newer = vod("101", Utc.with_ymd_and_hms(2024, 1, 10, 5, 0, 0).unwrap());
        let picked = newest_vod(vec![older, newer.clone()]).unwrap();
        assert_eq!(picked, newer);
    }

    #[test]
    fn device_poll_statuses_classified() {
        assert!(device_poll_should_continue(400));
        assert!(device_poll_should_continue(428));
        assert!(device_poll_should_continue(429));
        assert!(!device_poll_should_continue(403));
        assert!(!device_poll_should_continue(500));
    }

    #[test]
    fn device_grant_defaults_interval() {
        let grant: DeviceCodeGrant = serde_json::from_str(
            r#"{
                "device_code": "dev",
                "user_code": "ABCD-1234",
                "verification_uri": "https://www.twitch.tv/activate"
            }"#,
        )
        .unwrap();
        assert_eq!(grant.interval, 5);
    }

    #[test]
    fn token_response_preserves_extra_fields() {
        let raw = r#"{
            "access_token": "tok",
            "refresh_token": "refresh",
            "expires_in": 14400,
            "scope": [],
            "token_type": "bearer"
        }"#;
        let token: TokenResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(token.access_token, "tok");
        let round_trip = serde_json::to_value(&token).unwrap();
        assert_eq!(round_trip["refresh_token"], "refresh");
        assert_eq!(round_trip["expires_in"], 14400);
    }
}
