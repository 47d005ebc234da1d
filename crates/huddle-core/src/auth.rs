use serde::Deserialize;

use crate::error::HuddleError;

/// Response from a deployment's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    engine_url: String,
    token: String,
}

/// Connection credentials for the engine.
#[derive(Debug, Clone)]
pub struct SessionCredentials {
    /// WebSocket URL of the engine (wss://)
    pub engine_url: String,
    /// JWT access token
    pub token: String,
}

/// Fetches engine access tokens for a room.
pub struct TokenService;

impl TokenService {
    /// Request credentials from the deployment's token endpoint.
    ///
    /// `service_url` is the deployment host, with or without a scheme
    /// (`https://huddle.example.com` or `huddle.example.com`).
    pub async fn request_token(
        service_url: &str,
        room_name: &str,
        identity: Option<&str>,
    ) -> Result<SessionCredentials, HuddleError> {
        let host = Self::parse_service_url(service_url)?;
        Self::validate_room_name(room_name)?;

        let mut api_url = format!("https://{host}/api/v1/rooms/{room_name}/token");
        if let Some(identity) = identity {
            let encoded = urlencoding::encode(identity);
            api_url.push_str(&format!("?identity={encoded}"));
        }

        tracing::info!("requesting token from {api_url}");

        let resp = reqwest::get(&api_url)
            .await
            .map_err(|e| HuddleError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(HuddleError::Auth(format!(
                "token endpoint returned status {}",
                resp.status()
            )));
        }

        let data: TokenResponse = resp
            .json()
            .await
            .map_err(|e| HuddleError::Auth(format!("invalid token response: {e}")))?;

        Ok(SessionCredentials {
            engine_url: Self::to_ws_url(&data.engine_url),
            token: data.token,
        })
    }

    /// Mint a join token locally with an engine API key pair.
    ///
    /// Development path: lets tests and demos join a room without a
    /// deployed token service.
    pub fn mint_dev_token(
        engine_url: &str,
        room_name: &str,
        identity: &str,
        api_key: &str,
        api_secret: &str,
    ) -> Result<SessionCredentials, HuddleError> {
        Self::validate_room_name(room_name)?;
        if identity.is_empty() {
            return Err(HuddleError::InvalidArgument("identity is empty".into()));
        }

        let token = livekit_api::access_token::AccessToken::with_api_key(api_key, api_secret)
            .with_identity(identity)
            .with_name(identity)
            .with_grants(livekit_api::access_token::VideoGrants {
                room_join: true,
                room: room_name.to_string(),
                ..Default::default()
            })
            .to_jwt()
            .map_err(|e| HuddleError::Auth(e.to_string()))?;

        Ok(SessionCredentials {
            engine_url: Self::to_ws_url(engine_url),
            token,
        })
    }

    /// Room names are lowercase alphanumerics plus `-`/`_`, max 64 chars.
    pub fn validate_room_name(name: &str) -> Result<(), HuddleError> {
        let re = regex::Regex::new(r"^[a-z0-9][a-z0-9_-]{0,63}$").unwrap();
        if re.is_match(name) {
            Ok(())
        } else {
            Err(HuddleError::InvalidArgument(format!(
                "invalid room name: '{name}'"
            )))
        }
    }

    /// Extract the bare host from a service URL.
    fn parse_service_url(url: &str) -> Result<String, HuddleError> {
        let host = url
            .trim()
            .trim_end_matches('/')
            .trim_start_matches("https://")
            .trim_start_matches("http://");

        if host.is_empty() || host.contains('/') {
            return Err(HuddleError::InvalidUrl(format!(
                "expected a bare service host, got '{url}'"
            )));
        }
        Ok(host.to_string())
    }

    fn to_ws_url(url: &str) -> String {
        url.replace("https://", "wss://").replace("http://", "ws://")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_service_url_with_scheme() {
        let host = TokenService::parse_service_url("https://huddle.example.com").unwrap();
        assert_eq!(host, "huddle.example.com");
    }

    #[test]
    fn parse_service_url_without_scheme() {
        let host = TokenService::parse_service_url("huddle.example.com").unwrap();
        assert_eq!(host, "huddle.example.com");
    }

    #[test]
    fn parse_service_url_trailing_slash() {
        let host = TokenService::parse_service_url("https://huddle.example.com/").unwrap();
        assert_eq!(host, "huddle.example.com");
    }

    #[test]
    fn parse_service_url_rejects_paths_and_empty() {
        assert!(TokenService::parse_service_url("").is_err());
        assert!(TokenService::parse_service_url("https://").is_err());
        assert!(TokenService::parse_service_url("example.com/rooms/a").is_err());
    }

    #[test]
    fn room_name_accepts_slug_shapes() {
        assert!(TokenService::validate_room_name("standup").is_ok());
        assert!(TokenService::validate_room_name("team-sync_2").is_ok());
        assert!(TokenService::validate_room_name("a").is_ok());
    }

    #[test]
    fn room_name_rejects_bad_shapes() {
        assert!(TokenService::validate_room_name("").is_err());
        assert!(TokenService::validate_room_name("UPPER").is_err());
        assert!(TokenService::validate_room_name("-leading").is_err());
        assert!(TokenService::validate_room_name("has space").is_err());
        assert!(TokenService::validate_room_name(&"x".repeat(65)).is_err());
    }

    #[test]
    fn ws_normalization() {
        assert_eq!(
            TokenService::to_ws_url("https://engine.example.com"),
            "wss://engine.example.com"
        );
        assert_eq!(
            TokenService::to_ws_url("http://localhost:7880"),
            "ws://localhost:7880"
        );
    }

    #[test]
    fn dev_token_mints_a_jwt() {
        let creds = TokenService::mint_dev_token(
            "http://localhost:7880",
            "standup",
            "alice",
            "devkey",
            "devsecret-devsecret-devsecret-00",
        )
        .unwrap();
        assert_eq!(creds.engine_url, "ws://localhost:7880");
        // JWTs are three dot-separated segments.
        assert_eq!(creds.token.split('.').count(), 3);
    }

    #[test]
    fn dev_token_rejects_empty_identity() {
        let result = TokenService::mint_dev_token("http://localhost:7880", "standup", "", "k", "s");
        assert!(matches!(result, Err(HuddleError::InvalidArgument(_))));
    }
}
