//! Network and credential settings.

use serde::{Deserialize, Serialize};

/// HTTP/WebSocket listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listener port, shared by the REST and socket surfaces.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Visitor credential settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// HMAC signing secret for visitor tokens.
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub token_ttl_secs: u64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: "matinee-secret-key-change-in-production".to_string(),
            token_ttl_secs: 10_800,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_defaults() {
        let s = ServerSettings::default();
        assert_eq!(s.host, "0.0.0.0");
        assert_eq!(s.port, 8080);
    }

    #[test]
    fn auth_defaults() {
        let a = AuthSettings::default();
        assert_eq!(a.token_ttl_secs, 10_800);
        assert!(!a.jwt_secret.is_empty());
    }

    #[test]
    fn auth_serde_camel_case() {
        let json = serde_json::to_value(AuthSettings::default()).unwrap();
        assert!(json.get("jwtSecret").is_some());
        assert!(json.get("tokenTtlSecs").is_some());
    }
}
