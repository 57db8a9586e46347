use crate::config::NodeConfig;
use crate::error::{NodeError, Result};
use axum::http::{HeaderMap, header};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Decides whether a request may reach a gated route.
pub trait Authenticator: Send + Sync {
    fn authorize(&self, headers: &HeaderMap) -> bool;
}

pub struct AllowAll;

impl Authenticator for AllowAll {
    fn authorize(&self, _headers: &HeaderMap) -> bool {
        true
    }
}

/// Compares the bearer token with a shared secret.
pub struct StaticBearer {
    token: String,
}

impl StaticBearer {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl Authenticator for StaticBearer {
    fn authorize(&self, headers: &HeaderMap) -> bool {
        bearer_token(headers).is_some_and(|token| token == self.token)
    }
}

/// Verifies an RS256 JWT bearer token. `exp` is optional, but an expired
/// token is rejected.
pub struct JwtBearer {
    key: DecodingKey,
    validation: Validation,
}

impl JwtBearer {
    pub fn from_public_key_pem(pem: &str) -> Result<Self> {
        let key = DecodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| NodeError::Authentication(format!("Invalid JWT public key: {}", e)))?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = true;
        Ok(Self { key, validation })
    }
}

impl Authenticator for JwtBearer {
    fn authorize(&self, headers: &HeaderMap) -> bool {
        let Some(token) = bearer_token(headers) else {
            return false;
        };
        match jsonwebtoken::decode::<serde_json::Value>(token, &self.key, &self.validation) {
            Ok(_) => true,
            Err(e) => {
                warn!("JWT verification failed: {}", e);
                false
            }
        }
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Credentials issued to a node by the control plane, shipped as base64 JSON.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeyBundle {
    #[serde(default)]
    pub node_cert_pem: String,
    #[serde(default)]
    pub node_key_pem: String,
    #[serde(default)]
    pub ca_cert_pem: String,
    #[serde(default)]
    pub jwt_public_key: String,
}

impl SecretKeyBundle {
    pub fn parse(encoded: &str) -> Result<Self> {
        let encoded = encoded.trim().trim_matches(['"', '\'']);
        let decoded = STANDARD
            .decode(encoded)
            .map_err(|e| NodeError::Authentication(format!("secret key is not base64: {}", e)))?;
        let bundle: SecretKeyBundle = serde_json::from_slice(&decoded)
            .map_err(|e| NodeError::Authentication(format!("secret key is not JSON: {}", e)))?;

        Ok(Self {
            node_cert_pem: normalize_pem(&bundle.node_cert_pem),
            node_key_pem: normalize_pem(&bundle.node_key_pem),
            ca_cert_pem: normalize_pem(&bundle.ca_cert_pem),
            jwt_public_key: normalize_pem(&bundle.jwt_public_key),
        })
    }
}

/// Undo `\n` escaping and CRLF line ends.
pub fn normalize_pem(pem: &str) -> String {
    pem.replace("\\n", "\n")
        .replace("\r\n", "\n")
        .trim()
        .to_string()
}

/// Gate for `/node/*`, `/stats` and `/mappings`.
pub fn control_plane_gate(config: &NodeConfig) -> Result<Arc<dyn Authenticator>> {
    if config.no_auth {
        info!("Authentication disabled");
        return Ok(Arc::new(AllowAll));
    }

    let explicit = config
        .jwt_public_key
        .as_deref()
        .map(normalize_pem)
        .filter(|pem| !pem.is_empty());
    let public_key = match explicit {
        Some(pem) => Some(pem),
        None => match config.secret_key.as_deref() {
            Some(encoded) if !encoded.trim().is_empty() => {
                let bundle = SecretKeyBundle::parse(encoded)?;
                info!("Secret key bundle parsed");
                Some(bundle.jwt_public_key).filter(|pem| !pem.is_empty())
            }
            _ => None,
        },
    };

    match public_key {
        Some(pem) => {
            info!("Control-plane requests require an RS256 bearer token");
            Ok(Arc::new(JwtBearer::from_public_key_pem(&pem)?))
        }
        None => {
            warn!("No JWT public key configured, control-plane requests are not verified");
            Ok(Arc::new(AllowAll))
        }
    }
}

/// Gate for `/worker/*`.
pub fn worker_gate(config: &NodeConfig) -> Arc<dyn Authenticator> {
    match config.worker_token.as_deref() {
        Some(token) if !config.no_auth && !token.is_empty() => Arc::new(StaticBearer::new(token)),
        _ => Arc::new(AllowAll),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::json;

    pub(crate) const PUBLIC_KEY: &str = include_str!("../testdata/jwt_public.pem");
    const PRIVATE_KEY: &str = include_str!("../testdata/jwt_private.pem");

    pub(crate) fn sign(exp_offset_secs: i64) -> String {
        let exp = chrono::Utc::now().timestamp() + exp_offset_secs;
        let key = EncodingKey::from_rsa_pem(PRIVATE_KEY.as_bytes()).unwrap();
        jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &json!({"sub": "panel", "exp": exp}),
            &key,
        )
        .unwrap()
    }

    fn sign_without_exp() -> String {
        let key = EncodingKey::from_rsa_pem(PRIVATE_KEY.as_bytes()).unwrap();
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &json!({"sub": "panel"}), &key)
            .unwrap()
    }

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn bundle_with_key(pem: &str) -> String {
        let escaped = pem.replace('\n', "\\n");
        STANDARD.encode(
            json!({
                "nodeCertPem": "-----BEGIN CERTIFICATE-----\\nAAA\\n-----END CERTIFICATE-----",
                "nodeKeyPem": "",
                "caCertPem": "",
                "jwtPublicKey": escaped,
            })
            .to_string(),
        )
    }

    #[test]
    fn bearer_token_requires_the_scheme() {
        assert_eq!(bearer_token(&headers_with("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers_with("Basic abc")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn static_bearer_matches_exactly() {
        let gate = StaticBearer::new("secret");
        assert!(gate.authorize(&headers_with("Bearer secret")));
        assert!(!gate.authorize(&headers_with("Bearer secret2")));
        assert!(!gate.authorize(&HeaderMap::new()));
    }

    #[test]
    fn jwt_gate_accepts_valid_and_rejects_expired_tokens() {
        let gate = JwtBearer::from_public_key_pem(PUBLIC_KEY).unwrap();
        assert!(gate.authorize(&headers_with(&format!("Bearer {}", sign(600)))));
        assert!(!gate.authorize(&headers_with(&format!("Bearer {}", sign(-600)))));
        assert!(!gate.authorize(&headers_with("Bearer not.a.jwt")));
        assert!(!gate.authorize(&HeaderMap::new()));
    }

    #[test]
    fn jwt_gate_accepts_tokens_without_exp() {
        let gate = JwtBearer::from_public_key_pem(PUBLIC_KEY).unwrap();
        assert!(gate.authorize(&headers_with(&format!("Bearer {}", sign_without_exp()))));
    }

    #[test]
    fn secret_key_bundle_is_decoded_and_normalised() {
        let encoded = format!("\"{}\"", bundle_with_key(PUBLIC_KEY));
        let bundle = SecretKeyBundle::parse(&encoded).unwrap();

        assert_eq!(bundle.jwt_public_key, PUBLIC_KEY.trim());
        assert!(bundle.node_cert_pem.contains("\nAAA\n"));
        assert!(bundle.ca_cert_pem.is_empty());
    }

    #[test]
    fn malformed_secret_key_is_an_error() {
        assert!(SecretKeyBundle::parse("%%%").is_err());
        assert!(SecretKeyBundle::parse(&STANDARD.encode("not json")).is_err());
    }

    #[test]
    fn control_gate_uses_the_bundle_key() {
        let config = NodeConfig {
            secret_key: Some(bundle_with_key(PUBLIC_KEY)),
            ..NodeConfig::default()
        };
        let gate = control_plane_gate(&config).unwrap();
        assert!(!gate.authorize(&HeaderMap::new()));
        assert!(gate.authorize(&headers_with(&format!("Bearer {}", sign(60)))));
    }

    #[test]
    fn control_gate_is_open_without_a_key_or_with_no_auth() {
        let open = control_plane_gate(&NodeConfig::default()).unwrap();
        assert!(open.authorize(&HeaderMap::new()));

        let disabled = NodeConfig {
            no_auth: true,
            jwt_public_key: Some(PUBLIC_KEY.to_string()),
            ..NodeConfig::default()
        };
        assert!(control_plane_gate(&disabled).unwrap().authorize(&HeaderMap::new()));
    }

    #[test]
    fn worker_gate_follows_the_configured_token() {
        let config = NodeConfig {
            worker_token: Some("w".into()),
            ..NodeConfig::default()
        };
        let gate = worker_gate(&config);
        assert!(!gate.authorize(&HeaderMap::new()));
        assert!(gate.authorize(&headers_with("Bearer w")));

        assert!(worker_gate(&NodeConfig::default()).authorize(&HeaderMap::new()));
    }
}
