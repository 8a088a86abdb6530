//! JWT token handling
//!
//! Issues access and refresh tokens and turns inbound tokens into a
//! `TokenValidation` outcome instead of an error: expired tokens still expose
//! the claims needed for refresh flows, and only the reason string tells the
//! caller why a token was rejected.

use crate::config::JwtConfig;
use crate::domain::{StringUuid, TenantAccess, TenantRoleAccess};
use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Rejection reasons surfaced to clients, in Portuguese like the rest of the
/// user-facing auth messages.
pub const REASON_TOKEN_MISSING: &str = "Token não fornecido";
pub const REASON_TOKEN_EXPIRED: &str = "Token expirado";
pub const REASON_TOKEN_MALFORMED: &str = "Token malformado";
pub const REASON_INVALID_SIGNATURE: &str = "Assinatura do token inválida";
pub const REASON_UNSUPPORTED_ALGORITHM: &str = "Algoritmo do token não suportado";
pub const REASON_TOKEN_INVALID: &str = "Token inválido";

/// Access token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Session ID (for session management)
    #[serde(rename = "sessionId")]
    pub session_id: String,
    /// Token type discriminator (prevents token confusion attacks)
    #[serde(rename = "type")]
    pub token_type: String,
    /// Global role names
    #[serde(default)]
    pub roles: Vec<String>,
    /// Global permission names (`action:resource`)
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Current tenant context, absent when the session is tenant-less
    #[serde(rename = "tenantId", skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Per-tenant access map, absent when the user has no tenant access
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenants: Option<Vec<TenantAccessClaim>>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// Refresh token claims, deliberately minimal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    /// Token type discriminator (prevents token confusion attacks)
    #[serde(rename = "type")]
    pub token_type: String,
    pub iat: i64,
    pub exp: i64,
}

/// One entry of the `tenants` claim. Ids are strings on the wire and optional
/// on decode, so a partially filled entry parses instead of failing the whole
/// token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantAccessClaim {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landlord_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landlord_name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl From<&TenantAccess> for TenantAccessClaim {
    fn from(access: &TenantAccess) -> Self {
        Self {
            tenant_id: Some(access.tenant_id.to_string()),
            tenant_name: Some(access.tenant_name.clone()),
            landlord_id: Some(access.landlord_id.to_string()),
            landlord_name: Some(access.landlord_name.clone()),
            roles: access.role_names(),
            permissions: access.permission_names(),
        }
    }
}

impl TenantAccessClaim {
    /// Rebuild the structured projection. Entries whose tenant or landlord id
    /// is missing or not a UUID are dropped, never an error.
    fn into_tenant_access(self) -> Option<TenantAccess> {
        let tenant_id = StringUuid::parse_str(self.tenant_id.as_deref()?).ok()?;
        let landlord_id = StringUuid::parse_str(self.landlord_id.as_deref()?).ok()?;

        let permissions = self.permissions;
        let roles = self
            .roles
            .into_iter()
            .map(|role_name| TenantRoleAccess {
                role_name,
                permissions: permissions.clone(),
            })
            .collect();

        Some(TenantAccess {
            tenant_id,
            tenant_name: self.tenant_name.unwrap_or_default(),
            landlord_id,
            landlord_name: self.landlord_name.unwrap_or_default(),
            roles,
        })
    }
}

/// Outcome of `validate_token`. Never an error: `valid` plus `reason` encode
/// the token state, and the claim fields hold whatever could be recovered.
#[derive(Debug, Clone, Default)]
pub struct TokenValidation {
    pub valid: bool,
    pub reason: Option<String>,
    pub user_id: Option<StringUuid>,
    pub session_id: Option<StringUuid>,
    pub tenant_id: Option<StringUuid>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub tenant_access: Vec<TenantAccess>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenValidation {
    fn rejected(reason: &str) -> Self {
        Self {
            valid: false,
            reason: Some(reason.to_string()),
            ..Default::default()
        }
    }
}

/// Best-effort claim extraction, signature optional.
#[derive(Debug, Clone)]
pub struct TokenInfo {
    pub user_id: Option<StringUuid>,
    pub session_id: Option<StringUuid>,
    pub token_type: String,
    pub tenant_id: Option<StringUuid>,
    pub expires_at: Option<DateTime<Utc>>,
    pub tenant_access: Vec<TenantAccess>,
}

impl From<AccessClaims> for TokenInfo {
    fn from(claims: AccessClaims) -> Self {
        Self {
            user_id: StringUuid::parse_str(&claims.sub).ok(),
            session_id: StringUuid::parse_str(&claims.session_id).ok(),
            token_type: claims.token_type,
            tenant_id: claims
                .tenant_id
                .as_deref()
                .and_then(|id| StringUuid::parse_str(id).ok()),
            expires_at: DateTime::from_timestamp(claims.exp, 0),
            tenant_access: decode_tenant_entries(claims.tenants),
        }
    }
}

fn decode_tenant_entries(tenants: Option<Vec<TenantAccessClaim>>) -> Vec<TenantAccess> {
    tenants
        .unwrap_or_default()
        .into_iter()
        .filter_map(TenantAccessClaim::into_tenant_access)
        .collect()
}

/// JWT token manager
#[derive(Clone)]
pub struct JwtManager {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
}

impl JwtManager {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        Self {
            config,
            encoding_key,
            decoding_key,
            algorithm: Algorithm::HS256,
        }
    }

    /// Create a Validation with a strict leeway (5 seconds) instead of the default 60 seconds.
    /// This ensures tokens expire promptly while still tolerating minor clock skew.
    fn strict_validation(&self) -> Validation {
        let mut v = Validation::new(self.algorithm);
        v.leeway = 5;
        v
    }

    /// Create an access token carrying the user's global roles/permissions and
    /// the per-tenant access map. The `tenants` claim is written only when
    /// `tenant_access` is non-empty.
    pub fn generate_access_token(
        &self,
        user_id: StringUuid,
        session_id: StringUuid,
        tenant_id: Option<StringUuid>,
        roles: Vec<String>,
        permissions: Vec<String>,
        tenant_access: &[TenantAccess],
    ) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::hours(self.config.access_token_validity_hours);

        let tenants = if tenant_access.is_empty() {
            None
        } else {
            Some(tenant_access.iter().map(TenantAccessClaim::from).collect())
        };

        let claims = AccessClaims {
            sub: user_id.to_string(),
            session_id: session_id.to_string(),
            token_type: "access".to_string(),
            roles,
            permissions,
            tenant_id: tenant_id.map(|id| id.to_string()),
            tenants,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };
        let header = Header::new(self.algorithm);
        Ok(encode(&header, &claims, &self.encoding_key)?)
    }

    /// Create a refresh token: subject, session and type only.
    pub fn generate_refresh_token(
        &self,
        user_id: StringUuid,
        session_id: StringUuid,
    ) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::days(self.config.refresh_token_validity_days);

        let claims = RefreshClaims {
            sub: user_id.to_string(),
            session_id: session_id.to_string(),
            token_type: "refresh".to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };
        let header = Header::new(self.algorithm);
        Ok(encode(&header, &claims, &self.encoding_key)?)
    }

    /// Verify a token and classify the outcome. Signature and expiry failures
    /// never surface as errors; they select the reason string. An expired
    /// token with a good signature still yields its user, session, expiry and
    /// tenant access claims for refresh flows.
    pub fn validate_token(&self, token: &str) -> TokenValidation {
        if token.trim().is_empty() {
            return TokenValidation::rejected(REASON_TOKEN_MISSING);
        }

        match decode::<AccessClaims>(token, &self.decoding_key, &self.strict_validation()) {
            Ok(data) => {
                let claims = data.claims;
                TokenValidation {
                    valid: true,
                    reason: None,
                    user_id: StringUuid::parse_str(&claims.sub).ok(),
                    session_id: StringUuid::parse_str(&claims.session_id).ok(),
                    tenant_id: claims
                        .tenant_id
                        .as_deref()
                        .and_then(|id| StringUuid::parse_str(id).ok()),
                    roles: claims.roles,
                    permissions: claims.permissions,
                    tenant_access: decode_tenant_entries(claims.tenants),
                    expires_at: DateTime::from_timestamp(claims.exp, 0),
                }
            }
            Err(err) => match err.kind() {
                ErrorKind::ExpiredSignature => {
                    let mut result = TokenValidation::rejected(REASON_TOKEN_EXPIRED);
                    if let Some(claims) = self.recover_expired_claims(token) {
                        result.user_id = StringUuid::parse_str(&claims.sub).ok();
                        result.session_id = StringUuid::parse_str(&claims.session_id).ok();
                        result.expires_at = DateTime::from_timestamp(claims.exp, 0);
                        result.tenant_access = decode_tenant_entries(claims.tenants);
                    }
                    result
                }
                ErrorKind::InvalidSignature => {
                    TokenValidation::rejected(REASON_INVALID_SIGNATURE)
                }
                ErrorKind::InvalidAlgorithm
                | ErrorKind::InvalidAlgorithmName
                | ErrorKind::MissingAlgorithm => {
                    TokenValidation::rejected(REASON_UNSUPPORTED_ALGORITHM)
                }
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_) => TokenValidation::rejected(REASON_TOKEN_MALFORMED),
                _ => TokenValidation::rejected(REASON_TOKEN_INVALID),
            },
        }
    }

    /// Best-effort claim extraction for tokens the caller already suspects are
    /// expired or foreign: first a verified decode that ignores expiry, then a
    /// parse without signature verification. None only when even the
    /// unverified parse fails.
    pub fn extract_token_info(&self, token: &str) -> Option<TokenInfo> {
        if token.trim().is_empty() {
            return None;
        }

        self.recover_expired_claims(token)
            .or_else(|| self.decode_unverified(token))
            .map(TokenInfo::from)
    }

    /// True when the token expires within `minutes_threshold`, or when its
    /// expiry cannot be determined at all (fail toward re-authentication).
    pub fn is_token_near_expiry(&self, token: &str, minutes_threshold: i64) -> bool {
        match self.extract_token_info(token) {
            Some(TokenInfo {
                expires_at: Some(expires_at),
                ..
            }) => expires_at - Utc::now() <= Duration::minutes(minutes_threshold),
            _ => true,
        }
    }

    /// Decode with the signature verified but expiry ignored. Any failure is
    /// swallowed; this path exists to salvage claims, not to judge the token.
    fn recover_expired_claims(&self, token: &str) -> Option<AccessClaims> {
        let mut validation = self.strict_validation();
        validation.validate_exp = false;

        decode::<AccessClaims>(token, &self.decoding_key, &validation)
            .ok()
            .map(|data| data.claims)
    }

    /// Parse the payload without verifying the signature.
    fn decode_unverified(&self, token: &str) -> Option<AccessClaims> {
        let mut validation = Validation::new(self.algorithm);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;

        decode::<AccessClaims>(token, &DecodingKey::from_secret(&[]), &validation)
            .ok()
            .map(|data| data.claims)
    }
}
