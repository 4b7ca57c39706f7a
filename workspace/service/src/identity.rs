//! Identity collaborator: credential checks, bearer tokens and password hashing.
//!
//! Service code depends on the [`IdentityProvider`] trait only. The default
//! implementation signs HS256 JWTs and stores Argon2id password hashes.

use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::{Argon2, Params, Version};
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use model::entities::user;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, instrument, warn};

use crate::authorization::Identity;
use crate::error::{Result, ServiceError};
use crate::validation::normalize_email;

const NO_ACTIVE_ACCOUNT: &str = "No active account found with the given credentials";
const INVALID_TOKEN: &str = "Given token not valid for any token type";

/// Email/password pair submitted to obtain tokens.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessToken {
    pub access: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    user_id: i32,
    token_type: TokenType,
    iat: i64,
    exp: i64,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Check credentials and return the matching active user.
    async fn authenticate(&self, db: &DatabaseConnection, credentials: &Credentials) -> Result<Identity>;

    /// Issue a fresh access/refresh pair.
    fn issue_token(&self, identity: &Identity) -> Result<TokenPair>;

    /// Trade a refresh token for a new access token.
    async fn refresh_token(&self, db: &DatabaseConnection, refresh: &str) -> Result<AccessToken>;

    /// Resolve an access token to the user it was issued for.
    async fn resolve(&self, db: &DatabaseConnection, access: &str) -> Result<Identity>;

    /// Hash a raw password for storage.
    fn hash_password(&self, raw: &str) -> Result<String>;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub jwt_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    /// Argon2 memory cost in KiB
    pub hash_memory_kib: u32,
    pub hash_iterations: u32,
    pub hash_parallelism: u32,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "change-me".to_string(),
            access_token_ttl_secs: 5 * 60,
            refresh_token_ttl_secs: 24 * 60 * 60,
            hash_memory_kib: Params::DEFAULT_M_COST,
            hash_iterations: Params::DEFAULT_T_COST,
            hash_parallelism: Params::DEFAULT_P_COST,
        }
    }
}

/// HS256 JWT tokens with Argon2id password hashes.
pub struct JwtIdentityProvider {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: TimeDelta,
    refresh_ttl: TimeDelta,
    hasher: Argon2<'static>,
}

impl fmt::Debug for JwtIdentityProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtIdentityProvider")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl JwtIdentityProvider {
    pub fn new(config: &IdentityConfig) -> Result<Self> {
        let params = Params::new(
            config.hash_memory_kib,
            config.hash_iterations,
            config.hash_parallelism,
            None,
        )
        .map_err(|e| ServiceError::Internal(format!("Invalid password hashing parameters: {}", e)))?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            access_ttl: TimeDelta::seconds(config.access_token_ttl_secs),
            refresh_ttl: TimeDelta::seconds(config.refresh_token_ttl_secs),
            hasher: Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    fn sign(&self, user_id: i32, token_type: TokenType) -> Result<String> {
        let now = Utc::now();
        let ttl = match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            user_id,
            token_type,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| ServiceError::Internal(format!("Failed to sign token: {}", e)))
    }

    fn verify(&self, token: &str, expected: TokenType) -> Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            debug!("Token rejected: {}", e);
            ServiceError::AuthenticationFailed(INVALID_TOKEN.to_string())
        })?;
        if data.claims.token_type != expected {
            debug!(?expected, actual = ?data.claims.token_type, "Token has the wrong type");
            return Err(ServiceError::AuthenticationFailed(INVALID_TOKEN.to_string()));
        }
        Ok(data.claims)
    }

    fn verify_password(&self, raw: &str, stored_hash: &str) -> bool {
        match PasswordHash::new(stored_hash) {
            Ok(parsed) => self.hasher.verify_password(raw.as_bytes(), &parsed).is_ok(),
            Err(e) => {
                warn!("Stored password hash could not be parsed: {}", e);
                false
            }
        }
    }

    async fn active_user(db: &DatabaseConnection, user_id: i32) -> Result<user::Model> {
        match user::Entity::find_by_id(user_id).one(db).await? {
            Some(user) if user.is_active => Ok(user),
            Some(_) => Err(ServiceError::AuthenticationFailed("User is inactive".to_string())),
            None => Err(ServiceError::AuthenticationFailed("User not found".to_string())),
        }
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    #[instrument(skip(self, db, credentials), fields(email = %credentials.email))]
    async fn authenticate(&self, db: &DatabaseConnection, credentials: &Credentials) -> Result<Identity> {
        let email = normalize_email(&credentials.email);
        let user = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(db)
            .await?
            .filter(|user| user.is_active)
            .ok_or_else(|| ServiceError::AuthenticationFailed(NO_ACTIVE_ACCOUNT.to_string()))?;

        if !self.verify_password(&credentials.password, &user.password_hash) {
            warn!(user_id = user.id, "Password mismatch");
            return Err(ServiceError::AuthenticationFailed(NO_ACTIVE_ACCOUNT.to_string()));
        }

        let mut active: user::ActiveModel = user.into();
        active.last_login = Set(Some(Utc::now()));
        let user = active.update(db).await?;

        info!(user_id = user.id, "User authenticated");
        Ok(user.into())
    }

    fn issue_token(&self, identity: &Identity) -> Result<TokenPair> {
        Ok(TokenPair {
            access: self.sign(identity.id, TokenType::Access)?,
            refresh: self.sign(identity.id, TokenType::Refresh)?,
        })
    }

    #[instrument(skip(self, db, refresh))]
    async fn refresh_token(&self, db: &DatabaseConnection, refresh: &str) -> Result<AccessToken> {
        let claims = self.verify(refresh, TokenType::Refresh)?;
        let user = Self::active_user(db, claims.user_id).await?;
        Ok(AccessToken {
            access: self.sign(user.id, TokenType::Access)?,
        })
    }

    #[instrument(skip(self, db, access))]
    async fn resolve(&self, db: &DatabaseConnection, access: &str) -> Result<Identity> {
        let claims = self.verify(access, TokenType::Access)?;
        let user = Self::active_user(db, claims.user_id).await?;
        Ok(user.into())
    }

    fn hash_password(&self, raw: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.hasher
            .hash_password(raw.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ServiceError::Internal(format!("Failed to hash password: {}", e)))
    }
}
