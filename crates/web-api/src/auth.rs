//! JWT 认证模块。
//!
//! 提供 token 生成、验证，以及从 HTTP 头提取用户身份。

use axum::http::HeaderMap;
use config::JwtConfig;
use domain::UserId;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    /// 过期时间（Unix 秒）
    pub exp: i64,
}

#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_ref());
        let decoding_key = DecodingKey::from_secret(config.secret.as_ref());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    pub fn generate_token(&self, user_id: UserId) -> Result<String, ApiError> {
        let exp = OffsetDateTime::now_utc() + Duration::hours(self.config.expiration_hours);
        let claims = Claims {
            user_id: Uuid::from(user_id),
            exp: exp.unix_timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|err| ApiError::unauthorized(format!("token generation failed: {err}")))
    }

    /// 验证 token，容忍 "Bearer " 前缀。
    pub fn verify_token(&self, token: &str) -> Result<UserId, ApiError> {
        let token = token.strip_prefix("Bearer ").unwrap_or(token);
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| UserId::from(data.claims.user_id))
            .map_err(|err| ApiError::unauthorized(format!("invalid token: {err}")))
    }

    pub fn extract_user_from_headers(&self, headers: &HeaderMap) -> Result<UserId, ApiError> {
        let auth_header = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|header| header.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("missing authorization header"))?;

        self.verify_token(auth_header)
    }
}
