use std::time::Duration;

use jsonwebtoken::{encode, EncodingKey, Header};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{auth::claims::Claims, config::JwtConfig};

/// Signs HS256 bearer tokens with the process signing secret.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    #[cfg(test)]
    decoding: jsonwebtoken::DecodingKey,
    issuer: String,
    ttl: Duration,
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            #[cfg(test)]
            decoding: jsonwebtoken::DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            ttl: Duration::from_secs((cfg.ttl_minutes.max(0) as u64) * 60),
        }
    }

    pub fn generate_token(&self, user_id: Uuid, email: &str) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            user_id,
            email: email.to_string(),
            iss: self.issuer.clone(),
            sub: user_id.to_string(),
            iat: now.unix_timestamp() as usize,
            nbf: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            jti: Uuid::new_v4(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "jwt signed");
        Ok(token)
    }

    #[cfg(test)]
    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = jsonwebtoken::Validation::default();
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.validate_nbf = true;
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}
