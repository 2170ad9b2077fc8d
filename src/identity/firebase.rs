use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{IdentityClaims, IdentityVerifier};

const JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";
const DEFAULT_KEY_MAX_AGE: Duration = Duration::from_secs(60 * 60);

struct CachedKeys {
    set: JwkSet,
    fetched_at: Instant,
    max_age: Duration,
}

impl CachedKeys {
    fn is_fresh(&self) -> bool {
        self.fetched_at.elapsed() < self.max_age
    }
}

/// Verifies Firebase Auth ID tokens against Google's published signing keys.
pub struct FirebaseVerifier {
    project_id: String,
    http: reqwest::Client,
    keys: RwLock<Option<CachedKeys>>,
}

impl FirebaseVerifier {
    pub fn new(project_id: impl Into<String>) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("build http client")?;
        Ok(Self {
            project_id: project_id.into(),
            http,
            keys: RwLock::new(None),
        })
    }

    fn issuer(&self) -> String {
        format!("https://securetoken.google.com/{}", self.project_id)
    }

    async fn signing_keys(&self) -> anyhow::Result<JwkSet> {
        if let Some(cached) = self.keys.read().await.as_ref() {
            if cached.is_fresh() {
                return Ok(cached.set.clone());
            }
        }

        let mut guard = self.keys.write().await;
        if let Some(cached) = guard.as_ref() {
            if cached.is_fresh() {
                return Ok(cached.set.clone());
            }
        }

        let resp = self
            .http
            .get(JWKS_URL)
            .send()
            .await
            .context("fetch firebase signing keys")?
            .error_for_status()
            .context("firebase signing keys endpoint")?;
        let max_age = resp
            .headers()
            .get(reqwest::header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_max_age)
            .unwrap_or(DEFAULT_KEY_MAX_AGE);
        let set: JwkSet = resp.json().await.context("parse firebase jwks")?;
        debug!(keys = set.keys.len(), max_age_secs = max_age.as_secs(), "firebase keys refreshed");

        *guard = Some(CachedKeys {
            set: set.clone(),
            fetched_at: Instant::now(),
            max_age,
        });
        Ok(set)
    }
}

#[async_trait]
impl IdentityVerifier for FirebaseVerifier {
    async fn verify(&self, token: &str) -> anyhow::Result<IdentityClaims> {
        let header = decode_header(token).context("decode token header")?;
        if header.alg != Algorithm::RS256 {
            return Err(anyhow!("unexpected token algorithm {:?}", header.alg));
        }
        let kid = header.kid.ok_or_else(|| anyhow!("token has no key id"))?;

        let keys = self.signing_keys().await?;
        let jwk = keys
            .find(&kid)
            .ok_or_else(|| anyhow!("unknown signing key {kid}"))?;
        let key = DecodingKey::from_jwk(jwk).context("load signing key")?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.project_id.as_str()]);
        validation.set_issuer(&[self.issuer()]);
        let data = decode::<Map<String, Value>>(token, &key, &validation).map_err(|e| {
            warn!(error = %e, "firebase token rejected");
            anyhow!(e)
        })?;

        claims_from_map(data.claims)
    }
}

fn claims_from_map(claims: Map<String, Value>) -> anyhow::Result<IdentityClaims> {
    let uid = claims
        .get("sub")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("token subject is empty"))?
        .to_string();
    let text = |key: &str| claims.get(key).and_then(Value::as_str).map(str::to_string);
    let email = text("email");
    let name = text("name");
    Ok(IdentityClaims {
        uid,
        email,
        name,
        claims,
    })
}

fn parse_max_age(cache_control: &str) -> Option<Duration> {
    cache_control
        .split(',')
        .filter_map(|part| part.trim().strip_prefix("max-age="))
        .find_map(|secs| secs.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
