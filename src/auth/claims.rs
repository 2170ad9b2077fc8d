use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT payload issued after register, login and password reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub email: String,
    pub iss: String,    // issuer
    pub sub: String,    // user ID
    pub iat: usize,     // issued at (unix timestamp)
    pub nbf: usize,     // not before
    pub exp: usize,     // expires at
    pub jti: Uuid,      // unique per token
}
