use serde::{Deserialize, Serialize};

/// JWT payload carried by every bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub iss: String,   // issuer
    pub aud: String,   // audience
    pub sub: String,   // subject
    pub iat: i64,      // issued at (unix timestamp)
    pub exp: i64,      // expires at (unix timestamp)
    pub uid: i64,      // user ID
    pub email: String, // user email at issuance
    pub role: i64,     // role ID at issuance
}
