use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Doctor id, stringified.
    pub sub: String,
    pub name: Option<String>,
    pub exp: Option<u64>,
    pub iat: Option<u64>,
}

/// The authenticated doctor performing the request. Inserted into request
/// extensions by the auth middleware; every mutating handler takes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthDoctor {
    pub id: i64,
    pub name: Option<String>,
}
