use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use tracing::debug;

use shared_models::auth::{AuthDoctor, JwtClaims};

type HmacSha256 = Hmac<Sha256>;

/// Validate an HMAC-SHA256 JWT and return the authenticated doctor.
/// The subject claim carries the doctor id.
pub fn validate_token(token: &str, jwt_secret: &str) -> Result<AuthDoctor, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err("Invalid token format".to_string());
    }

    let header_b64 = parts[0];
    let claims_b64 = parts[1];
    let signature_b64 = parts[2];

    let signature = match URL_SAFE_NO_PAD.decode(signature_b64) {
        Ok(sig) => sig,
        Err(e) => {
            debug!("Failed to decode signature: {}", e);
            return Err("Invalid signature encoding".to_string());
        }
    };

    let signing_input = format!("{}.{}", header_b64, claims_b64);

    let mut mac = match HmacSha256::new_from_slice(jwt_secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return Err("Failed to create HMAC".to_string()),
    };
    mac.update(signing_input.as_bytes());

    if mac.verify_slice(&signature).is_err() {
        debug!("Token signature verification failed");
        return Err("Invalid token signature".to_string());
    }

    let claims_json = match URL_SAFE_NO_PAD.decode(claims_b64) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(json_str) => json_str,
            Err(_) => return Err("Invalid claims encoding".to_string()),
        },
        Err(_) => return Err("Invalid claims encoding".to_string()),
    };

    let claims: JwtClaims = match serde_json::from_str(&claims_json) {
        Ok(c) => c,
        Err(e) => {
            debug!("Failed to parse claims: {}", e);
            return Err("Invalid claims format".to_string());
        }
    };

    if let Some(exp) = claims.exp {
        let now = Utc::now().timestamp() as u64;
        if exp < now {
            debug!("Token expired at {} (now: {})", exp, now);
            return Err("Token expired".to_string());
        }
    }

    let doctor_id: i64 = claims
        .sub
        .parse()
        .map_err(|_| "Subject is not a doctor id".to_string())?;

    let doctor = AuthDoctor {
        id: doctor_id,
        name: claims.name,
    };

    debug!("Token validated successfully for doctor: {}", doctor.id);
    Ok(doctor)
}

/// Issue a signed token for a doctor. Used by operational tooling and tests;
/// credential verification happens before this is called.
pub fn issue_token(
    doctor_id: i64,
    name: &str,
    jwt_secret: &str,
    ttl_minutes: i64,
) -> Result<String, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let now = Utc::now();
    let header = json!({ "alg": "HS256", "typ": "JWT" });
    let claims = json!({
        "sub": doctor_id.to_string(),
        "name": name,
        "iat": now.timestamp() as u64,
        "exp": (now + Duration::minutes(ttl_minutes)).timestamp() as u64,
    });

    let header_b64 = URL_SAFE_NO_PAD.encode(header.to_string());
    let claims_b64 = URL_SAFE_NO_PAD.encode(claims.to_string());
    let signing_input = format!("{}.{}", header_b64, claims_b64);

    let mut mac = HmacSha256::new_from_slice(jwt_secret.as_bytes())
        .map_err(|_| "Failed to create HMAC".to_string())?;
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{}.{}", signing_input, signature))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-for-jwt-validation-must-be-long-enough";

    #[test]
    fn issued_token_round_trips() {
        let token = issue_token(42, "Dr. Collantes", SECRET, 60).unwrap();
        let doctor = validate_token(&token, SECRET).unwrap();
        assert_eq!(doctor.id, 42);
        assert_eq!(doctor.name.as_deref(), Some("Dr. Collantes"));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_token(42, "Dr. Collantes", SECRET, 60).unwrap();
        assert!(validate_token(&token, "other-secret").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = issue_token(42, "Dr. Collantes", SECRET, -5).unwrap();
        assert!(validate_token(&token, SECRET).is_err());
    }
}
