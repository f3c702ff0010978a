use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub bind_address: String,
    pub token_ttl_minutes: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            jwt_secret: env::var("CLINIC_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("CLINIC_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            bind_address: env::var("CLINIC_BIND_ADDRESS")
                .unwrap_or_else(|_| {
                    warn!("CLINIC_BIND_ADDRESS not set, using default");
                    "0.0.0.0:3000".to_string()
                }),
            token_ttl_minutes: env::var("CLINIC_TOKEN_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(|| {
                    warn!("CLINIC_TOKEN_TTL_MINUTES not set, using default");
                    12 * 60
                }),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.jwt_secret.is_empty()
    }
}
