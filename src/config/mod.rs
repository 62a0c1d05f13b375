use std::env;

/// Runtime configuration for the returns service
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Root directory for stored media files (default: "./media")
    pub media_root: String,

    /// Maximum upload size per request in bytes (default: 50 MB)
    pub max_upload_size: usize,

    /// Access token lifetime in minutes (default: 30)
    pub access_token_minutes: i64,

    /// Refresh token lifetime in days (default: 7)
    pub refresh_token_days: i64,

    /// JWT Secret Key (Required in production)
    pub jwt_secret: String,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            media_root: "./media".to_string(),
            max_upload_size: 50 * 1024 * 1024, // 50 MB
            access_token_minutes: 30,
            refresh_token_days: 7,
            jwt_secret: "secret".to_string(),
            // More secure default: localhost only instead of wildcard
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(), // Vite default
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            media_root: env::var("MEDIA_ROOT").unwrap_or(default.media_root),

            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_upload_size),

            access_token_minutes: env::var("ACCESS_TOKEN_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.access_token_minutes),

            refresh_token_days: env::var("REFRESH_TOKEN_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.refresh_token_days),

            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| "secret".to_string()), // Fallback for dev convenience, strictly enforced in production method

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),
        }
    }

    /// Create config for development (relaxed limits, fixed secret)
    pub fn development() -> Self {
        Self {
            media_root: "./media".to_string(),
            max_upload_size: 200 * 1024 * 1024,
            access_token_minutes: 60,
            refresh_token_days: 30,
            jwt_secret: "secret".to_string(),
            // Development: localhost origins only
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(), // Vite default
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }

    /// Create config for production (strict security)
    pub fn production() -> Self {
        let default = Self::default();
        Self {
            media_root: env::var("MEDIA_ROOT").unwrap_or(default.media_root),
            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_upload_size),
            access_token_minutes: env::var("ACCESS_TOKEN_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.access_token_minutes),
            refresh_token_days: env::var("REFRESH_TOKEN_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.refresh_token_days),
            jwt_secret: env::var("JWT_SECRET").expect("CRITICAL: JWT_SECRET must be set"),
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.max_upload_size, 50 * 1024 * 1024);
        assert_eq!(config.access_token_minutes, 30);
        assert_eq!(config.refresh_token_days, 7);
        assert_eq!(config.media_root, "./media");
    }

    #[test]
    fn test_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.access_token_minutes, 60);
        assert_eq!(config.refresh_token_days, 30);
    }

    #[test]
    fn test_production_config() {
        unsafe { env::set_var("JWT_SECRET", "test_secret") };
        let config = AppConfig::production();
        unsafe { env::remove_var("JWT_SECRET") };
        assert_eq!(config.jwt_secret, "test_secret");
        assert_eq!(config.access_token_minutes, 30);
    }

    #[test]
    fn test_from_env_cors_fallback() {
        unsafe { env::remove_var("ALLOWED_ORIGINS") };
        let config = AppConfig::from_env();
        let default_config = AppConfig::default();
        assert_eq!(config.allowed_origins, default_config.allowed_origins);
        assert!(!config.allowed_origins.contains(&"*".to_string()));
    }
}
