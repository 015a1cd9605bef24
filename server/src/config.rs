//! Environment-derived configuration, grounded in `ferrex`'s `Config::from_env`
//! shape but loaded via `dotenvy` (the lighter of the two `.env` crates the
//! pack uses) rather than a generic config-file layer — this service has no
//! config file, only environment variables.

use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub public_base_url: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            database_url: env::var("DATABASE_URL").ok(),
            redis_url: env::var("REDIS_URL").ok(),
            public_base_url: env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| "http://localhost:8080".to_string()),
        })
    }

    pub fn uses_postgres(&self) -> bool {
        self.database_url.is_some()
    }

    pub fn uses_redis(&self) -> bool {
        self.redis_url.is_some()
    }
}
