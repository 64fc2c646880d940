use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::warn;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";

/// Which persistence backend the booking engine runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Supabase,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => Ok(StoreBackend::Memory),
            "supabase" | "postgrest" => Ok(StoreBackend::Supabase),
            other => Err(format!("unknown store backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub supabase_jwt_secret: String,
    pub store_backend: StoreBackend,
    pub bind_address: SocketAddr,
    pub patient_seed_file: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            store_backend: env::var("BOOKING_STORE")
                .ok()
                .and_then(|raw| match raw.parse::<StoreBackend>() {
                    Ok(backend) => Some(backend),
                    Err(e) => {
                        warn!("{}, falling back to in-memory store", e);
                        None
                    }
                })
                .unwrap_or(StoreBackend::Memory),
            bind_address: env::var("BIND_ADDRESS")
                .ok()
                .and_then(|raw| match raw.parse::<SocketAddr>() {
                    Ok(addr) => Some(addr),
                    Err(e) => {
                        warn!("BIND_ADDRESS '{}' is invalid ({}), using default", raw, e);
                        None
                    }
                })
                .unwrap_or_else(default_bind_address),
            patient_seed_file: env::var("PATIENT_SEED_FILE").ok().map(PathBuf::from),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    /// JWT validation needs the secret regardless of backend; the Supabase
    /// backend additionally needs the project URL and a key.
    pub fn is_configured(&self) -> bool {
        if self.supabase_jwt_secret.is_empty() {
            return false;
        }

        match self.store_backend {
            StoreBackend::Memory => true,
            StoreBackend::Supabase => {
                !self.supabase_url.is_empty()
                    && (!self.supabase_service_role_key.is_empty() || !self.supabase_anon_key.is_empty())
            }
        }
    }

    /// Key sent as the bearer token for server-side PostgREST calls.
    pub fn supabase_server_key(&self) -> &str {
        if self.supabase_service_role_key.is_empty() {
            &self.supabase_anon_key
        } else {
            &self.supabase_service_role_key
        }
    }
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}
