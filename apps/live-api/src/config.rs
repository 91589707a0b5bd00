/// Which session store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

/// Live API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string. Unset only with `STORE=memory`.
    pub database_url: Option<String>,
    /// Streaming gateway origin (e.g. `http://localhost:4011`).
    pub stream_api_url: String,
    /// Shared secret sent in the `x-gateway-key` header.
    pub gateway_secret: String,
    pub store: StoreKind,
    /// Port the HTTP server binds to.
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Panics with a descriptive message if a required variable is missing.
    pub fn from_env() -> Self {
        let store = match std::env::var("STORE").ok().as_deref() {
            Some("memory") => StoreKind::Memory,
            None | Some("") | Some("postgres") => StoreKind::Postgres,
            Some(other) => panic!("STORE must be `postgres` or `memory`, got `{other}`"),
        };

        let database_url = match store {
            StoreKind::Postgres => Some(required_var("DATABASE_URL")),
            StoreKind::Memory => std::env::var("DATABASE_URL").ok(),
        };

        Self {
            database_url,
            stream_api_url: required_var("STREAM_API_URL"),
            gateway_secret: required_var("GATEWAY_SECRET"),
            store,
            port: match std::env::var("PORT") {
                Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
                    tracing::warn!(value = %raw, "PORT is not a port number, using 4010");
                    4010
                }),
                Err(_) => 4010,
            },
        }
    }
}

fn required_var(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} env var is required"))
}
