use serde::Deserialize;

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Worker pool size (default: one thread per CPU)
    pub worker_threads: usize,

    /// io_uring submission queue depth (default: 256)
    pub ring_entries: u32,

    /// Server host (default: 127.0.0.1)
    pub server_host: String,

    /// Server port (default: 8080)
    pub server_port: u16,

    /// Environment: development, production, test
    pub environment: String,
}

impl Config {
    /// Load configuration from environment variables (with .env support).
    pub fn from_env() -> Self {
        // Load .env file if present (ignore errors if missing)
        let _ = dotenvy::dotenv();

        Config {
            worker_threads: std::env::var("RAVEL_WORKERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&n| n > 0)
                .unwrap_or_else(num_cpus::get),
            ring_entries: std::env::var("RAVEL_RING_ENTRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(256),
            server_host: std::env::var("RAVEL_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: std::env::var("RAVEL_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            environment: std::env::var("RAVEL_ENV").unwrap_or_else(|_| "development".to_string()),
        }
    }

    /// Check if running in development mode.
    pub fn is_dev(&self) -> bool {
        self.environment == "development"
    }

    /// Get the full server address.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker_threads: num_cpus::get(),
            ring_entries: 256,
            server_host: "127.0.0.1".to_string(),
            server_port: 8080,
            environment: "development".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let config = Config::default();
        assert!(config.worker_threads >= 1);
        assert_eq!(config.ring_entries, 256);
        assert_eq!(config.server_addr(), "127.0.0.1:8080");
        assert!(config.is_dev());
    }
}
