//! Server configuration and CLI argument parsing
//!
//! This module handles all server configuration through:
//! - Command-line arguments
//! - Environment variables (with PUSHRELAY_ prefix)
//!
//! # Configuration Priority
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables
//! 3. Default values (lowest priority)
//!
//! # Example Usage
//!
//! ```bash
//! # Using CLI arguments
//! pushrelay --http-port 9090 --decrement-policy strict
//!
//! # Using environment variables
//! export PUSHRELAY_HTTP_PORT=8080
//! export PUSHRELAY_UPSTREAM_URL=https://api.pushover.net/1/messages.json
//! pushrelay
//!
//! # Mixed (CLI overrides env)
//! export PUSHRELAY_HTTP_PORT=8080
//! pushrelay --http-port 9090  # Uses port 9090
//! ```

use anyhow::{Result, anyhow};
use clap::Parser;
use pushrelay::DecrementPolicy;
use std::time::Duration;

/// Largest accepted `--cache-capacity`
pub const MAX_CACHE_CAPACITY: usize = 10_000_000;

/// Main configuration structure for the server
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listener configuration
    pub http: HttpConfig,
    /// Remote notification API configuration
    pub upstream: UpstreamConfig,
    /// Limits cache configuration
    pub cache: CacheConfig,
    /// Logging level (error, warn, info, debug, trace)
    pub log_level: String,
}

/// HTTP transport configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

/// Remote notification API configuration
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Endpoint notifications are posted to
    pub url: String,
    /// Deadline for one remote call
    pub timeout: Duration,
}

/// Limits cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Expected number of accounts
    pub capacity: usize,
    /// What a retry does once an account's quota is spent
    pub policy: QuotaPolicy,
}

/// Behaviour of a retry once an account's cached quota reaches zero
///
/// - **Lenient**: accept the message anyway (202), the quota stays at zero
/// - **Strict**: refuse the message (403)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QuotaPolicy {
    Lenient,
    Strict,
}

impl std::str::FromStr for QuotaPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "lenient" => Ok(QuotaPolicy::Lenient),
            "strict" => Ok(QuotaPolicy::Strict),
            _ => Err(anyhow!(
                "Invalid decrement policy: {}. Valid options are: lenient, strict",
                s
            )),
        }
    }
}

impl From<QuotaPolicy> for DecrementPolicy {
    fn from(policy: QuotaPolicy) -> Self {
        match policy {
            QuotaPolicy::Lenient => DecrementPolicy::Lenient,
            QuotaPolicy::Strict => DecrementPolicy::Strict,
        }
    }
}

/// Command-line arguments for the server
///
/// All arguments can also be set via environment variables with the
/// PUSHRELAY_ prefix. CLI arguments take precedence over environment variables.
#[derive(Parser, Debug)]
#[command(
    name = "pushrelay",
    about = "Push notification relay",
    long_about = "Relays push notifications to the remote notification API and accepts them for a later retry when the API fails transiently, as long as the account has message quota left.\n\nEnvironment variables with PUSHRELAY_ prefix are supported. CLI arguments take precedence over environment variables."
)]
pub struct Args {
    // HTTP Transport
    #[arg(
        long,
        value_name = "HOST",
        help = "HTTP host",
        default_value = "127.0.0.1",
        env = "PUSHRELAY_HTTP_HOST"
    )]
    pub http_host: String,
    #[arg(
        long,
        value_name = "PORT",
        help = "HTTP port",
        default_value_t = 8499,
        env = "PUSHRELAY_HTTP_PORT"
    )]
    pub http_port: u16,

    // Upstream
    #[arg(
        long,
        value_name = "URL",
        help = "Remote notification API endpoint",
        default_value = "https://api.pushover.net/1/messages.json",
        env = "PUSHRELAY_UPSTREAM_URL"
    )]
    pub upstream_url: String,
    #[arg(
        long,
        value_name = "SECS",
        help = "Remote call timeout (seconds)",
        default_value_t = 10,
        env = "PUSHRELAY_UPSTREAM_TIMEOUT"
    )]
    pub upstream_timeout: u64,

    // Limits cache
    #[arg(
        long,
        value_name = "POLICY",
        help = "Retry policy for exhausted accounts: lenient, strict",
        default_value = "lenient",
        env = "PUSHRELAY_DECREMENT_POLICY"
    )]
    pub decrement_policy: QuotaPolicy,
    #[arg(
        long,
        value_name = "SIZE",
        help = "Expected number of accounts",
        default_value_t = 1_000,
        env = "PUSHRELAY_CACHE_CAPACITY"
    )]
    pub cache_capacity: usize,

    // General options
    #[arg(
        long,
        value_name = "LEVEL",
        help = "Log level: error, warn, info, debug, trace",
        default_value = "info",
        env = "PUSHRELAY_LOG_LEVEL"
    )]
    pub log_level: String,

    // Utility options
    #[arg(
        long,
        help = "List all environment variables and exit",
        action = clap::ArgAction::SetTrue
    )]
    pub list_env_vars: bool,
}

impl Config {
    /// Build configuration from environment variables and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration value is invalid.
    pub fn from_env_and_args() -> Result<Self> {
        // Clap handles the CLI > env > default precedence
        let args = Args::parse();

        if args.list_env_vars {
            Self::print_env_vars();
            std::process::exit(0);
        }

        let config = Self::from_args(args);
        config.validate()?;

        Ok(config)
    }

    fn from_args(args: Args) -> Self {
        Config {
            http: HttpConfig {
                host: args.http_host,
                port: args.http_port,
            },
            upstream: UpstreamConfig {
                url: args.upstream_url,
                timeout: Duration::from_secs(args.upstream_timeout),
            },
            cache: CacheConfig {
                capacity: args.cache_capacity,
                policy: args.decrement_policy,
            },
            log_level: args.log_level,
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The upstream URL is not an http(s) URL
    /// - The upstream timeout is zero
    /// - The cache capacity is zero or above [`MAX_CACHE_CAPACITY`]
    fn validate(&self) -> Result<()> {
        let url = self.upstream.url.as_str();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(anyhow!(
                "Invalid upstream URL: {}. Expected an http:// or https:// URL",
                url
            ));
        }

        if self.upstream.timeout.is_zero() {
            return Err(anyhow!("Upstream timeout must be at least 1 second"));
        }

        if self.cache.capacity == 0 {
            return Err(anyhow!("Cache capacity must be greater than 0"));
        }

        if self.cache.capacity > MAX_CACHE_CAPACITY {
            return Err(anyhow!(
                "Cache capacity {} is too large, the maximum is {}",
                self.cache.capacity,
                MAX_CACHE_CAPACITY
            ));
        }

        Ok(())
    }

    /// Print all available environment variables and their descriptions
    fn print_env_vars() {
        println!("pushrelay Environment Variables");
        println!("===============================");
        println!();
        println!("All environment variables use the PUSHRELAY_ prefix.");
        println!("CLI arguments take precedence over environment variables.");
        println!();

        println!("HTTP Configuration:");
        println!("  PUSHRELAY_HTTP_HOST=<host>            HTTP host [default: 127.0.0.1]");
        println!("  PUSHRELAY_HTTP_PORT=<port>            HTTP port [default: 8499]");
        println!();

        println!("Upstream Configuration:");
        println!(
            "  PUSHRELAY_UPSTREAM_URL=<url>          Remote API endpoint [default: https://api.pushover.net/1/messages.json]"
        );
        println!(
            "  PUSHRELAY_UPSTREAM_TIMEOUT=<secs>     Remote call timeout in seconds [default: 10]"
        );
        println!();

        println!("Limits Cache Configuration:");
        println!(
            "  PUSHRELAY_DECREMENT_POLICY=<policy>   Retry policy for exhausted accounts: lenient, strict [default: lenient]"
        );
        println!(
            "  PUSHRELAY_CACHE_CAPACITY=<size>       Expected number of accounts [default: 1000]"
        );
        println!();

        println!("General Configuration:");
        println!(
            "  PUSHRELAY_LOG_LEVEL=<level>           Log level: error, warn, info, debug, trace [default: info]"
        );
        println!();

        println!("Examples:");
        println!("  # Refuse retries once an account's quota is spent");
        println!("  export PUSHRELAY_DECREMENT_POLICY=strict");
        println!();
        println!("  # Run server (CLI args override env vars)");
        println!("  pushrelay --http-port 9090");
    }
}
