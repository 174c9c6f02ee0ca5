//! Application configuration loaded from environment variables and config files.
//!
//! Supports `.env` files for development and environment variables for production.
//! Config precedence: env vars > .env file > config file > defaults
//!
//! The configuration is loaded once by the binary and handed to whoever needs it.
//! There is no global accessor: the token secret only reaches the
//! code that is given it.

use config::{builder::DefaultState, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use crate::policy::{Access, RoutePolicy};
use crate::token::{MAX_TTL_SECS, MIN_SECRET_LEN};

/// Default config file name, looked up in the working directory (any extension `config` knows).
pub const DEFAULT_CONFIG_FILE: &str = "gatehouse";

/// Load configuration from defaults, an optional config file, and the environment.
///
/// `path` overrides the default config file; when given, the file must exist.
pub fn load(path: Option<&str>) -> Result<AppConfig, ConfigError> {
    // Load .env file if present (development)
    let _ = dotenvy::dotenv();

    finish(layered(path, environment())?)
}

/// Environment variables (GATEHOUSE__AUTH__TOKEN_SECRET, GATEHOUSE__SERVER__PORT, etc.)
fn environment() -> Environment {
    Environment::with_prefix("GATEHOUSE")
        .separator("__")
        .try_parsing(true)
}

/// Defaults, then the config file, then `env`. Later sources win.
fn layered(
    path: Option<&str>,
    env: Environment,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let file = match path {
        Some(path) => File::with_name(path).required(true),
        None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    Ok(defaults()?.add_source(file).add_source(env))
}

/// Load configuration from defaults plus a TOML document. No environment lookup.
pub fn from_toml_str(toml: &str) -> Result<AppConfig, ConfigError> {
    finish(defaults()?.add_source(File::from_str(toml, FileFormat::Toml)))
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    config::Config::builder()
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8080)?
        .set_default("server.public_dir", "./public")?
        .set_default("auth.token_ttl_secs", 3600)? // 1 hour
        .set_default("federation.mode", "disabled")?
        .set_default("federation.subject_header", "x-forwarded-user")?
        .set_default("federation.name_header", "x-forwarded-preferred-username")?
        .set_default("federation.email_header", "x-forwarded-email")?
        .set_default("federation.login_url", "/oauth2/start?rd=/login/complete")
}

fn finish(builder: ConfigBuilder<DefaultState>) -> Result<AppConfig, ConfigError> {
    let app_config: AppConfig = builder.build()?.try_deserialize()?;
    app_config.validate()?;
    Ok(app_config)
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub federation: FederationConfig,
    #[serde(default = "default_route_rules")]
    pub routes: Vec<RouteRuleConfig>,
}

impl AppConfig {
    /// Reject configurations that would start an insecure or broken server.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.token_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Message(format!(
                "auth.token_secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }
        if self.auth.token_ttl_secs == 0 || self.auth.token_ttl_secs > MAX_TTL_SECS {
            return Err(ConfigError::Message(format!(
                "auth.token_ttl_secs must be between 1 and {MAX_TTL_SECS} seconds"
            )));
        }
        RoutePolicy::from_config(&self.routes).map_err(|e| ConfigError::Message(e.to_string()))?;
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory served under `/public`.
    pub public_dir: String,
}

#[derive(Deserialize, Clone)]
pub struct AuthConfig {
    /// HS256 signing secret, at least 32 bytes. Must come from the environment or a
    /// config file; there is no default.
    pub token_secret: String,
    /// Token lifetime in seconds
    pub token_ttl_secs: u64,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token_secret", &"<redacted>")
            .field("token_ttl_secs", &self.token_ttl_secs)
            .finish()
    }
}

/// How the identity established by the delegated login reaches Gatehouse.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FederationMode {
    /// No federated sessions; only bearer tokens authenticate.
    Disabled,
    /// An authenticating reverse proxy forwards the verified identity in headers.
    ForwardedHeaders,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FederationConfig {
    pub mode: FederationMode,
    pub subject_header: String,
    pub name_header: String,
    pub email_header: String,
    /// Where `GET /login` sends the browser to start the provider handshake.
    pub login_url: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RouteRuleConfig {
    pub pattern: String,
    pub access: Access,
}

impl RouteRuleConfig {
    fn public(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_owned(),
            access: Access::Public,
        }
    }
}

/// Root, static assets, health, and every path the login flow passes through.
pub fn default_route_rules() -> Vec<RouteRuleConfig> {
    [
        "/",
        "/health",
        "/public/**",
        "/login",
        "/login/**",
        "/oauth2/**",
        "/api/v1/auth/**",
    ]
    .into_iter()
    .map(RouteRuleConfig::public)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET_TOML: &str = r#"
        [auth]
        token_secret = "0123456789abcdef0123456789abcdef"
    "#;

    #[test]
    fn defaults_fill_everything_but_the_secret() {
        let cfg = from_toml_str(SECRET_TOML).unwrap();

        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.auth.token_ttl_secs, 3600);
        assert_eq!(cfg.federation.mode, FederationMode::Disabled);
        assert_eq!(cfg.federation.subject_header, "x-forwarded-user");
        assert_eq!(cfg.routes, default_route_rules());
    }

    #[test]
    fn missing_secret_fails() {
        assert!(from_toml_str("").is_err());
    }

    #[test]
    fn short_secret_fails() {
        let err = from_toml_str("[auth]\ntoken_secret = \"hunter2\"").unwrap_err();
        assert!(err.to_string().contains("at least 32 bytes"));
    }

    #[test]
    fn route_table_and_federation_mode_are_configurable() {
        let cfg = from_toml_str(&format!(
            r#"{SECRET_TOML}
            [federation]
            mode = "forwarded_headers"

            [[routes]]
            pattern = "/status"
            access = "public"

            [[routes]]
            pattern = "/**"
            access = "authenticated"
            "#
        ))
        .unwrap();

        assert_eq!(cfg.federation.mode, FederationMode::ForwardedHeaders);
        assert_eq!(cfg.routes.len(), 2);
        assert_eq!(cfg.routes[0], RouteRuleConfig::public("/status"));
        assert_eq!(cfg.routes[1].access, Access::Authenticated);
    }

    #[test]
    fn invalid_route_pattern_fails() {
        let toml = format!("{SECRET_TOML}\n[[routes]]\npattern = \"nope\"\naccess = \"public\"\n");
        assert!(from_toml_str(&toml).is_err());
    }

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        environment().source(Some(map))
    }

    #[test]
    fn oversized_ttl_fails() {
        for ttl in ["0", "315360001", "9000000000000", "9223372036854775807"] {
            let toml = format!("{SECRET_TOML}token_ttl_secs = {ttl}\n");
            let err = from_toml_str(&toml).unwrap_err();
            assert!(err.to_string().contains("token_ttl_secs"), "{ttl}: {err}");
        }

        let toml = format!("{SECRET_TOML}token_ttl_secs = {MAX_TTL_SECS}\n");
        assert_eq!(from_toml_str(&toml).unwrap().auth.token_ttl_secs, MAX_TTL_SECS);
    }

    #[test]
    fn environment_overrides_the_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gatehouse.toml");
        std::fs::write(
            &path,
            format!("{SECRET_TOML}token_ttl_secs = 600\n[server]\nport = 7000\nhost = \"127.0.0.1\"\n"),
        )
        .unwrap();

        let cfg = finish(
            layered(
                path.to_str(),
                env(&[("GATEHOUSE__SERVER__PORT", "9090"), ("GATEHOUSE__AUTH__TOKEN_TTL_SECS", "60")]),
            )
            .unwrap(),
        )
        .unwrap();

        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.auth.token_ttl_secs, 60);
        assert_eq!(cfg.server.host, "127.0.0.1");
        assert_eq!(cfg.auth.token_secret, "0123456789abcdef0123456789abcdef");
        assert_eq!(cfg.server.public_dir, "./public");
    }

    #[test]
    fn secret_can_come_from_the_environment_alone() {
        let cfg = finish(
            layered(
                None,
                env(&[
                    ("GATEHOUSE__AUTH__TOKEN_SECRET", "env-secret-that-is-at-least-32-bytes"),
                    ("GATEHOUSE__FEDERATION__MODE", "forwarded_headers"),
                    ("UNRELATED__SERVER__PORT", "1"),
                ]),
            )
            .unwrap(),
        )
        .unwrap();

        assert_eq!(cfg.auth.token_secret, "env-secret-that-is-at-least-32-bytes");
        assert_eq!(cfg.federation.mode, FederationMode::ForwardedHeaders);
        assert_eq!(cfg.server.port, 8080);
    }

    #[test]
    fn explicit_config_path_must_exist() {
        assert!(load(Some("/nonexistent/gatehouse.toml")).is_err());

        let result = finish(
            layered(
                Some("/nonexistent/gatehouse.toml"),
                env(&[("GATEHOUSE__AUTH__TOKEN_SECRET", "env-secret-that-is-at-least-32-bytes")]),
            )
            .unwrap(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn debug_output_hides_the_secret() {
        let cfg = from_toml_str(SECRET_TOML).unwrap();
        assert!(!format!("{:?}", cfg.auth).contains("0123456789"));
    }
}
