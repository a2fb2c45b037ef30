// common/src/config.rs
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use config::{Config as ConfigFile, File, Environment};

/// Central configuration for the asset gateway
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub gateway_addr: String,

    #[serde(default)]
    pub session: SessionConfig,

    // Static file serving configuration
    pub static_files: StaticFilesConfig,

    #[serde(default)]
    pub policy: PolicyConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// HMAC secret shared with whoever signs session tokens
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Also accept `Authorization: Bearer <token>`
    #[serde(default = "default_true")]
    pub accept_bearer: bool,
    #[serde(default)]
    pub leeway_secs: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StaticFilesConfig {
    pub path: String,
    pub cache: CacheConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    pub max_age: u32,
    pub immutable: bool,
    pub must_revalidate: bool,
}

/// Path policy as plain data. The gateway compiles this once at startup.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub api_prefixes: Vec<String>,
    pub api_paths: Vec<String>,
    pub guest_only: Vec<GuestOnlyRule>,
    pub protected_exact: Vec<ProtectedRule>,
    pub protected_prefixes: Vec<ProtectedRule>,
    pub spa_routes: Vec<String>,
    pub legacy_pages: LegacyPagesConfig,
    pub entry_document: String,
    pub entry_aliases: Vec<String>,
    pub loading_page: String,
    pub mailbox_home: String,
    /// Username of the bootstrap/root pseudo-account, if the deployment has one
    pub bootstrap_username: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GuestOnlyRule {
    pub path: String,
    pub redirect_to: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProtectedRule {
    pub path: String,
    pub roles: Vec<String>,
    /// `admin-area` or `mailbox-area`
    pub area: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LegacyPagesConfig {
    pub admin: LegacyPageConfig,
    pub mailbox: LegacyPageConfig,
    pub all_mailboxes: LegacyPageConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LegacyPageConfig {
    pub document: String,
    pub aliases: Vec<String>,
}

fn default_cookie_name() -> String {
    "session".to_string()
}

fn default_true() -> bool {
    true
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn secret_from<F>(lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup("JWT_TOKEN")
        .filter(|v| !v.is_empty())
        .or_else(|| lookup("JWT_SECRET"))
        .unwrap_or_default()
}

fn protected(path: &str, roles: &[&str], area: &str) -> ProtectedRule {
    ProtectedRule {
        path: path.to_string(),
        roles: strings(roles),
        area: area.to_string(),
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            cookie_name: default_cookie_name(),
            accept_bearer: true,
            leeway_secs: 0,
        }
    }
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            path: "./static".to_string(),
            cache: CacheConfig {
                max_age: 3600,
                immutable: false,
                must_revalidate: true,
            },
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            api_prefixes: strings(&["/api/"]),
            api_paths: strings(&["/api", "/receive"]),
            guest_only: vec![
                GuestOnlyRule { path: "/login".into(), redirect_to: "/".into() },
                GuestOnlyRule { path: "/login.html".into(), redirect_to: "/".into() },
            ],
            // Client routes resolve to the entry document unless a deployment gates them
            protected_exact: Vec::new(),
            protected_prefixes: vec![
                protected("/admin/", &["admin", "guest", "mailbox"], "admin-area"),
                protected("/mailbox/", &["mailbox"], "mailbox-area"),
            ],
            spa_routes: strings(&[
                "/dashboard",
                "/mailbox",
                "/compose",
                "/sent",
                "/settings",
                "/login",
            ]),
            legacy_pages: LegacyPagesConfig {
                admin: LegacyPageConfig {
                    document: "/html/admin.html".into(),
                    aliases: strings(&["/admin", "/admin.html"]),
                },
                mailbox: LegacyPageConfig {
                    document: "/html/mailbox.html".into(),
                    aliases: strings(&["/mailbox", "/mailbox.html", "/html/mailbox.html"]),
                },
                all_mailboxes: LegacyPageConfig {
                    document: "/html/mailboxes.html".into(),
                    aliases: strings(&["/mailboxes", "/mailboxes.html", "/html/mailboxes.html"]),
                },
            },
            entry_document: "/index.html".to_string(),
            entry_aliases: strings(&["/", "/index.html"]),
            loading_page: "/templates/loading.html".to_string(),
            mailbox_home: "/mailbox".to_string(),
            bootstrap_username: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway_addr: "127.0.0.1:8787".to_string(),
            session: SessionConfig::default(),
            static_files: StaticFilesConfig::default(),
            policy: PolicyConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        // Get the run mode, defaulting to "development"
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        // Locate the config directory
        let config_dir = env::var("CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                // Check if we're in the project root or a subcrate
                let mut path = PathBuf::from("./config");
                if !path.exists() {
                    path = PathBuf::from("../config");
                }
                path
            });

        tracing::info!("Loading configuration from {}", config_dir.display());
        tracing::info!("Using run mode: {}", run_mode);

        let defaults = Config::default();

        let config = ConfigFile::builder()
            // Built-in defaults for the scalar settings; the policy section
            // falls back to PolicyConfig::default() through serde
            .set_default("gateway_addr", defaults.gateway_addr)?
            .set_default("session.cookie_name", defaults.session.cookie_name)?
            .set_default("static_files.path", defaults.static_files.path)?
            .set_default("static_files.cache.max_age", defaults.static_files.cache.max_age as i64)?
            .set_default("static_files.cache.immutable", defaults.static_files.cache.immutable)?
            .set_default(
                "static_files.cache.must_revalidate",
                defaults.static_files.cache.must_revalidate,
            )?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add environment specific config
            .add_source(File::from(config_dir.join(format!("{}.toml", run_mode))).required(false))
            // Add a local config file for local overrides
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Add environment variables with prefix "APP"
            .add_source(Environment::with_prefix("APP").separator("__").try_parsing(true))
            .build()?
            .try_deserialize::<Config>()?;

        Ok(config.with_secret_fallback(|key| env::var(key).ok()))
    }

    // Deployments that predate the APP__ variables pass the secret as
    // JWT_TOKEN (preferred) or JWT_SECRET
    fn with_secret_fallback<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.session.secret.is_empty() {
            self.session.secret = secret_from(&lookup);
        }
        self
    }

    /// Load from files when possible, otherwise from plain environment variables
    pub fn from_env() -> Self {
        match Self::load() {
            Ok(config) => {
                tracing::info!("Configuration loaded from files and environment");
                config
            },
            Err(e) => {
                tracing::warn!("Failed to load configuration from files: {}", e);
                tracing::info!("Falling back to environment variables only");
                Self::from_plain_env(|key| env::var(key).ok())
            }
        }
    }

    // Environment-only configuration. `lookup` is injected so tests don't
    // have to mutate the process environment.
    fn from_plain_env<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let flag = |key: &str, default: bool| {
            lookup(key).map(|v| v.to_lowercase() == "true").unwrap_or(default)
        };

        let gateway_addr = lookup("GATEWAY_ADDR").unwrap_or(defaults.gateway_addr);

        let secret = secret_from(&lookup);

        let cookie_name = lookup("SESSION_COOKIE").unwrap_or(defaults.session.cookie_name);
        let accept_bearer = flag("ACCEPT_BEARER", defaults.session.accept_bearer);
        let leeway_secs = lookup("TOKEN_LEEWAY_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.session.leeway_secs);

        let static_files_path = lookup("STATIC_FILES_PATH").unwrap_or(defaults.static_files.path);

        let cache_max_age = lookup("CACHE_MAX_AGE")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults.static_files.cache.max_age);
        let cache_immutable = flag("CACHE_IMMUTABLE", defaults.static_files.cache.immutable);
        let cache_must_revalidate =
            flag("CACHE_MUST_REVALIDATE", defaults.static_files.cache.must_revalidate);

        let mut policy = defaults.policy;
        if let Some(bootstrap) = lookup("BOOTSTRAP_USERNAME").filter(|v| !v.is_empty()) {
            policy.bootstrap_username = Some(bootstrap);
        }

        Self {
            gateway_addr,
            session: SessionConfig {
                secret,
                cookie_name,
                accept_bearer,
                leeway_secs,
            },
            static_files: StaticFilesConfig {
                path: static_files_path,
                cache: CacheConfig {
                    max_age: cache_max_age,
                    immutable: cache_immutable,
                    must_revalidate: cache_must_revalidate,
                },
            },
            policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn plain_env_defaults() {
        let config = Config::from_plain_env(env_of(&[]));
        assert_eq!(config.gateway_addr, "127.0.0.1:8787");
        assert_eq!(config.session.cookie_name, "session");
        assert!(config.session.secret.is_empty());
        assert_eq!(config.static_files.cache.max_age, 3600);
        assert_eq!(config.policy.loading_page, "/templates/loading.html");
        assert!(config.policy.bootstrap_username.is_none());
    }

    #[test]
    fn jwt_token_wins_over_jwt_secret() {
        let config = Config::from_plain_env(env_of(&[("JWT_TOKEN", "a"), ("JWT_SECRET", "b")]));
        assert_eq!(config.session.secret, "a");

        let config = Config::from_plain_env(env_of(&[("JWT_TOKEN", ""), ("JWT_SECRET", "b")]));
        assert_eq!(config.session.secret, "b");
    }

    #[test]
    fn file_secret_is_kept_and_blank_one_is_filled() {
        let mut config = Config::default();
        config.session.secret = "from-file".into();
        let config = config.with_secret_fallback(env_of(&[("JWT_TOKEN", "env")]));
        assert_eq!(config.session.secret, "from-file");

        let config = Config::default().with_secret_fallback(env_of(&[("JWT_SECRET", "env")]));
        assert_eq!(config.session.secret, "env");
    }

    #[test]
    fn plain_env_overrides() {
        let config = Config::from_plain_env(env_of(&[
            ("SESSION_COOKIE", "iding"),
            ("ACCEPT_BEARER", "false"),
            ("CACHE_MAX_AGE", "60"),
            ("BOOTSTRAP_USERNAME", "__root__"),
        ]));
        assert_eq!(config.session.cookie_name, "iding");
        assert!(!config.session.accept_bearer);
        assert_eq!(config.static_files.cache.max_age, 60);
        assert_eq!(config.policy.bootstrap_username.as_deref(), Some("__root__"));
    }

    #[test]
    fn policy_section_is_optional_in_files() {
        let raw = r#"
            gateway_addr = "0.0.0.0:9000"

            [session]
            secret = "s"

            [static_files]
            path = "./dist"

            [static_files.cache]
            max_age = 10
            immutable = true
            must_revalidate = false

            [policy]
            mailbox_home = "/inbox"
        "#;
        let config: Config = ConfigFile::builder()
            .add_source(File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.gateway_addr, "0.0.0.0:9000");
        assert_eq!(config.session.cookie_name, "session");
        assert!(config.session.accept_bearer);
        assert_eq!(config.policy.mailbox_home, "/inbox");
        // untouched policy fields keep their defaults
        assert_eq!(config.policy.entry_document, "/index.html");
        assert_eq!(config.policy.protected_prefixes.len(), 2);
    }
}
