use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Settings file picked up from the working directory when `--config` is absent.
pub const DEFAULT_SETTINGS_FILE: &str = "cpn-e2e.yaml";

pub const ENV_OAUTH_TOKEN: &str = "OAUTH_TOKEN";
pub const ENV_CANVAS_HOST: &str = "CANVAS_HOST";
pub const ENV_ACCOUNT_ID: &str = "ACCOUNT_ID";
pub const ENV_S3_BUCKET_URL: &str = "AMAZON_S3_BUCKET_URL";

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Secrets and tenant coordinates read from the environment (or `.env`).
#[derive(Clone)]
pub struct Credentials {
    /// Canvas API bearer token.
    pub oauth_token: String,
    /// Canvas base URL without a trailing slash, e.g. `https://canvas.example.ac.uk`.
    pub canvas_host: String,
    /// Account that owns the courses created as fixtures.
    pub account_id: String,
    /// Bucket serving the CPN assets; only the general suite needs it.
    pub s3_bucket_url: Option<String>,
}

// Keep the token out of logs and panic messages.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("oauth_token", &"<redacted>")
            .field("canvas_host", &self.canvas_host)
            .field("account_id", &self.account_id)
            .field("s3_bucket_url", &self.s3_bucket_url)
            .finish()
    }
}

impl Credentials {
    /// Read credentials from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials through an arbitrary lookup function.
    ///
    /// Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| {
                anyhow::anyhow!("You must set the environmental variable {key}")
            })
        };

        let oauth_token = require(ENV_OAUTH_TOKEN)?;
        let canvas_host = require(ENV_CANVAS_HOST)?
            .trim()
            .trim_end_matches('/')
            .to_string();
        let account_id = require(ENV_ACCOUNT_ID)?.trim().to_string();
        let s3_bucket_url = get(ENV_S3_BUCKET_URL).map(|v| v.trim().to_string());

        Ok(Self {
            oauth_token,
            canvas_host,
            account_id,
            s3_bucket_url,
        })
    }

    /// The S3 bucket URL, or the same error a missing required variable gives.
    pub fn require_s3_bucket_url(&self) -> anyhow::Result<&str> {
        self.s3_bucket_url.as_deref().ok_or_else(|| {
            anyhow::anyhow!("You must set the environmental variable {ENV_S3_BUCKET_URL}")
        })
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Non-secret knobs loaded from `cpn-e2e.yaml`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Run Chromium without a window.
    #[serde(default = "default_true")]
    pub headless: bool,
    /// Upper bound on a single navigation. Canvas occasionally stalls for
    /// around a minute, so keep this above 60.
    #[serde(default = "default_page_timeout_secs")]
    pub page_timeout_secs: u64,
    /// Upper bound on a whole case, session bridge included.
    #[serde(default = "default_case_timeout_secs")]
    pub case_timeout_secs: u64,
    /// Timeout applied to each REST request.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Script under test, injected verbatim.
    #[serde(default = "default_script_path")]
    pub script_path: PathBuf,
    /// Stylesheet under test, injected verbatim.
    #[serde(default = "default_style_path")]
    pub style_path: PathBuf,
    /// Modules created by the general suite.
    #[serde(default = "default_module_count")]
    pub module_count: usize,
    /// Target of the external-URL module item.
    #[serde(default = "default_external_url")]
    pub external_url: String,
}

fn default_true() -> bool {
    true
}

fn default_page_timeout_secs() -> u64 {
    90
}

fn default_case_timeout_secs() -> u64 {
    1200
}

fn default_http_timeout_secs() -> u64 {
    60
}

fn default_script_path() -> PathBuf {
    PathBuf::from("canvas-where-am-I.js")
}

fn default_style_path() -> PathBuf {
    PathBuf::from("canvas-where-am-I.css")
}

fn default_module_count() -> usize {
    12
}

fn default_external_url() -> String {
    "https://www.ox.ac.uk".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            headless: default_true(),
            page_timeout_secs: default_page_timeout_secs(),
            case_timeout_secs: default_case_timeout_secs(),
            http_timeout_secs: default_http_timeout_secs(),
            script_path: default_script_path(),
            style_path: default_style_path(),
            module_count: default_module_count(),
            external_url: default_external_url(),
        }
    }
}

impl Settings {
    /// Load settings.
    ///
    /// An explicit `path` must exist. Without one, `cpn-e2e.yaml` in the
    /// working directory is used when present, otherwise the defaults.
    pub async fn load(path: Option<&Path>) -> anyhow::Result<Settings> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_SETTINGS_FILE), false),
        };

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !explicit => {
                tracing::debug!(path = %path.display(), "no settings file, using defaults");
                return Ok(Settings::default());
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read settings file: {}", path.display()));
            }
        };

        let settings = Settings::parse(&contents)
            .with_context(|| format!("invalid settings file: {}", path.display()))?;
        tracing::debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    /// Parse and validate a YAML document. An empty document yields the defaults.
    pub fn parse(contents: &str) -> anyhow::Result<Settings> {
        let settings: Settings = if contents.trim().is_empty() {
            Settings::default()
        } else {
            serde_yaml_ng::from_str(contents).context("failed to parse settings YAML")?
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.page_timeout_secs == 0 {
            anyhow::bail!("settings: page_timeout_secs must be greater than zero");
        }
        if self.case_timeout_secs < self.page_timeout_secs {
            anyhow::bail!(
                "settings: case_timeout_secs ({}) is shorter than page_timeout_secs ({})",
                self.case_timeout_secs,
                self.page_timeout_secs
            );
        }
        if self.http_timeout_secs == 0 {
            anyhow::bail!("settings: http_timeout_secs must be greater than zero");
        }
        // The general suite attaches its items to the first module.
        if self.module_count == 0 {
            anyhow::bail!("settings: module_count must be at least 1");
        }
        if reqwest::Url::parse(&self.external_url).is_err() {
            anyhow::bail!("settings: external_url is not a valid URL: {}", self.external_url);
        }
        Ok(())
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn case_timeout(&self) -> Duration {
        Duration::from_secs(self.case_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn credentials_from_complete_env() {
        let vars = env(&[
            ("OAUTH_TOKEN", "tok"),
            ("CANVAS_HOST", "https://canvas.example.com/"),
            ("ACCOUNT_ID", "1"),
            ("AMAZON_S3_BUCKET_URL", "https://bucket.s3.amazonaws.com"),
        ]);
        let creds = Credentials::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(creds.canvas_host, "https://canvas.example.com");
        assert_eq!(creds.account_id, "1");
        assert_eq!(
            creds.require_s3_bucket_url().unwrap(),
            "https://bucket.s3.amazonaws.com"
        );
    }

    #[test]
    fn missing_token_names_the_variable() {
        let vars = env(&[("CANVAS_HOST", "https://c"), ("ACCOUNT_ID", "1")]);
        let err = Credentials::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "You must set the environmental variable OAUTH_TOKEN"
        );
    }

    #[test]
    fn blank_value_counts_as_missing() {
        let vars = env(&[
            ("OAUTH_TOKEN", "tok"),
            ("CANVAS_HOST", "  "),
            ("ACCOUNT_ID", "1"),
        ]);
        let err = Credentials::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(err.to_string().ends_with("CANVAS_HOST"));
    }

    #[test]
    fn s3_bucket_is_optional_until_required() {
        let vars = env(&[
            ("OAUTH_TOKEN", "tok"),
            ("CANVAS_HOST", "https://c"),
            ("ACCOUNT_ID", "1"),
        ]);
        let creds = Credentials::from_lookup(|k| vars.get(k).cloned()).unwrap();
        let err = creds.require_s3_bucket_url().unwrap_err();
        assert!(err.to_string().contains("AMAZON_S3_BUCKET_URL"));
    }

    #[test]
    fn debug_redacts_token() {
        let vars = env(&[
            ("OAUTH_TOKEN", "super-secret"),
            ("CANVAS_HOST", "https://c"),
            ("ACCOUNT_ID", "1"),
        ]);
        let creds = Credentials::from_lookup(|k| vars.get(k).cloned()).unwrap();
        let dbg = format!("{creds:?}");
        assert!(!dbg.contains("super-secret"));
    }

    #[test]
    fn empty_settings_are_defaults() {
        let s = Settings::parse("").unwrap();
        assert!(s.headless);
        assert_eq!(s.page_timeout_secs, 90);
        assert_eq!(s.module_count, 12);
        assert_eq!(s.script_path, PathBuf::from("canvas-where-am-I.js"));
    }

    #[test]
    fn partial_settings_keep_other_defaults() {
        let s = Settings::parse("headless: false\nmodule_count: 3\n").unwrap();
        assert!(!s.headless);
        assert_eq!(s.module_count, 3);
        assert_eq!(s.case_timeout_secs, 1200);
    }

    #[test]
    fn unknown_settings_key_is_rejected() {
        assert!(Settings::parse("headles: false\n").is_err());
    }

    #[test]
    fn zero_modules_is_rejected() {
        let err = Settings::parse("module_count: 0\n").unwrap_err();
        assert!(format!("{err:#}").contains("module_count"));
    }

    #[test]
    fn case_timeout_shorter_than_page_timeout_is_rejected() {
        assert!(Settings::parse("page_timeout_secs: 90\ncase_timeout_secs: 30\n").is_err());
    }

    #[tokio::test]
    async fn explicit_missing_settings_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");
        assert!(Settings::load(Some(&missing)).await.is_err());
    }

    #[tokio::test]
    async fn explicit_settings_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cpn-e2e.yaml");
        std::fs::write(&path, "page_timeout_secs: 120\n").unwrap();
        let s = Settings::load(Some(&path)).await.unwrap();
        assert_eq!(s.page_timeout_secs, 120);
    }
}
