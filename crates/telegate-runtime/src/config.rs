//! Session configuration: YAML schema, validation, and URL templating.
//!
//! A session config names the browser setup (args, headers, start/end
//! URLs), the auth method, and the subscriber credential. The start URL is
//! a template; `${token}` and the credential fields are substituted
//! textually right before navigation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use telegate_auth::{AuthMethod, Credential};
use url::Url;

use crate::{Error, Result};

/// Top-level session configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub browser: BrowserSection,

    #[serde(default)]
    pub auth: AuthSection,

    pub credential: CredentialSection,

    #[serde(default)]
    pub session: SessionSection,

    #[serde(default)]
    pub output: OutputSection,
}

/// Browser launch and navigation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserSection {
    /// Extra process arguments.
    #[serde(default)]
    pub args: Vec<String>,

    /// Default request headers for the session page.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Start URL template with `${...}` placeholders.
    pub start_url: String,

    /// Wildcard pattern marking login completion. `**` spans path
    /// segments, `*` stays within one.
    pub end_url: String,

    #[serde(default = "default_true")]
    pub headless: bool,
}

/// Authentication method selection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthSection {
    #[serde(default)]
    pub method: AuthMethod,

    /// Required for `SALTED_MD5`, ignored otherwise. Opaque text, never
    /// numeric.
    #[serde(default)]
    pub salt: Option<String>,
}

/// Subscriber credential fields.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialSection {
    pub user_id: String,
    pub password: String,
    pub ip: String,
    pub mac: String,
    pub product_id: String,

    /// Opaque carrier field, defaults to `"CTC"` downstream.
    #[serde(default)]
    pub ctc: Option<String>,
}

impl CredentialSection {
    /// Build the validated credential (without a session token).
    pub fn to_credential(&self) -> Result<Credential> {
        Credential::new(
            &self.user_id,
            &self.password,
            &self.ip,
            &self.mac,
            &self.product_id,
            self.ctc.as_deref(),
        )
        .map_err(Error::from)
    }
}

/// Session-level limits.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSection {
    /// Deadline for reaching the completion URL.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Where captured session data is persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputSection {
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            path: default_output_path(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    180
}

fn default_output_path() -> PathBuf {
    PathBuf::from("channels.json")
}

impl Config {
    /// Load config from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse config from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.browser.start_url.is_empty() {
            return Err(Error::Config("browser.start_url is required".into()));
        }
        crate::pattern::UrlPattern::new(&self.browser.end_url)?;
        if self.auth.method == AuthMethod::SaltedMd5 && self.auth.salt.is_none() {
            return Err(Error::Config(
                "auth.salt is required for SALTED_MD5".into(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.session.timeout_secs)
    }

    /// Resolve the start-URL template with the authentication token and
    /// the credential fields, and check the result parses as a URL.
    pub fn start_url(&self, token: &str) -> Result<String> {
        let credential = &self.credential;
        let ctc = credential.ctc.as_deref().unwrap_or(telegate_auth::DEFAULT_CTC);
        let vars: [(&str, &str); 6] = [
            ("token", token),
            ("user_id", &credential.user_id),
            ("ip", &credential.ip),
            ("mac", &credential.mac),
            ("product_id", &credential.product_id),
            ("ctc", ctc),
        ];
        let resolved = substitute(&self.browser.start_url, &vars)?;
        Url::parse(&resolved)
            .map_err(|e| Error::Config(format!("malformed start URL '{resolved}': {e}")))?;
        Ok(resolved)
    }
}

/// Substitute `${name}` placeholders. Unknown or unterminated
/// placeholders are configuration errors.
pub fn substitute(template: &str, vars: &[(&str, &str)]) -> Result<String> {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(Error::Config(
                "unterminated placeholder in URL template".into(),
            ));
        };
        let name = &after[..end];
        let Some((_, value)) = vars.iter().find(|(key, _)| *key == name) else {
            return Err(Error::Config(format!(
                "unknown placeholder '{name}' in URL template"
            )));
        };
        result.push_str(value);
        rest = &after[end + 1..];
    }
    result.push_str(rest);
    Ok(result)
}
