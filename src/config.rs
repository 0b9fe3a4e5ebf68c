//! Configuration module for samwise.
//!
//! This module handles loading and validating configuration from:
//! - YAML configuration files (`samwise.yaml`)
//! - Environment variables (`SAMWISE_CLI_*` credentials)
//! - CLI arguments
//!
//! # Configuration File Format
//!
//! ```yaml
//! # samwise.yaml
//!
//! scan:
//!   max_depth: -1          # -1 walks the whole tree, 0 only the given directory
//!   ignore_dirs: [".git", ".idea", ".terraform"]
//!   exclude_patterns: ["**/examples/**"]
//!
//! git:
//!   username: ${SAMWISE_CLI_GITHUB_USERNAME}
//!   password: ${SAMWISE_CLI_GITHUB_KEY}
//!   ssh_key_path: ~/.ssh/id_ed25519
//!   host_key_policy: strict  # or accept_any
//!   timeout_seconds: 120
//!
//! output:
//!   format: csv              # csv | json
//!   filename: module_report
//!   latest_only: false
//!   flag_major_upgrades: false
//!
//! formatter:
//!   enabled: true
//!   command: terraform
//!
//! commit:
//!   enabled: true
//!   branch_prefix: samwise/module-updates
//! ```

use crate::cli::{CheckArgs, UpdateArgs};
use crate::error::{Result, SamwiseError};
use crate::reporter::OutputFormat;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

/// Environment variable holding the HTTPS username.
pub const ENV_USERNAME: &str = "SAMWISE_CLI_GITHUB_USERNAME";
/// Environment variable holding the HTTPS password or access token.
pub const ENV_PASSWORD: &str = "SAMWISE_CLI_GITHUB_KEY";
/// Environment variable overriding the SSH private key location.
pub const ENV_SSH_KEY_PATH: &str = "SAMWISE_CLI_SSH_KEY_PATH";
/// Environment variable holding the SSH key passphrase.
pub const ENV_SSH_PASSPHRASE: &str = "SAMWISE_CLI_SSH_KEY_PASSPHRASE";

/// Configuration file names searched in the working directory, in order.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["samwise.yaml", "samwise.yml", ".samwise.yaml"];

static BRACED_VAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("Invalid regex"));
static BARE_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").expect("Invalid regex"));

/// Directory walk options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Levels below the root to descend into. `0` is the root only, negative is unlimited.
    pub max_depth: i32,

    /// Directory names never descended into.
    pub ignore_dirs: Vec<String>,

    /// Glob patterns matched against directory paths relative to the root.
    pub exclude_patterns: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            max_depth: 0,
            ignore_dirs: vec![".git".to_string(), ".idea".to_string(), ".terraform".to_string()],
            exclude_patterns: Vec::new(),
        }
    }
}

/// How SSH host keys are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostKeyPolicy {
    /// Leave verification to libgit2 and the user's known hosts.
    #[default]
    Strict,
    /// Accept any host key. Opt-in only.
    AcceptAny,
}

/// Git access options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitOptions {
    /// HTTPS username
    pub username: Option<String>,

    /// HTTPS password or personal access token
    pub password: Option<String>,

    /// SSH private key; `~/.ssh/id_rsa` when unset
    pub ssh_key_path: Option<PathBuf>,

    pub ssh_key_passphrase: Option<String>,

    pub host_key_policy: HostKeyPolicy,

    /// Deadline for a single clone or tag listing.
    pub timeout_seconds: u64,
}

impl Default for GitOptions {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            ssh_key_path: None,
            ssh_key_passphrase: None,
            host_key_policy: HostKeyPolicy::Strict,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl GitOptions {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.max(1))
    }

    /// Configured key, or `~/.ssh/id_rsa`.
    #[must_use]
    pub fn resolved_ssh_key_path(&self) -> PathBuf {
        match &self.ssh_key_path {
            Some(path) => expand_home(path),
            None => dirs::home_dir()
                .unwrap_or_default()
                .join(".ssh")
                .join("id_rsa"),
        }
    }

    /// Fill unset credentials from the process environment.
    pub fn load_from_env(&mut self) {
        self.load_from(|var| std::env::var(var).ok());
    }

    /// Fill unset credentials through `lookup`, ignoring empty values.
    pub fn load_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |var: &str| lookup(var).filter(|v| !v.is_empty());

        if self.username.is_none() {
            self.username = get(ENV_USERNAME);
        }
        if self.password.is_none() {
            self.password = get(ENV_PASSWORD);
        }
        if self.ssh_key_path.is_none() {
            self.ssh_key_path = get(ENV_SSH_KEY_PATH).map(PathBuf::from);
        }
        if self.ssh_key_passphrase.is_none() {
            self.ssh_key_passphrase = get(ENV_SSH_PASSPHRASE);
        }

        tracing::debug!(
            username_set = self.username.is_some(),
            password_set = self.password.is_some(),
            ssh_key_path_set = self.ssh_key_path.is_some(),
            "Git credentials loaded"
        );
    }
}

/// Report options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputOptions {
    /// `csv` or `json`. Anything else is rejected before scanning starts.
    pub format: String,

    /// Report file name; any extension is dropped and replaced by the format's.
    pub filename: String,

    /// Show only the greatest newer tag instead of all of them.
    pub latest_only: bool,

    /// Add a column telling whether the greatest newer tag is a major upgrade.
    pub flag_major_upgrades: bool,

    /// Use colored output.
    pub colored: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            format: "csv".to_string(),
            filename: crate::reporter::DEFAULT_REPORT_NAME.to_string(),
            latest_only: false,
            flag_major_upgrades: false,
            colored: true,
        }
    }
}

/// Formatter pass run before files are parsed in update mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatterOptions {
    pub enabled: bool,

    /// Binary invoked as `<command> fmt`.
    pub command: String,
}

impl Default for FormatterOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            command: "terraform".to_string(),
        }
    }
}

/// Commit step of update mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitOptions {
    pub enabled: bool,

    /// The branch is `<branch_prefix>-<YYYY-MM-DD>`.
    pub branch_prefix: String,

    pub author_name: String,

    pub author_email: String,
}

impl Default for CommitOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            branch_prefix: "samwise/module-updates".to_string(),
            author_name: "samwise".to_string(),
            author_email: "samwise@localhost".to_string(),
        }
    }
}

/// Main configuration structure with nested sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory walk options
    pub scan: ScanOptions,

    /// Git access options
    pub git: GitOptions,

    /// Report options
    pub output: OutputOptions,

    /// Formatter options
    pub formatter: FormatterOptions,

    /// Commit options
    pub commit: CommitOptions,
}

fn default_timeout_seconds() -> u64 {
    120
}

impl Config {
    /// Load configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn from_yaml(content: &str) -> Result<Self> {
        tracing::debug!("Parsing configuration from YAML");
        let expanded = expand_env_vars(content);

        let config: Config = serde_yaml::from_str(&expanded).map_err(|e| {
            SamwiseError::config_parse(e.to_string(), Some(Box::new(e)), file!(), line!())
        })?;

        tracing::debug!(
            max_depth = config.scan.max_depth,
            format = %config.output.format,
            host_key_policy = ?config.git.host_key_policy,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Checks values that serde cannot: the output format.
    ///
    /// # Errors
    ///
    /// Returns `ConfigValue` for an unsupported output format.
    pub fn validate(&self) -> Result<()> {
        self.output_format().map(|_| ())
    }

    /// The configured report format.
    ///
    /// # Errors
    ///
    /// Returns `ConfigValue` if the format is neither `csv` nor `json`.
    pub fn output_format(&self) -> Result<OutputFormat> {
        self.output.format.parse()
    }

    /// Generate an example YAML configuration.
    #[must_use]
    pub fn example_yaml() -> String {
        r#"# samwise configuration file

# Directory walk
scan:
  # 0 scans only the given directory, -1 walks the whole tree
  max_depth: 0
  # Directory names that are never entered
  ignore_dirs:
    - ".git"
    - ".idea"
    - ".terraform"
  # Glob patterns (relative to the scanned root) of directories to skip
  exclude_patterns: []

# Access to module repositories
git:
  # HTTPS credentials; SAMWISE_CLI_GITHUB_USERNAME / SAMWISE_CLI_GITHUB_KEY
  # are used when these are unset
  # username: ${SAMWISE_CLI_GITHUB_USERNAME}
  # password: ${SAMWISE_CLI_GITHUB_KEY}
  # SSH key for git@host:org/repo sources (default ~/.ssh/id_rsa)
  # ssh_key_path: ~/.ssh/id_ed25519
  # strict checks host keys against known_hosts; accept_any skips the check
  host_key_policy: strict
  # Seconds allowed for a single clone or tag listing
  timeout_seconds: 120

# Reports
output:
  # csv or json
  format: csv
  filename: module_report
  # Show only the newest version instead of every newer one
  latest_only: false
  # Add a major_upgrade column
  flag_major_upgrades: false
  colored: true

# `terraform fmt` before rewriting (update only)
formatter:
  enabled: true
  command: terraform

# Commit rewritten files on a dated branch (update only, never pushed)
commit:
  enabled: true
  branch_prefix: samwise/module-updates
  author_name: samwise
  author_email: samwise@localhost
"#
        .to_string()
    }

    /// Merge `check` arguments into the configuration.
    pub fn merge_check_args(&mut self, args: &CheckArgs) {
        if let Some(depth) = args.depth {
            self.scan.max_depth = depth;
        }
        if !args.ignore.is_empty() {
            self.scan.ignore_dirs.clone_from(&args.ignore);
        }
        if let Some(ref format) = args.output {
            self.output.format.clone_from(format);
        }
        if let Some(ref filename) = args.output_filename {
            self.output.filename.clone_from(filename);
        }
        if args.latest_version {
            self.output.latest_only = true;
        }
        if args.flag_major_upgrades {
            self.output.flag_major_upgrades = true;
        }
    }

    /// Merge `update` arguments into the configuration.
    pub fn merge_update_args(&mut self, args: &UpdateArgs) {
        if let Some(depth) = args.depth {
            self.scan.max_depth = depth;
        }
        if !args.ignore.is_empty() {
            self.scan.ignore_dirs.clone_from(&args.ignore);
        }
        if args.no_commit {
            self.commit.enabled = false;
        }
        if args.no_format {
            self.formatter.enabled = false;
        }
    }

    /// Fill unset credentials from the environment.
    pub fn load_credentials_from_env(&mut self) {
        self.git.load_from_env();
    }
}

fn expand_home(path: &std::path::Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir().unwrap_or_default().join(rest),
        Err(_) => path.to_path_buf(),
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax. Unknown variables are left as-is.
fn expand_env_vars(content: &str) -> String {
    let mut result = content.to_string();

    for cap in BRACED_VAR.captures_iter(content) {
        if let Ok(value) = std::env::var(&cap[1]) {
            result = result.replace(&cap[0], &value);
        }
    }

    for cap in BARE_VAR.captures_iter(content) {
        if let Ok(value) = std::env::var(&cap[1]) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}
