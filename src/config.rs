//! Configuration loading for CLI defaults.
//!
//! The file uses the flat `key = value` subset of TOML: double-quoted
//! strings, bare integers and `#` comments. Credentials never live here;
//! they come from the environment (see [`Credentials`]).

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// Environment variable holding the DataForSEO API login.
pub const ENV_DATAFORSEO_LOGIN: &str = "DATAFORSEO_LOGIN";
/// Environment variable holding the DataForSEO API password.
pub const ENV_DATAFORSEO_PASSWORD: &str = "DATAFORSEO_PASSWORD";
/// Environment variable holding the browser-rendering worker URL.
pub const ENV_CFBROWSER_URL: &str = "CFBROWSER_URL";
/// Environment variable holding the browser-rendering worker key.
pub const ENV_CFBROWSER_API_KEY: &str = "CFBROWSER_API_KEY";
/// Environment variable holding the Jina reader key.
pub const ENV_JINA_API_KEY: &str = "JINA_API_KEY";
/// Environment variable holding the PageSpeed Insights key.
pub const ENV_PAGESPEED_API_KEY: &str = "PAGESPEED_API_KEY";

/// Parsed config file. Every field is optional; unset fields fall back to
/// the provider defaults baked into the library.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Default verbosity mode.
    pub verbosity: Option<VerbositySetting>,
    /// Per-attempt request timeout in seconds, all providers.
    pub timeout_secs: Option<u64>,
    /// Attempt budget (initial attempt included), all providers.
    pub max_attempts: Option<u32>,
    pub dataforseo_base_url: Option<String>,
    pub dataforseo_concurrency: Option<u8>,
    pub cfbrowser_concurrency: Option<u8>,
    pub jina_base_url: Option<String>,
    pub jina_concurrency: Option<u8>,
    pub pagespeed_base_url: Option<String>,
    pub pagespeed_concurrency: Option<u8>,
    /// Base URL relative H5P package paths are resolved against.
    pub h5p_base_url: Option<String>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        validate_concurrency("dataforseo_concurrency", self.dataforseo_concurrency)?;
        validate_concurrency("cfbrowser_concurrency", self.cfbrowser_concurrency)?;
        validate_concurrency("jina_concurrency", self.jina_concurrency)?;
        validate_concurrency("pagespeed_concurrency", self.pagespeed_concurrency)?;

        if let Some(timeout) = self.timeout_secs
            && !(1..=3600).contains(&timeout)
        {
            bail!("Invalid config value for `timeout_secs`: {timeout}. Expected range: 1..=3600");
        }

        if let Some(attempts) = self.max_attempts
            && !(1..=10).contains(&attempts)
        {
            bail!("Invalid config value for `max_attempts`: {attempts}. Expected range: 1..=10");
        }

        validate_base_url("dataforseo_base_url", self.dataforseo_base_url.as_deref())?;
        validate_base_url("jina_base_url", self.jina_base_url.as_deref())?;
        validate_base_url("pagespeed_base_url", self.pagespeed_base_url.as_deref())?;
        validate_base_url("h5p_base_url", self.h5p_base_url.as_deref())?;
        Ok(())
    }
}

fn validate_concurrency(field: &str, value: Option<u8>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=100).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=100");
    }
    Ok(())
}

fn validate_base_url(field: &str, value: Option<&str>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    let parsed = url::Url::parse(value)
        .with_context(|| format!("Invalid config value for `{field}`: {value:?}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("Invalid config value for `{field}`: expected an http(s) URL, got {value:?}");
    }
    Ok(())
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl VerbositySetting {
    /// Log filter used when neither `RUST_LOG` nor a CLI flag decides.
    #[must_use]
    pub fn filter(self) -> &'static str {
        match self {
            Self::Default => "info",
            Self::Verbose => "debug",
            Self::Quiet => "error",
            Self::Debug => "trace",
        }
    }
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Path that was consulted, if one could be resolved.
    pub path: Option<PathBuf>,
    /// Parsed file config, default when no file was found.
    pub config: FileConfig,
    pub loaded_from_file: bool,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/upstream/config.toml`
/// 2. `$HOME/.config/upstream/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("upstream")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("upstream")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file.
///
/// An explicit path must exist. The default path is optional: a missing
/// file yields the default config.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = load_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config,
            loaded_from_file: true,
        });
    }

    let path = resolve_default_config_path();
    match path.as_deref() {
        Some(path_ref) if path_ref.exists() => {
            let config = load_file_config(path_ref)?;
            Ok(LoadedConfig {
                path,
                config,
                loaded_from_file: true,
            })
        }
        _ => Ok(LoadedConfig {
            path,
            config: FileConfig::default(),
            loaded_from_file: false,
        }),
    }
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_no = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let invalid = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "verbosity" => {
                let parsed = parse_string_literal(value).with_context(invalid)?;
                cfg.verbosity = Some(parse_verbosity(&parsed).with_context(|| {
                    format!("Invalid `verbosity` value '{parsed}' on line {line_no}")
                })?);
            }
            "timeout_secs" => {
                cfg.timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "max_attempts" => {
                let parsed = parse_integer_u64(value).with_context(invalid)?;
                let n = u32::try_from(parsed)
                    .map_err(|_| anyhow::anyhow!("max_attempts out of range for u32"))
                    .with_context(invalid)?;
                cfg.max_attempts = Some(n);
            }
            "dataforseo_base_url" => {
                cfg.dataforseo_base_url = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "jina_base_url" => {
                cfg.jina_base_url = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "pagespeed_base_url" => {
                cfg.pagespeed_base_url = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "h5p_base_url" => {
                cfg.h5p_base_url = Some(parse_string_literal(value).with_context(invalid)?);
            }
            "dataforseo_concurrency" => {
                cfg.dataforseo_concurrency = Some(parse_integer_u8(value).with_context(invalid)?);
            }
            "cfbrowser_concurrency" => {
                cfg.cfbrowser_concurrency = Some(parse_integer_u8(value).with_context(invalid)?);
            }
            "jina_concurrency" => {
                cfg.jina_concurrency = Some(parse_integer_u8(value).with_context(invalid)?);
            }
            "pagespeed_concurrency" => {
                cfg.pagespeed_concurrency = Some(parse_integer_u8(value).with_context(invalid)?);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u8(raw_value: &str) -> Result<u8> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<u16>()?;
    u8::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u8"))
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_verbosity(value: &str) -> Result<VerbositySetting> {
    match value {
        "default" => Ok(VerbositySetting::Default),
        "verbose" => Ok(VerbositySetting::Verbose),
        "quiet" => Ok(VerbositySetting::Quiet),
        "debug" => Ok(VerbositySetting::Debug),
        _ => bail!("Expected one of: default, verbose, quiet, debug"),
    }
}

/// Provider credentials read from the environment.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub dataforseo_login: Option<String>,
    pub dataforseo_password: Option<String>,
    pub cfbrowser_url: Option<String>,
    pub cfbrowser_api_key: Option<String>,
    pub jina_api_key: Option<String>,
    pub pagespeed_api_key: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn mask(value: Option<&String>) -> &'static str {
            if value.is_some() { "<set>" } else { "<unset>" }
        }
        f.debug_struct("Credentials")
            .field("dataforseo_login", &self.dataforseo_login)
            .field("dataforseo_password", &mask(self.dataforseo_password.as_ref()))
            .field("cfbrowser_url", &self.cfbrowser_url)
            .field("cfbrowser_api_key", &mask(self.cfbrowser_api_key.as_ref()))
            .field("jina_api_key", &mask(self.jina_api_key.as_ref()))
            .field("pagespeed_api_key", &mask(self.pagespeed_api_key.as_ref()))
            .finish()
    }
}

impl Credentials {
    /// Reads credentials from the process environment. Empty values count as unset.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        Self {
            dataforseo_login: read(ENV_DATAFORSEO_LOGIN),
            dataforseo_password: read(ENV_DATAFORSEO_PASSWORD),
            cfbrowser_url: read(ENV_CFBROWSER_URL),
            cfbrowser_api_key: read(ENV_CFBROWSER_API_KEY),
            jina_api_key: read(ENV_JINA_API_KEY),
            pagespeed_api_key: read(ENV_PAGESPEED_API_KEY),
        }
    }

    /// DataForSEO login and password.
    pub fn dataforseo(&self) -> Result<(&str, &str)> {
        match (&self.dataforseo_login, &self.dataforseo_password) {
            (Some(login), Some(password)) => Ok((login.as_str(), password.as_str())),
            _ => bail!(
                "DataForSEO credentials missing: set {ENV_DATAFORSEO_LOGIN} and {ENV_DATAFORSEO_PASSWORD}"
            ),
        }
    }

    /// Browser-rendering worker URL.
    pub fn cfbrowser_url(&self) -> Result<&str> {
        self.cfbrowser_url
            .as_deref()
            .with_context(|| format!("Browser-rendering worker URL missing: set {ENV_CFBROWSER_URL}"))
    }
}

/// Overrides supplied on the command line; `None` defers to the file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CliOverrides {
    pub timeout_secs: Option<u64>,
    pub max_attempts: Option<u32>,
    pub concurrency: Option<u8>,
}

/// Effective per-provider settings after applying precedence
/// (CLI flag > config file > built-in default, where `None` means built-in).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderSettings {
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
    pub max_attempts: Option<u32>,
    pub max_concurrency: Option<usize>,
}

impl ProviderSettings {
    fn resolve(
        cli: CliOverrides,
        file: &FileConfig,
        base_url: Option<&String>,
        concurrency: Option<u8>,
    ) -> Self {
        Self {
            base_url: base_url.cloned(),
            timeout: cli
                .timeout_secs
                .or(file.timeout_secs)
                .map(Duration::from_secs),
            max_attempts: cli.max_attempts.or(file.max_attempts),
            max_concurrency: cli.concurrency.or(concurrency).map(usize::from),
        }
    }
}

/// Effective settings for every provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub dataforseo: ProviderSettings,
    pub cfbrowser: ProviderSettings,
    pub jina: ProviderSettings,
    pub pagespeed: ProviderSettings,
    pub h5p: ProviderSettings,
}

impl Settings {
    #[must_use]
    pub fn resolve(cli: CliOverrides, file: &FileConfig) -> Self {
        Self {
            dataforseo: ProviderSettings::resolve(
                cli,
                file,
                file.dataforseo_base_url.as_ref(),
                file.dataforseo_concurrency,
            ),
            cfbrowser: ProviderSettings::resolve(cli, file, None, file.cfbrowser_concurrency),
            jina: ProviderSettings::resolve(
                cli,
                file,
                file.jina_base_url.as_ref(),
                file.jina_concurrency,
            ),
            pagespeed: ProviderSettings::resolve(
                cli,
                file,
                file.pagespeed_base_url.as_ref(),
                file.pagespeed_concurrency,
            ),
            h5p: ProviderSettings::resolve(cli, file, file.h5p_base_url.as_ref(), None),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    #[test]
    fn test_parse_config_partial_fields() {
        let cfg = parse_config_str(
            r#"
timeout_secs = 45
verbosity = "verbose"
"#,
        )
        .expect("partial config should parse");
        assert_eq!(cfg.timeout_secs, Some(45));
        assert_eq!(cfg.verbosity, Some(VerbositySetting::Verbose));
        assert!(cfg.dataforseo_base_url.is_none());
    }

    #[test]
    fn test_parse_config_supports_inline_comments() {
        let cfg = parse_config_str(
            r#"
jina_concurrency = 4 # reader is slow
jina_base_url = "https://reader.internal/#/" # hash inside quotes stays
"#,
        )
        .expect("config with comments should parse");
        assert_eq!(cfg.jina_concurrency, Some(4));
        assert_eq!(cfg.jina_base_url.as_deref(), Some("https://reader.internal/#/"));
    }

    #[test]
    fn test_parse_config_rejects_invalid_concurrency() {
        let err = parse_config_str("dataforseo_concurrency = 0")
            .expect_err("invalid concurrency expected");
        assert!(err.to_string().contains("dataforseo_concurrency"));

        let err = parse_config_str("cfbrowser_concurrency = 101")
            .expect_err("invalid concurrency expected");
        assert!(err.to_string().contains("cfbrowser_concurrency"));
    }

    #[test]
    fn test_parse_config_rejects_out_of_range_timeout_and_attempts() {
        let err = parse_config_str("timeout_secs = 3601").expect_err("timeout above range");
        assert!(err.to_string().contains("timeout_secs"));

        let err = parse_config_str("max_attempts = 0").expect_err("attempts below range");
        assert!(err.to_string().contains("max_attempts"));

        let err = parse_config_str("max_attempts = 11").expect_err("attempts above range");
        assert!(err.to_string().contains("max_attempts"));
    }

    #[test]
    fn test_parse_config_rejects_numeric_values_with_trailing_tokens() {
        let err = parse_config_str("jina_concurrency = 4 trailing")
            .expect_err("expected trailing token error");
        assert!(err.to_string().contains("jina_concurrency"));
    }

    #[test]
    fn test_parse_config_rejects_unquoted_and_non_http_urls() {
        let err = parse_config_str("jina_base_url = https://r.jina.ai/")
            .expect_err("unquoted string expected to fail");
        assert!(err.to_string().contains("jina_base_url"));

        let err = parse_config_str(r#"h5p_base_url = "ftp://cdn.test/""#)
            .expect_err("ftp scheme expected to fail");
        assert!(err.to_string().contains("h5p_base_url"));
    }

    #[test]
    fn test_parse_config_rejects_unknown_keys() {
        let err = parse_config_str("concurrency = 4").expect_err("unknown key error expected");
        assert!(err.to_string().contains("Unknown configuration key"));
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn test_parse_config_rejects_missing_equals() {
        let err = parse_config_str("timeout_secs 10").expect_err("syntax error expected");
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_verbosity_filter() {
        assert_eq!(VerbositySetting::Default.filter(), "info");
        assert_eq!(VerbositySetting::Verbose.filter(), "debug");
        assert_eq!(VerbositySetting::Quiet.filter(), "error");
        assert_eq!(VerbositySetting::Debug.filter(), "trace");
    }

    #[test]
    fn test_load_config_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "max_attempts = 5").expect("write config");
        writeln!(file, r#"pagespeed_base_url = "http://127.0.0.1:9000/psi""#).expect("write");

        let loaded = load_config(Some(file.path())).expect("config should load");
        assert!(loaded.loaded_from_file);
        assert_eq!(loaded.config.max_attempts, Some(5));
        assert_eq!(
            loaded.config.pagespeed_base_url.as_deref(),
            Some("http://127.0.0.1:9000/psi")
        );
    }

    #[test]
    fn test_load_config_explicit_missing_path_fails() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("absent.toml");
        let err = load_config(Some(&missing)).expect_err("missing explicit path must fail");
        assert!(err.to_string().contains("absent.toml"));
    }

    #[test]
    fn test_settings_precedence_cli_over_file_over_default() {
        let file = FileConfig {
            timeout_secs: Some(20),
            max_attempts: Some(4),
            jina_concurrency: Some(2),
            ..FileConfig::default()
        };

        let from_file = Settings::resolve(CliOverrides::default(), &file);
        assert_eq!(from_file.jina.timeout, Some(Duration::from_secs(20)));
        assert_eq!(from_file.jina.max_attempts, Some(4));
        assert_eq!(from_file.jina.max_concurrency, Some(2));
        assert_eq!(from_file.dataforseo.max_concurrency, None);

        let cli = CliOverrides {
            timeout_secs: Some(5),
            max_attempts: None,
            concurrency: Some(9),
        };
        let from_cli = Settings::resolve(cli, &file);
        assert_eq!(from_cli.jina.timeout, Some(Duration::from_secs(5)));
        assert_eq!(from_cli.jina.max_attempts, Some(4));
        assert_eq!(from_cli.jina.max_concurrency, Some(9));
        assert_eq!(from_cli.dataforseo.max_concurrency, Some(9));
    }

    #[test]
    fn test_credentials_from_lookup_ignores_blank_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_DATAFORSEO_LOGIN, "user@example.com"),
            (ENV_DATAFORSEO_PASSWORD, "  "),
            (ENV_CFBROWSER_URL, "https://render.example.workers.dev"),
        ]);
        let creds = Credentials::from_lookup(|name| vars.get(name).map(ToString::to_string));

        assert_eq!(creds.dataforseo_login.as_deref(), Some("user@example.com"));
        assert!(creds.dataforseo_password.is_none());
        assert!(creds.dataforseo().is_err());
        assert_eq!(
            creds.cfbrowser_url().expect("worker url"),
            "https://render.example.workers.dev"
        );
        assert!(creds.jina_api_key.is_none());
    }

    #[test]
    fn test_credentials_debug_masks_secrets() {
        let creds = Credentials {
            dataforseo_password: Some("hunter2".to_string()),
            ..Credentials::default()
        };
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<set>"));
    }
}
