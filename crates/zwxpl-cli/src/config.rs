//! Bridge configuration – reads `~/.zwxpl/config.toml` (or `$ZWXPL_CONFIG`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use zwxpl_types::BridgeError;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "ZWXPL_CONFIG";

/// Persisted bridge configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Serial device of the mesh controller.
    #[serde(default = "default_serial_port")]
    pub serial_port: String,

    /// WebSocket URL of the mesh driver gateway.
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,

    /// Listen port of the bus endpoint.
    #[serde(default = "default_bus_port")]
    pub bus_port: u16,

    /// Source name stamped on every announcement.
    #[serde(default = "default_xpl_source")]
    pub xpl_source: String,

    /// Alias table: a file path or an inline `key=value,...` string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_aliases: Option<String>,

    /// Comma-separated node ids presented as shutters.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub emulate_shutters: String,

    /// Comma-separated node ids presented as switches.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub emulate_switches: String,

    /// Optional CSV listing of every discovered value point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_dump: Option<PathBuf>,

    /// Driver-side logging, forwarded on connect.
    #[serde(default)]
    pub zwave_logging: bool,

    /// Driver-side console output, forwarded on connect.
    #[serde(default)]
    pub zwave_console_output: bool,
}

fn default_serial_port() -> String {
    "/dev/ttyACM0".to_string()
}
fn default_gateway_url() -> String {
    "ws://127.0.0.1:8091".to_string()
}
fn default_bus_port() -> u16 {
    3865
}
fn default_xpl_source() -> String {
    xpl_source_for_host(&hostname())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serial_port: default_serial_port(),
            gateway_url: default_gateway_url(),
            bus_port: default_bus_port(),
            xpl_source: default_xpl_source(),
            device_aliases: None,
            emulate_shutters: String::new(),
            emulate_switches: String::new(),
            schema_dump: None,
            zwave_logging: false,
            zwave_console_output: false,
        }
    }
}

impl Config {
    pub fn shutter_nodes(&self) -> Result<BTreeSet<u8>, BridgeError> {
        parse_node_list(&self.emulate_shutters)
    }

    pub fn switch_nodes(&self) -> Result<BTreeSet<u8>, BridgeError> {
        parse_node_list(&self.emulate_switches)
    }
}

/// Parse a comma-separated node id list. Blank items are skipped.
pub fn parse_node_list(raw: &str) -> Result<BTreeSet<u8>, BridgeError> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<u8>()
                .map_err(|_| BridgeError::Config(format!("invalid node id '{item}' in '{raw}'")))
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Host name
// ─────────────────────────────────────────────────────────────────────────────

fn hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_default()
}

/// `zwave.<short host name>`, the host name cut at its first dot.
pub(crate) fn xpl_source_for_host(host: &str) -> String {
    let short = host.trim().split('.').next().unwrap_or_default();
    if short.is_empty() {
        "zwave.bridge".to_string()
    } else {
        format!("zwave.{short}")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Loading
// ─────────────────────────────────────────────────────────────────────────────

/// Return the config path: `$ZWXPL_CONFIG`, else `~/.zwxpl/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV)
        && !path.is_empty()
    {
        return PathBuf::from(path);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".zwxpl").join("config.toml")
}

/// Load the config, falling back to defaults when no file exists, then apply
/// environment overrides.
pub fn load() -> Result<Config, BridgeError> {
    let mut cfg = load_from(&config_path())?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Load the config from a specific path.  Returns `None` if the file does
/// not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, BridgeError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        BridgeError::Config(format!("failed to read config at {}: {e}", path.display()))
    })?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| BridgeError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Apply `ZWXPL_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `ZWXPL_SERIAL_PORT` | `serial_port` |
/// | `ZWXPL_GATEWAY_URL` | `gateway_url` |
/// | `ZWXPL_BUS_PORT` | `bus_port` |
/// | `ZWXPL_XPL_SOURCE` | `xpl_source` |
/// | `ZWXPL_DEVICE_ALIASES` | `device_aliases` |
/// | `ZWXPL_EMULATE_SHUTTERS` | `emulate_shutters` |
/// | `ZWXPL_EMULATE_SWITCHES` | `emulate_switches` |
/// | `ZWXPL_SCHEMA_DUMP` | `schema_dump` |
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(cfg, |key| std::env::var(key).ok());
}

fn apply_overrides(cfg: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("ZWXPL_SERIAL_PORT") {
        cfg.serial_port = v;
    }
    if let Some(v) = var("ZWXPL_GATEWAY_URL") {
        cfg.gateway_url = v;
    }
    if let Some(v) = var("ZWXPL_BUS_PORT")
        && let Ok(port) = v.trim().parse::<u16>()
    {
        cfg.bus_port = port;
    }
    if let Some(v) = var("ZWXPL_XPL_SOURCE") {
        cfg.xpl_source = v;
    }
    if let Some(v) = var("ZWXPL_DEVICE_ALIASES") {
        cfg.device_aliases = Some(v);
    }
    if let Some(v) = var("ZWXPL_EMULATE_SHUTTERS") {
        cfg.emulate_shutters = v;
    }
    if let Some(v) = var("ZWXPL_EMULATE_SWITCHES") {
        cfg.emulate_switches = v;
    }
    if let Some(v) = var("ZWXPL_SCHEMA_DUMP") {
        cfg.schema_dump = Some(PathBuf::from(v));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn overrides(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.serial_port, "/dev/ttyACM0");
        assert_eq!(cfg.gateway_url, "ws://127.0.0.1:8091");
        assert_eq!(cfg.bus_port, 3865);
        assert!(cfg.xpl_source.starts_with("zwave."));
        assert!(cfg.device_aliases.is_none());
        assert!(cfg.shutter_nodes().unwrap().is_empty());
    }

    #[test]
    fn config_path_points_to_zwxpl_dir() {
        let p = config_path_for_home("/home/testuser");
        assert_eq!(p, PathBuf::from("/home/testuser/.zwxpl/config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn load_from_reads_partial_file_with_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
serial_port = "/dev/ttyUSB0"
emulate_shutters = "5, 6"
device_aliases = "5=salon/volet"
zwave_logging = true
"#,
        )
        .expect("write");

        let cfg = load_from(&path).expect("load ok").expect("some");
        assert_eq!(cfg.serial_port, "/dev/ttyUSB0");
        assert_eq!(cfg.bus_port, 3865);
        assert_eq!(cfg.shutter_nodes().unwrap(), BTreeSet::from([5, 6]));
        assert_eq!(cfg.device_aliases.as_deref(), Some("5=salon/volet"));
        assert!(cfg.zwave_logging);
        assert!(!cfg.zwave_console_output);
    }

    #[test]
    fn load_from_rejects_malformed_toml() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "bus_port = \"not a number\"").expect("write");
        assert!(matches!(load_from(&path), Err(BridgeError::Config(_))));
    }

    #[test]
    fn parse_node_list_is_lenient_about_blanks() {
        assert_eq!(parse_node_list("").unwrap(), BTreeSet::new());
        assert_eq!(parse_node_list(" 5 ,, 12,").unwrap(), BTreeSet::from([5, 12]));
    }

    #[test]
    fn parse_node_list_rejects_garbage() {
        assert!(matches!(parse_node_list("5,kitchen"), Err(BridgeError::Config(_))));
        assert!(matches!(parse_node_list("300"), Err(BridgeError::Config(_))));
    }

    #[test]
    fn xpl_source_uses_short_host_name() {
        assert_eq!(xpl_source_for_host("Salon-Pi.local"), "zwave.Salon-Pi");
        assert_eq!(xpl_source_for_host("gateway"), "zwave.gateway");
        assert_eq!(xpl_source_for_host(""), "zwave.bridge");
    }

    #[test]
    fn default_source_follows_system_host_name() {
        let host = hostname::get().expect("host name").into_string().expect("utf-8");
        assert_eq!(Config::default().xpl_source, xpl_source_for_host(&host));
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut cfg = Config::default();
        apply_overrides(
            &mut cfg,
            overrides(&[
                ("ZWXPL_SERIAL_PORT", "/dev/ttyAMA0"),
                ("ZWXPL_BUS_PORT", "4000"),
                ("ZWXPL_EMULATE_SWITCHES", "7"),
                ("ZWXPL_SCHEMA_DUMP", "/tmp/schema.csv"),
            ]),
        );
        assert_eq!(cfg.serial_port, "/dev/ttyAMA0");
        assert_eq!(cfg.bus_port, 4000);
        assert_eq!(cfg.switch_nodes().unwrap(), BTreeSet::from([7]));
        assert_eq!(cfg.schema_dump, Some(PathBuf::from("/tmp/schema.csv")));
    }

    #[test]
    fn overrides_ignore_invalid_port() {
        let mut cfg = Config::default();
        apply_overrides(&mut cfg, overrides(&[("ZWXPL_BUS_PORT", "not-a-port")]));
        assert_eq!(cfg.bus_port, 3865);
    }

    #[test]
    fn apply_env_overrides_reads_process_environment() {
        // SAFETY: no other test in this crate touches this variable.
        unsafe { std::env::set_var("ZWXPL_GATEWAY_URL", "ws://gateway:9000") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.gateway_url, "ws://gateway:9000");
        unsafe { std::env::remove_var("ZWXPL_GATEWAY_URL") };
    }
}
