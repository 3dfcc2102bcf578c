use std::{
    collections::HashMap,
    env,
    fs,
    io::{BufRead, BufReader},
    path::PathBuf,
    time::Duration,
};

use directories::BaseDirs;

use crate::pipeline::WireSchema;

#[derive(Debug, Clone)]
pub struct Config {
    inner: HashMap<String, String>,
    pub config_path: PathBuf,
}

impl Config {
    pub fn load() -> Self {
        let config_path = default_config_path();

        // Read .khawarizmirc if exists
        let mut rc_lines = Vec::new();
        if config_path.exists() {
            if let Ok(file) = fs::File::open(&config_path) {
                let reader = BufReader::new(file);
                rc_lines.extend(reader.lines().map_while(Result::ok));
            }
        }

        Self::from_layers(rc_lines, env::vars(), config_path)
    }

    /// Defaults, then rc lines, then environment variables. A
    /// `KHAWARIZMI_<KEY>` variable sets `<KEY>` and wins over a plain `<KEY>`.
    pub fn from_layers<L, E>(rc_lines: L, env_vars: E, config_path: PathBuf) -> Self
    where
        L: IntoIterator,
        L::Item: AsRef<str>,
        E: IntoIterator<Item = (String, String)>,
    {
        let mut map = default_map();
        for line in rc_lines {
            if let Some((k, v)) = parse_line(line.as_ref()) {
                map.insert(k, v);
            }
        }

        // Overlay environment variables (take precedence)
        let mut prefixed = Vec::new();
        for (k, v) in env_vars {
            if let Some(key) = k.strip_prefix(ENV_PREFIX) {
                if !key.is_empty() {
                    prefixed.push((key.to_string(), v));
                }
            } else if is_config_key(&k) {
                map.insert(k, v);
            }
        }
        map.extend(prefixed);

        Self { inner: map, config_path }
    }

    /// Build a config from defaults plus explicit overrides, without touching
    /// the rc file or the environment.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = default_map();
        for (k, v) in pairs {
            map.insert(k.into(), v.into());
        }
        Self { inner: map, config_path: default_config_path() }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).cloned()
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.trim().parse::<u64>().ok())
    }

    pub fn pipeline_url(&self) -> String {
        self.get("PIPELINE_URL")
            .unwrap_or_else(|| DEFAULT_PIPELINE_URL.to_string())
    }

    pub fn default_model(&self) -> String {
        self.get("DEFAULT_MODEL")
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    /// Unknown schema names fall back to the default shape.
    pub fn wire_schema(&self) -> WireSchema {
        self.get("WIRE_SCHEMA")
            .and_then(|s| s.parse::<WireSchema>().ok())
            .unwrap_or_default()
    }

    /// `None` unless a positive `REQUEST_TIMEOUT` (seconds) is configured.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.get_u64("REQUEST_TIMEOUT")
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn export_path(&self) -> PathBuf {
        self.get("EXPORT_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| env::temp_dir().join("khawarizmi").join("report.html"))
    }
}

const DEFAULT_PIPELINE_URL: &str = "http://localhost:8000/pipeline";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

fn parse_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (k, v) = line.split_once('=')?;
    Some((k.trim().to_string(), v.trim().to_string()))
}

const ENV_PREFIX: &str = "KHAWARIZMI_";

/// Unprefixed environment variables that override config.
fn is_config_key(k: &str) -> bool {
    const KEYS: &[&str] = &[
        "PIPELINE_URL",
        "DEFAULT_MODEL",
        "WIRE_SCHEMA",
        "REQUEST_TIMEOUT",
        "EXPORT_PATH",
        "PRETTIFY_MARKDOWN",
        "DEFAULT_COLOR",
    ];

    KEYS.contains(&k)
}

fn default_config_path() -> PathBuf {
    let base = BaseDirs::new()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.config"));
    base.join("khawarizmi").join(".khawarizmirc")
}

fn default_map() -> HashMap<String, String> {
    let mut m = HashMap::new();

    // Strings
    m.insert("PIPELINE_URL".into(), DEFAULT_PIPELINE_URL.into());
    m.insert("DEFAULT_MODEL".into(), DEFAULT_MODEL.into());
    m.insert("WIRE_SCHEMA".into(), "split".into());
    m.insert("DEFAULT_COLOR".into(), "magenta".into());

    // Numbers
    m.insert("REQUEST_TIMEOUT".into(), "0".into());

    // Bools as strings
    m.insert("PRETTIFY_MARKDOWN".into(), "true".into());

    m
}
