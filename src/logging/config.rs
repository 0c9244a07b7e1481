use super::appender::{Appender, ConsoleAppender, FileAppender, RollTerm, RollingFileAppender, SocketAppender};
use super::level::Level;
use super::logger::ConfLogger;
use super::pattern::{Pattern, DEFAULT_PATTERN};
use crate::common::{CmError, CmResult};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

const ENV_VAR: &str = "CMUTIL_LOG_CONFIG";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
struct RawAppenderConfig {
    #[serde(rename = "type")]
    kind: String,
    name: String,
    pattern: Option<String>,
    #[serde(default)]
    r#async: bool,
    #[serde(default, rename = "asyncbuffersize")]
    async_buffer_size: Option<usize>,
    #[serde(default, rename = "usestderr")]
    use_stderr: bool,
    filename: Option<String>,
    #[serde(default, rename = "rollterm")]
    roll_term: Option<String>,
    #[serde(rename = "filepattern")]
    file_pattern: Option<String>,
    #[serde(rename = "listenport")]
    listen_port: Option<u16>,
    #[serde(default = "default_accept_host", rename = "accepthost")]
    accept_host: String,
}

fn default_accept_host() -> String {
    "0.0.0.0".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAppenderRef {
    Name(String),
    WithLevel { r#ref: String, level: Option<String> },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAppenderRefs {
    One(RawAppenderRef),
    Many(Vec<RawAppenderRef>),
}

#[derive(Debug, Deserialize)]
struct RawLoggerConfig {
    #[serde(rename = "type")]
    kind: Option<String>,
    name: Option<String>,
    level: String,
    #[serde(default = "default_additivity")]
    additivity: bool,
    #[serde(rename = "appenderref")]
    appender_ref: Option<RawAppenderRefs>,
}

fn default_additivity() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct RawRoot {
    #[serde(default)]
    appenders: Vec<RawAppenderConfig>,
    #[serde(default)]
    loggers: Vec<RawLoggerConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDocument {
    Wrapped { configuration: RawRoot },
    Bare(RawRoot),
}

/// Every named appender plus every configured logger, ready to back
/// `Logger` lookups (spec §6, §4.6.3).
pub struct LogConfiguration {
    pub appenders: HashMap<String, Arc<dyn Appender>>,
    pub conf_loggers: Vec<Arc<ConfLogger>>,
}

/// Loads the configuration named by `CMUTIL_LOG_CONFIG`. On any failure
/// (missing env var, unreadable file, parse error, unknown appender
/// reference) falls back to a console-only root logger at DEBUG with the
/// default pattern, printing a single notice to stdout (spec §6, §7 "Log
/// configuration failure").
pub fn load_from_env() -> LogConfiguration {
    match try_load_from_env() {
        Ok(config) => config,
        Err(err) => {
            println!("log configuration failed ({err}); falling back to console/DEBUG default");
            fallback_configuration()
        }
    }
}

fn try_load_from_env() -> CmResult<LogConfiguration> {
    let path = std::env::var(ENV_VAR).map_err(|_| CmError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, ENV_VAR)))?;
    load_from_path(&path)
}

/// Loads and parses a specific configuration file (exposed directly so
/// callers and tests don't have to go through the environment variable).
pub fn load_from_path(path: &str) -> CmResult<LogConfiguration> {
    let text = std::fs::read_to_string(path)?;
    parse(&text, path)
}

fn parse(text: &str, path: &str) -> CmResult<LogConfiguration> {
    let lowered = lowercase_keys(text, path)?;
    let doc: RawDocument = serde_json::from_value(lowered)
        .map_err(|source| CmError::ConfigParse { path: path.into(), source })?;
    let root = match doc {
        RawDocument::Wrapped { configuration } => configuration,
        RawDocument::Bare(root) => root,
    };
    build(root, path)
}

/// Configuration keys are case-insensitive (spec §6); `serde`'s
/// `rename_all` only covers the fixed field names we know about, so this
/// walks the parsed `serde_json::Value` and lowercases every object key
/// before the typed deserialize pass.
fn lowercase_keys(text: &str, path: &str) -> CmResult<serde_json::Value> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|source| CmError::ConfigParse { path: path.into(), source })?;
    Ok(lowercase_value(value))
}

fn lowercase_value(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                out.insert(k.to_lowercase(), lowercase_value(v));
            }
            serde_json::Value::Object(out)
        }
        serde_json::Value::Array(items) => serde_json::Value::Array(items.into_iter().map(lowercase_value).collect()),
        other => other,
    }
}

fn build(root: RawRoot, path: &str) -> CmResult<LogConfiguration> {
    let mut appenders: HashMap<String, Arc<dyn Appender>> = HashMap::new();

    for raw in &root.appenders {
        let pattern = Pattern::compile(raw.pattern.as_deref().unwrap_or(DEFAULT_PATTERN))?;
        let appender = build_appender(raw, pattern)?;
        if raw.r#async {
            appender.set_async(raw.async_buffer_size.unwrap_or(10));
        }
        appenders.insert(raw.name.clone(), appender);
    }

    let mut conf_loggers = Vec::new();
    for raw in &root.loggers {
        let name = if raw.kind.as_deref() == Some("root") {
            String::new()
        } else {
            raw.name.clone().unwrap_or_default()
        };
        let level: Level = raw.level.parse()?;

        let refs = appender_refs(raw.appender_ref.as_ref());
        let mut appenders_by_level: HashMap<Level, super::appender::AppenderList> = HashMap::new();
        for (ref_name, ref_level) in &refs {
            let Some(appender) = appenders.get(ref_name) else {
                return Err(CmError::UnknownAppender { path: path.into(), name: ref_name.clone() });
            };
            let min_level = ref_level.unwrap_or(level);
            for candidate in Level::ALL.iter().filter(|l| **l >= min_level) {
                appenders_by_level.entry(*candidate).or_default().push(Arc::clone(appender));
            }
        }

        conf_loggers.push(Arc::new(ConfLogger { name, level, additive: raw.additivity, appenders_by_level }));
    }

    // Longest-name-first; `sort_by` is stable, so ties keep configuration
    // order (Open Question resolution, see DESIGN.md).
    conf_loggers.sort_by(|a, b| b.name.len().cmp(&a.name.len()));

    Ok(LogConfiguration { appenders, conf_loggers })
}

fn appender_refs(raw: Option<&RawAppenderRefs>) -> Vec<(String, Option<Level>)> {
    let to_pair = |r: &RawAppenderRef| match r {
        RawAppenderRef::Name(name) => (name.clone(), None),
        RawAppenderRef::WithLevel { r#ref, level } => {
            (r#ref.clone(), level.as_deref().and_then(|s| s.parse().ok()))
        }
    };
    match raw {
        None => Vec::new(),
        Some(RawAppenderRefs::One(r)) => vec![to_pair(r)],
        Some(RawAppenderRefs::Many(items)) => items.iter().map(to_pair).collect(),
    }
}

fn build_appender(raw: &RawAppenderConfig, pattern: Pattern) -> CmResult<Arc<dyn Appender>> {
    Ok(match raw.kind.as_str() {
        "console" => ConsoleAppender::with_pattern(raw.name.clone(), raw.use_stderr, pattern),
        "file" => {
            let filename = raw.filename.clone().ok_or_else(|| CmError::ConfigInvalid {
                path: std::path::PathBuf::new(),
                reason: format!("appender {:?} of type file requires filename", raw.name),
            })?;
            FileAppender::with_pattern(raw.name.clone(), filename, pattern)
        }
        "rollingfile" => {
            let filename = raw.filename.clone().unwrap_or_default();
            let roll_term = match raw.roll_term.as_deref().unwrap_or("date") {
                "year" => RollTerm::Year,
                "month" => RollTerm::Month,
                "hour" => RollTerm::Hour,
                "minute" => RollTerm::Minute,
                _ => RollTerm::Date,
            };
            RollingFileAppender::with_pattern(raw.name.clone(), filename, roll_term, raw.file_pattern.clone(), pattern)
        }
        "socket" => {
            let port = raw.listen_port.unwrap_or(0);
            SocketAppender::with_pattern(raw.name.clone(), &raw.accept_host, port, pattern)?
        }
        other => {
            return Err(CmError::ConfigInvalid {
                path: std::path::PathBuf::new(),
                reason: format!("unknown appender type {other:?}"),
            })
        }
    })
}

fn fallback_configuration() -> LogConfiguration {
    let console = ConsoleAppender::new("console", false) as Arc<dyn Appender>;
    let mut appenders = HashMap::new();
    appenders.insert("console".to_string(), Arc::clone(&console));

    let mut appenders_by_level: HashMap<Level, super::appender::AppenderList> = HashMap::new();
    for level in Level::ALL.iter().filter(|l| **l >= Level::Debug) {
        appenders_by_level.insert(*level, vec![Arc::clone(&console)]);
    }

    let root =
        Arc::new(ConfLogger { name: String::new(), level: Level::Debug, additive: true, appenders_by_level });

    LogConfiguration { appenders, conf_loggers: vec![root] }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;

    #[test]
    fn fallback_configuration_has_a_console_root_logger_at_debug() {
        let config = fallback_configuration();
        assert_eq!(config.conf_loggers.len(), 1);
        assert_eq!(config.conf_loggers[0].level, Level::Debug);
        assert!(config.appenders.contains_key("console"));
    }

    #[test]
    fn loads_a_minimal_json_configuration_case_insensitively() {
        let json = r#"
        {
            "Configuration": {
                "Appenders": [
                    { "Type": "console", "Name": "out" }
                ],
                "Loggers": [
                    { "Type": "root", "Level": "INFO", "AppenderRef": "out" }
                ]
            }
        }
        "#;
        let config = parse(json, "test.json").unwrap();
        assert!(config.appenders.contains_key("out"));
        assert_eq!(config.conf_loggers.len(), 1);
        assert_eq!(config.conf_loggers[0].level, Level::Info);
    }

    #[test]
    fn unknown_appender_reference_is_an_error() {
        let json = r#"{"appenders":[],"loggers":[{"type":"root","level":"INFO","appenderref":"missing"}]}"#;
        let result = parse(json, "test.json");
        assert!(matches!(result, Err(CmError::UnknownAppender { .. })));
    }

    #[test]
    fn ordering_is_longest_name_first() {
        let json = r#"
        {
            "appenders": [{"type":"console","name":"out"}],
            "loggers": [
                {"type":"root","level":"INFO","appenderref":"out"},
                {"type":"logger","name":"a.b","level":"DEBUG","appenderref":"out"},
                {"type":"logger","name":"a","level":"DEBUG","appenderref":"out"}
            ]
        }
        "#;
        let config = parse(json, "test.json").unwrap();
        let names: Vec<_> = config.conf_loggers.iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["a.b".to_string(), "a".to_string(), "".to_string()]);
    }

    // Mutates the process environment, so this must not interleave with
    // any other test that touches `CMUTIL_LOG_CONFIG`.
    #[test]
    #[serial]
    fn load_from_env_falls_back_when_the_env_var_is_unset() {
        std::env::remove_var(ENV_VAR);
        let config = load_from_env();
        assert_eq!(config.conf_loggers.len(), 1);
        assert_eq!(config.conf_loggers[0].level, Level::Debug);
    }

    #[test]
    #[serial]
    fn load_from_env_reads_the_file_named_by_the_env_var() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");
        std::fs::write(
            &path,
            r#"{"appenders":[{"type":"console","name":"out"}],"loggers":[{"type":"root","level":"WARN","appenderref":"out"}]}"#,
        )
        .unwrap();
        std::env::set_var(ENV_VAR, &path);

        let config = load_from_env();
        assert_eq!(config.conf_loggers.len(), 1);
        assert_eq!(config.conf_loggers[0].level, Level::Warn);

        std::env::remove_var(ENV_VAR);
    }
}
