use super::appender::{Appender, AppenderList};
use super::level::Level;
use super::pattern::FormatInput;
use std::collections::HashMap;
use std::sync::Arc;

/// A configured logger produced by configuration (spec §3 "ConfLogger").
/// An empty `name` is the root logger. Each appender owns and renders with
/// its own compiled pattern (spec §3 "Appender... Internally owns: compiled
/// pattern"), so `ConfLogger` itself carries no pattern.
pub struct ConfLogger {
    pub name: String,
    pub level: Level,
    pub additive: bool,
    pub appenders_by_level: HashMap<Level, AppenderList>,
}

impl ConfLogger {
    /// Dispatches to every appender registered for `level` or a level
    /// below it that also accepts `level` (spec §4.6.3: a configured
    /// logger's own `level` gates whether it participates at all; once it
    /// does, it writes to the appenders configured for that level).
    /// Returns whether it produced any output, so the caller can honor
    /// non-additive short-circuiting.
    fn log(&self, input: &FormatInput<'_>) -> bool {
        if input.level < self.level {
            return false;
        }
        let Some(appenders) = self.appenders_by_level.get(&input.level) else { return false };
        if appenders.is_empty() {
            return false;
        }
        for appender in appenders {
            if let Err(err) = appender.append(input) {
                tracing::error!(appender = appender.name(), error = %err, "appender failed to write a record");
            }
        }
        true
    }
}

/// The user-facing logger handle (spec §3 "Logger"): a dotted name, a
/// precomputed minimum effective level, and the ordered list of
/// `ConfLogger`s that apply to it (longest-matching-name first).
pub struct Logger {
    pub name: String,
    min_level: Level,
    matching: Vec<Arc<ConfLogger>>,
}

impl Logger {
    /// `all_conf_loggers` must already be sorted longest-name-first, ties
    /// broken by configuration order (the Open Question resolution
    /// recorded in DESIGN.md).
    pub fn new(name: impl Into<String>, all_conf_loggers: &[Arc<ConfLogger>]) -> Self {
        let name = name.into();
        let matching: Vec<Arc<ConfLogger>> =
            all_conf_loggers.iter().filter(|c| is_prefix(&c.name, &name)).cloned().collect();
        let min_level = matching.iter().map(|c| c.level).min().unwrap_or(Level::Fatal);
        Self { name, min_level, matching }
    }

    pub fn min_level(&self) -> Level {
        self.min_level
    }

    /// Spec §4.6.3 `LogEx`: returns immediately if `level` is below this
    /// logger's cached minimum. Otherwise renders the message once and
    /// walks the matching `ConfLogger`s longest-name-first, stopping at
    /// the first non-additive logger that produced output.
    #[allow(clippy::too_many_arguments)]
    pub fn log_ex(&self, level: Level, file: &str, line: u32, print_stack: bool, message: &str) {
        if level < self.min_level {
            return;
        }

        // Open Question (spec §9): `printStack=true` captures the stack
        // unconditionally, even if no enabled appender ends up using it —
        // preserved rather than hoisted past the appender scan, matching
        // the documented behavior.
        let stack = if print_stack { Some(capture_stack()) } else { None };

        let input = FormatInput {
            logger_name: &self.name,
            level,
            file,
            line,
            message,
            stack: stack.as_deref(),
        };

        for conf in &self.matching {
            let produced = conf.log(&input);
            if produced && !conf.additive {
                break;
            }
        }
    }
}

fn capture_stack() -> String {
    format!("{:?}", backtrace::Backtrace::new())
}

/// `prefix` is a dotted-name prefix of `name` at a component boundary:
/// `""` matches everything; `"a.b"` matches `"a.b"` and `"a.b.c"` but not
/// `"a.bc"`.
fn is_prefix(prefix: &str, name: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    if prefix == name {
        return true;
    }
    name.starts_with(prefix) && name.as_bytes().get(prefix.len()) == Some(&b'.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::appender::ConsoleAppender;

    fn conf(name: &str, level: Level, additive: bool, order_tag: usize) -> Arc<ConfLogger> {
        let _ = order_tag;
        let mut by_level = HashMap::new();
        by_level.insert(level, vec![ConsoleAppender::new(format!("console-{name}-{order_tag}"), false) as Arc<dyn Appender>]);
        Arc::new(ConfLogger { name: name.to_string(), level, additive, appenders_by_level: by_level })
    }

    #[test]
    fn matching_loggers_are_longest_prefix_first() {
        let root = conf("", Level::Debug, true, 0);
        let a = conf("a", Level::Debug, true, 1);
        let a_b = conf("a.b", Level::Debug, true, 2);
        let logger = Logger::new("a.b.c", &[root.clone(), a.clone(), a_b.clone()]);
        let names: Vec<_> = logger.matching.iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["a.b".to_string(), "a".to_string(), "".to_string()]);
    }

    #[test]
    fn prefix_must_land_on_a_component_boundary() {
        assert!(is_prefix("a.b", "a.b.c"));
        assert!(!is_prefix("a.b", "a.bc"));
        assert!(is_prefix("", "anything"));
    }

    #[test]
    fn min_level_is_the_minimum_over_matching_conf_loggers() {
        let root = conf("", Level::Warn, true, 0);
        let a = conf("a", Level::Trace, true, 1);
        let logger = Logger::new("a.b", &[root, a]);
        assert_eq!(logger.min_level(), Level::Trace);
    }

    #[test]
    fn non_additive_logger_stops_further_propagation() {
        let root = conf("", Level::Debug, true, 0);
        let a = conf("a", Level::Debug, false, 1);
        let logger = Logger::new("a", &[root, a]);
        // "a" is listed first (longer name), matches, and is non-additive,
        // so iteration stops right after it without reaching root.
        assert_eq!(logger.matching.len(), 2);
        logger.log_ex(Level::Info, "f.rs", 1, false, "hello");
    }
}
