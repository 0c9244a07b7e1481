use std::str::FromStr;

/// The six log levels (spec §6), ascending severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Level {
    pub fn name(self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        }
    }

    pub const ALL: [Level; 6] =
        [Level::Trace, Level::Debug, Level::Info, Level::Warn, Level::Error, Level::Fatal];
}

impl FromStr for Level {
    type Err = crate::common::CmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Level::Trace),
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "fatal" => Ok(Level::Fatal),
            other => Err(crate::common::CmError::UnknownLevel(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn levels_are_ascending() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Error < Level::Fatal);
    }

    #[test_case("trace", Level::Trace ; "lowercase")]
    #[test_case("WARN", Level::Warn   ; "uppercase")]
    #[test_case("Fatal", Level::Fatal ; "mixed case")]
    fn parses_case_insensitively(input: &str, expected: Level) {
        assert_eq!(input.parse::<Level>().unwrap(), expected);
    }

    #[test]
    fn rejects_unknown_level_names() {
        assert!("verbose".parse::<Level>().is_err());
    }
}
