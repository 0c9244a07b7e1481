use crate::logging::level::Level;
use std::collections::HashMap;

/// Left/right justification applied once a token has produced text (spec
/// §4.6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Justify {
    Left,
    Right,
}

/// Shared padding/truncation spec parsed off every `%`-escape, independent
/// of which token it decorates.
#[derive(Debug, Clone, Copy, Default)]
pub struct PadSpec {
    pub width: Option<usize>,
    pub max_width: Option<usize>,
    pub justify: Justify,
    pub zero_pad: bool,
}

impl Default for Justify {
    fn default() -> Self { Justify::Right }
}

impl PadSpec {
    /// Applies width/truncation to `text`: truncate first (keeping the
    /// side away from the padding direction), then pad to `width`.
    pub fn apply(&self, text: &str) -> String {
        let mut s = text.to_string();

        if let Some(max) = self.max_width {
            if s.chars().count() > max {
                let chars: Vec<char> = s.chars().collect();
                s = match self.justify {
                    Justify::Right => chars[chars.len() - max..].iter().collect(),
                    Justify::Left => chars[..max].iter().collect(),
                };
            }
        }

        if let Some(width) = self.width {
            let len = s.chars().count();
            if len < width {
                let fill = width - len;
                let pad_char = if self.zero_pad { '0' } else { ' ' };
                let padding: String = std::iter::repeat(pad_char).take(fill).collect();
                s = match self.justify {
                    Justify::Right => format!("{padding}{s}"),
                    Justify::Left => format!("{s}{padding}"),
                };
            }
        }

        s
    }
}

/// A named, `strftime`-compatible preset, or a literal format string
/// (spec §4.6.1, `date{fmt}`).
#[derive(Debug, Clone)]
pub enum DateFormat {
    Default,
    Iso8601,
    Iso8601Basic,
    Absolute,
    Date,
    Compact,
    General,
    Unix,
    Custom(String),
}

impl DateFormat {
    pub fn parse(spec: &str) -> Self {
        match spec {
            "" | "DEFAULT" => DateFormat::Default,
            "ISO8601" => DateFormat::Iso8601,
            "ISO8601_BASIC" => DateFormat::Iso8601Basic,
            "ABSOLUTE" => DateFormat::Absolute,
            "DATE" => DateFormat::Date,
            "COMPACT" => DateFormat::Compact,
            "GENERAL" => DateFormat::General,
            "UNIX" => DateFormat::Unix,
            other => DateFormat::Custom(other.to_string()),
        }
    }

    pub fn strftime(&self) -> &str {
        match self {
            DateFormat::Default => "%Y-%m-%d %H:%M:%S%.3f",
            DateFormat::Iso8601 => "%Y-%m-%dT%H:%M:%S%.3f",
            DateFormat::Iso8601Basic => "%Y%m%dT%H%M%S%.3f",
            DateFormat::Absolute => "%H:%M:%S%.3f",
            DateFormat::Date => "%d %b %Y %H:%M:%S%.3f",
            DateFormat::Compact => "%y%m%d %H%M%S",
            DateFormat::General => "%Y-%m-%d %H:%M:%S",
            DateFormat::Unix => "%s",
            DateFormat::Custom(s) => s,
        }
    }
}

/// `logger{a.b}` precision: 0 components means "full dotted name", 1 means
/// "last N components", 2+ means per-component truncation widths (spec
/// §4.6.1).
#[derive(Debug, Clone, Default)]
pub enum LoggerPrecision {
    #[default]
    Full,
    LastN(usize),
    PerComponentWidths(Vec<usize>),
}

/// One element of a compiled pattern (spec §3 "Compiled pattern").
#[derive(Debug, Clone)]
pub enum Token {
    Literal(String),
    Date { format: DateFormat, pad: PadSpec },
    Millis { pad: PadSpec },
    Logger { precision: LoggerPrecision, pad: PadSpec },
    Thread { pad: PadSpec },
    Process { pad: PadSpec },
    File { pad: PadSpec },
    Line { pad: PadSpec },
    Level { overrides: HashMap<Level, String>, lowercase: bool, pad: PadSpec },
    Message { pad: PadSpec },
    Env { name: String, pad: PadSpec },
    Stack { max_frames: usize },
    LineSeparator,
    Percent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_spec_right_justifies_with_spaces() {
        let pad = PadSpec { width: Some(5), max_width: None, justify: Justify::Right, zero_pad: false };
        assert_eq!(pad.apply("ab"), "   ab");
    }

    #[test]
    fn pad_spec_left_justifies_and_truncates() {
        let pad = PadSpec { width: Some(5), max_width: Some(3), justify: Justify::Left, zero_pad: false };
        assert_eq!(pad.apply("abcdef"), "abc  ");
    }

    #[test]
    fn date_format_presets_resolve() {
        assert_eq!(DateFormat::parse("ISO8601").strftime(), "%Y-%m-%dT%H:%M:%S%.3f");
        matches!(DateFormat::parse("%H"), DateFormat::Custom(_));
    }
}
