use super::token::{DateFormat, LoggerPrecision, Token};
use crate::logging::level::Level;
use crate::thread;
use chrono::Local;

/// Everything a pattern needs to interpolate one record (spec §4.6.2).
/// Built once per `LogEx` call and handed to every appender that the
/// record reaches; each appender renders it through its own compiled
/// pattern (spec §3 "Appender... Internally owns: compiled pattern").
pub struct FormatInput<'a> {
    pub logger_name: &'a str,
    pub level: Level,
    pub file: &'a str,
    pub line: u32,
    pub message: &'a str,
    pub stack: Option<&'a str>,
}

/// Renders a compiled pattern against one record.
pub fn render(tokens: &[Token], input: &FormatInput<'_>) -> String {
    let mut out = String::new();
    for token in tokens {
        render_token(token, input, &mut out);
    }
    out
}

fn render_token(token: &Token, input: &FormatInput<'_>, out: &mut String) {
    match token {
        Token::Literal(s) => out.push_str(s),
        Token::Percent => out.push('%'),
        Token::LineSeparator => out.push('\n'),

        Token::Date { format, pad } => {
            let now = Local::now();
            let rendered = match format {
                DateFormat::Unix => now.timestamp().to_string(),
                other => now.format(other.strftime()).to_string(),
            };
            out.push_str(&pad.apply(&rendered));
        }

        Token::Millis { pad } => {
            let millis = Local::now().timestamp_subsec_millis();
            out.push_str(&pad.apply(&format!("{millis:03}")));
        }

        Token::Logger { precision, pad } => {
            out.push_str(&pad.apply(&render_logger_name(input.logger_name, precision)));
        }

        Token::Process { pad } => {
            out.push_str(&pad.apply(&std::process::id().to_string()));
        }

        Token::Thread { pad } => {
            let name = thread::current()
                .map(|d| d.name.clone())
                .unwrap_or_else(|| "unknown".to_string());
            out.push_str(&pad.apply(&name));
        }

        Token::File { pad } => {
            let base = input
                .file
                .rsplit(['/', '\\'])
                .next()
                .unwrap_or(input.file);
            out.push_str(&pad.apply(base));
        }

        Token::Line { pad } => {
            let rendered = if pad.zero_pad {
                format!("{:0width$}", input.line, width = pad.width.unwrap_or(0))
            } else {
                input.line.to_string()
            };
            out.push_str(&pad.apply(&rendered));
        }

        Token::Level { overrides, lowercase, pad } => {
            let mut name = overrides.get(&input.level).cloned().unwrap_or_else(|| input.level.name().to_string());
            if *lowercase {
                name = name.to_lowercase();
            }
            out.push_str(&pad.apply(&name));
        }

        Token::Message { pad } => out.push_str(&pad.apply(input.message)),

        Token::Env { name, pad } => {
            let value = std::env::var(name).unwrap_or_default();
            out.push_str(&pad.apply(&value));
        }

        Token::Stack { max_frames } => {
            if let Some(stack) = input.stack {
                out.push('\n');
                for line in stack.lines().take(*max_frames) {
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
    }
}

fn render_logger_name(name: &str, precision: &LoggerPrecision) -> String {
    let parts: Vec<&str> = name.split('.').collect();
    match precision {
        LoggerPrecision::Full => name.to_string(),
        LoggerPrecision::LastN(n) => {
            let n = (*n).min(parts.len());
            parts[parts.len() - n..].join(".")
        }
        LoggerPrecision::PerComponentWidths(widths) => {
            let last = parts.len().saturating_sub(1);
            parts
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    if i == last {
                        p.to_string()
                    } else {
                        let width = widths.get(i).copied().unwrap_or(p.len());
                        p.chars().take(width).collect::<String>()
                    }
                })
                .collect::<Vec<_>>()
                .join(".")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::pattern::compiler::compile;

    #[test]
    fn s2_scenario_formats_byte_for_byte() {
        let tokens = compile("[%5p] %c: %m%n").unwrap();
        let input = FormatInput {
            logger_name: "x",
            level: Level::Info,
            file: "main.rs",
            line: 1,
            message: "ok",
            stack: None,
        };
        assert_eq!(render(&tokens, &input), "[INFO ] x: ok\n");
    }

    #[test]
    fn s1_scenario_truncates_logger_name_to_last_two_components() {
        assert_eq!(render_logger_name("a.b.c.d", &LoggerPrecision::LastN(2)), "c.d");
    }

    #[test]
    fn file_token_strips_directory_components() {
        let tokens = compile("%F").unwrap();
        let input = FormatInput {
            logger_name: "x",
            level: Level::Debug,
            file: "/var/log/app/main.rs",
            line: 1,
            message: "",
            stack: None,
        };
        assert_eq!(render(&tokens, &input), "main.rs");
    }

    #[test]
    fn line_token_zero_pads_when_requested() {
        let tokens = compile("%04L").unwrap();
        let input =
            FormatInput { logger_name: "x", level: Level::Debug, file: "f", line: 7, message: "", stack: None };
        assert_eq!(render(&tokens, &input), "0007");
    }
}
