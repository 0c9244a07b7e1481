use super::token::{DateFormat, Justify, LoggerPrecision, PadSpec, Token};
use crate::common::{CmError, CmResult};
use crate::logging::level::Level;
use std::collections::HashMap;

/// Tokenizes a pattern string into a `Vec<Token>` (spec §4.6.1). A pattern
/// is a mix of literal text and `%`-escapes: `%`, optional padding spec
/// (`+`/`-`, optional leading `0`, width, optional `.maxwidth`), a token
/// name, and an optional `{extension}`.
pub fn compile(pattern: &str) -> CmResult<Vec<Token>> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut tokens = Vec::new();
    let mut literal = String::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '%' {
            literal.push(chars[i]);
            i += 1;
            continue;
        }

        if i + 1 < chars.len() && chars[i + 1] == '%' {
            literal.push('%');
            i += 2;
            continue;
        }

        if !literal.is_empty() {
            tokens.push(Token::Literal(std::mem::take(&mut literal)));
        }

        let (token, next) = compile_escape(&chars, i, pattern)?;
        tokens.push(token);
        i = next;
    }

    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }

    Ok(tokens)
}

fn compile_escape(chars: &[char], start: usize, pattern: &str) -> CmResult<(Token, usize)> {
    let mut i = start + 1; // skip '%'

    let justify = match chars.get(i) {
        Some('+') => {
            i += 1;
            Justify::Right
        }
        Some('-') => {
            i += 1;
            Justify::Left
        }
        _ => Justify::Right,
    };

    let zero_pad = chars.get(i) == Some(&'0');
    if zero_pad {
        i += 1;
    }

    let width = read_digits(chars, &mut i);

    let max_width = if chars.get(i) == Some(&'.') {
        i += 1;
        read_digits(chars, &mut i)
    } else {
        None
    };

    let pad = PadSpec { width, max_width, justify, zero_pad };

    let name_start = i;
    while i < chars.len() && (chars[i].is_ascii_alphabetic() || chars[i] == 'n') {
        i += 1;
    }
    if i == name_start {
        return Err(CmError::PatternCompile(format!("{pattern}: missing token name")));
    }
    let name: String = chars[name_start..i].iter().collect();

    let extension = if chars.get(i) == Some(&'{') {
        let close = find_matching_brace(chars, i)?;
        let ext: String = chars[i + 1..close].iter().collect();
        i = close + 1;
        Some(ext)
    } else {
        None
    };

    let token = build_token(&name, extension.as_deref(), pad, pattern)?;
    Ok((token, i))
}

fn read_digits(chars: &[char], i: &mut usize) -> Option<usize> {
    let start = *i;
    while *i < chars.len() && chars[*i].is_ascii_digit() {
        *i += 1;
    }
    if *i == start {
        None
    } else {
        chars[start..*i].iter().collect::<String>().parse().ok()
    }
}

fn find_matching_brace(chars: &[char], open: usize) -> CmResult<usize> {
    let mut depth = 0;
    for (offset, &c) in chars[open..].iter().enumerate() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(open + offset);
                }
            }
            _ => {}
        }
    }
    Err(CmError::PatternCompile("unterminated extension brace".to_string()))
}

fn build_token(name: &str, extension: Option<&str>, pad: PadSpec, pattern: &str) -> CmResult<Token> {
    Ok(match name {
        "d" | "date" => Token::Date { format: DateFormat::parse(extension.unwrap_or("")), pad },
        "q" | "Q" => Token::Millis { pad },
        "c" | "logger" => Token::Logger { precision: parse_logger_precision(extension), pad },
        "t" | "thread" => Token::Thread { pad },
        "P" | "process" => Token::Process { pad },
        "F" | "file" => Token::File { pad },
        "L" | "line" => Token::Line { pad },
        "p" | "level" => {
            let (overrides, lowercase) = parse_level_extension(extension)?;
            Token::Level { overrides, lowercase, pad }
        }
        "m" | "message" => Token::Message { pad },
        "env" => Token::Env { name: extension.unwrap_or_default().to_string(), pad },
        "ex" | "stack" => {
            let max_frames = extension.and_then(|s| s.parse().ok()).unwrap_or(usize::MAX);
            Token::Stack { max_frames }
        }
        "n" => Token::LineSeparator,
        other => return Err(CmError::PatternCompile(format!("{pattern}: unknown token '{other}'"))),
    })
}

fn parse_logger_precision(extension: Option<&str>) -> LoggerPrecision {
    let Some(ext) = extension else { return LoggerPrecision::Full };
    let parts: Vec<&str> = ext.split('.').filter(|p| !p.is_empty()).collect();
    match parts.len() {
        0 => LoggerPrecision::Full,
        1 => parts[0].parse().map(LoggerPrecision::LastN).unwrap_or(LoggerPrecision::Full),
        _ => {
            let widths: Vec<usize> = parts.iter().filter_map(|p| p.parse().ok()).collect();
            LoggerPrecision::PerComponentWidths(widths)
        }
    }
}

fn parse_level_extension(extension: Option<&str>) -> CmResult<(HashMap<Level, String>, bool)> {
    let mut overrides = HashMap::new();
    let mut lowercase = false;

    let Some(ext) = extension else { return Ok((overrides, lowercase)) };
    for entry in ext.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((key, value)) = entry.split_once('=') else { continue };
        match key {
            "length" => {}
            "lowerCase" => lowercase = value.eq_ignore_ascii_case("true"),
            raw => {
                if let Ok(level) = raw.parse::<Level>() {
                    overrides.insert(level, value.to_string());
                }
            }
        }
    }
    Ok((overrides, lowercase))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_literal_and_simple_tokens() {
        let tokens = compile("[%5p] %c: %m%n").unwrap();
        assert!(matches!(tokens[0], Token::Literal(ref s) if s == "["));
        assert!(matches!(tokens[1], Token::Level { .. }));
    }

    #[test]
    fn compiles_padding_and_truncation_spec() {
        let tokens = compile("%-15.15F").unwrap();
        match &tokens[0] {
            Token::File { pad } => {
                assert_eq!(pad.width, Some(15));
                assert_eq!(pad.max_width, Some(15));
                assert_eq!(pad.justify, Justify::Left);
            }
            other => panic!("unexpected token {other:?}"),
        }
    }

    #[test]
    fn compiles_logger_precision_extension() {
        let tokens = compile("%c{2}").unwrap();
        assert!(matches!(&tokens[0], Token::Logger { precision: LoggerPrecision::LastN(2), .. }));
    }

    #[test]
    fn escaped_percent_becomes_a_literal() {
        let tokens = compile("100%%").unwrap();
        assert!(matches!(&tokens[0], Token::Literal(s) if s == "100%"));
    }

    #[test]
    fn rejects_unknown_token_name() {
        assert!(compile("%z").is_err());
    }
}
