// ABOUTME: Syntax highlighter for the REPL with color support
// Implements rustyline's Highlighter trait to provide ANSI color codes
// for rill syntax elements while preserving display width

use rustyline::highlight::{CmdKind, Highlighter};
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use std::borrow::Cow;

// ANSI color codes (3-bit/4-bit colors for maximum terminal compatibility)
const COLOR_RESET: &str = "\x1b[0m";
const COLOR_OPERATOR: &str = "\x1b[1;34m"; // Bold blue
const COLOR_RESERVED: &str = "\x1b[1;35m"; // Bold magenta
const COLOR_VARIABLE: &str = "\x1b[36m"; // Cyan
const COLOR_NUMBER: &str = "\x1b[33m"; // Yellow
const COLOR_STRING: &str = "\x1b[32m"; // Green
const COLOR_COMMENT: &str = "\x1b[90m"; // Bright black (gray)

const RESERVED: [&str; 11] = [
    "pass", "break", "continue", "error", "each", "map", "filter", "fold", "true", "false", "null",
];

/// REPL helper: highlighting only, no completion or hints.
#[derive(Completer, Helper, Hinter, Validator)]
pub struct RillHelper;

impl Highlighter for RillHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let highlighted = highlight_line(line);
        if highlighted == line {
            Cow::Borrowed(line)
        } else {
            Cow::Owned(highlighted)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

fn highlight_line(line: &str) -> String {
    let mut result = String::new();
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '/' if chars.get(i + 1) == Some(&'/') => {
                result.push_str(COLOR_COMMENT);
                while i < chars.len() {
                    result.push(chars[i]);
                    i += 1;
                }
                result.push_str(COLOR_RESET);
            }
            '"' => {
                result.push_str(COLOR_STRING);
                result.push('"');
                i += 1;
                while i < chars.len() {
                    if chars[i] == '\\' && i + 1 < chars.len() {
                        result.push(chars[i]);
                        result.push(chars[i + 1]);
                        i += 2;
                    } else if chars[i] == '"' {
                        result.push('"');
                        i += 1;
                        break;
                    } else {
                        result.push(chars[i]);
                        i += 1;
                    }
                }
                result.push_str(COLOR_RESET);
            }
            '0'..='9' => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                if i + 1 < chars.len() && chars[i] == '.' && chars[i + 1].is_ascii_digit() {
                    i += 1;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                result.push_str(COLOR_NUMBER);
                result.extend(&chars[start..i]);
                result.push_str(COLOR_RESET);
            }
            '$' => {
                let start = i;
                i += 1;
                if chars.get(i) == Some(&'@') {
                    i += 1;
                } else {
                    while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                        i += 1;
                    }
                }
                result.push_str(COLOR_VARIABLE);
                result.extend(&chars[start..i]);
                result.push_str(COLOR_RESET);
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                if RESERVED.contains(&word.as_str()) {
                    result.push_str(COLOR_RESERVED);
                    result.push_str(&word);
                    result.push_str(COLOR_RESET);
                } else {
                    result.push_str(&word);
                }
            }
            '-' if chars.get(i + 1) == Some(&'>') => {
                result.push_str(COLOR_OPERATOR);
                result.push_str("->");
                result.push_str(COLOR_RESET);
                i += 2;
            }
            ':' | '?' | '=' if chars.get(i + 1) == Some(&'>') => {
                result.push_str(COLOR_OPERATOR);
                result.push(chars[i]);
                result.push('>');
                result.push_str(COLOR_RESET);
                i += 2;
            }
            c => {
                result.push(c);
                i += 1;
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_highlighting() {
        assert!(highlight_line("42").contains(COLOR_NUMBER));
    }

    #[test]
    fn test_string_highlighting() {
        assert!(highlight_line("\"hello\"").contains(COLOR_STRING));
    }

    #[test]
    fn test_variable_highlighting() {
        assert!(highlight_line("$x").contains(COLOR_VARIABLE));
        assert!(highlight_line("$@").contains(COLOR_VARIABLE));
    }

    #[test]
    fn test_reserved_word_highlighting() {
        assert!(highlight_line("pass").contains(COLOR_RESERVED));
        assert!(highlight_line("each").contains(COLOR_RESERVED));
    }

    #[test]
    fn test_pipe_operator_highlighting() {
        assert!(highlight_line("1 -> $f").contains(COLOR_OPERATOR));
        assert!(highlight_line("1 :> $x").contains(COLOR_OPERATOR));
    }

    #[test]
    fn test_comment_highlighting() {
        assert!(highlight_line("// note").contains(COLOR_COMMENT));
    }

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(highlight_line("foo bar"), "foo bar");
    }
}
