//! Report body splitting and per-line tokenization.
//!
//! A line is a comma-separated list of fields. A backslash escapes the
//! character that follows it, whitespace after a delimiter is skipped, and a
//! field that opens with a double quote runs to its closing quote. Every
//! token is trimmed before it is returned.

use crate::error::LineError;

const DELIMITER: char = ',';
const ESCAPE: char = '\\';
const QUOTE: char = '"';
const BOM: char = '\u{feff}';

/// Remove a single leading byte-order mark, if present.
pub fn strip_bom(text: &str) -> &str {
    text.strip_prefix(BOM).unwrap_or(text)
}

/// Iterate over the lines of a report body.
///
/// Recognizes `\n`, `\r\n` and a lone `\r` as terminators. A terminator at
/// the very end of the text does not produce a trailing empty line.
pub fn report_lines(text: &str) -> ReportLines<'_> {
    ReportLines { rest: text }
}

/// Iterator returned by [`report_lines`].
#[derive(Debug, Clone)]
pub struct ReportLines<'a> {
    rest: &'a str,
}

impl<'a> Iterator for ReportLines<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.rest.is_empty() {
            return None;
        }
        match self.rest.find(['\n', '\r']) {
            Some(pos) => {
                let line = &self.rest[..pos];
                let after = &self.rest[pos..];
                let skip = if after.starts_with("\r\n") { 2 } else { 1 };
                self.rest = &after[skip..];
                Some(line)
            }
            None => {
                let line = self.rest;
                self.rest = "";
                Some(line)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    StartField,
    InField,
    Escaped,
    InQuoted,
    EscapedInQuoted,
    QuoteInQuoted,
}

/// Split one raw line into trimmed tokens.
///
/// Fails with [`LineError::MalformedLine`] when the line ends inside an
/// escape sequence or an unterminated quoted field.
pub fn tokenize_line(line: &str) -> Result<Vec<String>, LineError> {
    let mut tokens = Vec::new();
    let mut field = String::new();
    let mut state = State::StartField;

    for c in line.chars() {
        state = match state {
            State::StartField => match c {
                ' ' => State::StartField,
                QUOTE => State::InQuoted,
                ESCAPE => State::Escaped,
                DELIMITER => {
                    tokens.push(finish(&mut field));
                    State::StartField
                }
                _ => {
                    field.push(c);
                    State::InField
                }
            },
            State::InField => match c {
                ESCAPE => State::Escaped,
                DELIMITER => {
                    tokens.push(finish(&mut field));
                    State::StartField
                }
                _ => {
                    field.push(c);
                    State::InField
                }
            },
            State::Escaped => {
                field.push(c);
                State::InField
            }
            State::InQuoted => match c {
                ESCAPE => State::EscapedInQuoted,
                QUOTE => State::QuoteInQuoted,
                _ => {
                    field.push(c);
                    State::InQuoted
                }
            },
            State::EscapedInQuoted => {
                field.push(c);
                State::InQuoted
            }
            State::QuoteInQuoted => match c {
                // Doubled quote inside a quoted field
                QUOTE => {
                    field.push(QUOTE);
                    State::InQuoted
                }
                DELIMITER => {
                    tokens.push(finish(&mut field));
                    State::StartField
                }
                ESCAPE => State::Escaped,
                _ => {
                    field.push(c);
                    State::InField
                }
            },
        };
    }

    match state {
        State::Escaped => return Err(LineError::malformed("unterminated escape at end of line")),
        State::InQuoted | State::EscapedInQuoted => {
            return Err(LineError::malformed("unterminated quoted field"))
        }
        State::StartField | State::InField | State::QuoteInQuoted => {
            tokens.push(finish(&mut field));
        }
    }

    Ok(tokens)
}

fn finish(field: &mut String) -> String {
    let token = field.trim().to_string();
    field.clear();
    token
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(line: &str) -> Vec<String> {
        tokenize_line(line).unwrap()
    }

    #[test]
    fn splits_and_trims_simple_line() {
        assert_eq!(
            toks("Riverside, LAB, 1200, CON, 900"),
            vec!["Riverside", "LAB", "1200", "CON", "900"]
        );
        assert_eq!(toks("  Riverside ,LAB ,  1200  "), vec!["Riverside", "LAB", "1200"]);
    }

    #[test]
    fn escaped_comma_stays_in_token() {
        assert_eq!(
            toks(r"Sheffield\, Hallam, LD, 5000"),
            vec!["Sheffield, Hallam", "LD", "5000"]
        );
        assert_eq!(toks(r"A\\B, C, 1"), vec![r"A\B", "C", "1"]);
    }

    #[test]
    fn trailing_escape_is_malformed() {
        let err = tokenize_line(r"Riverside, LAB, 1200\").unwrap_err();
        assert!(matches!(err, LineError::MalformedLine { .. }));
        assert!(err.to_string().contains("unterminated escape"));
    }

    #[test]
    fn quoted_field_keeps_commas() {
        assert_eq!(
            toks(r#""Ashton, North", L, 10"#),
            vec!["Ashton, North", "L", "10"]
        );
        assert_eq!(toks(r#""Say ""hi""", C, 1"#), vec![r#"Say "hi""#, "C", "1"]);
    }

    #[test]
    fn unterminated_quote_is_malformed() {
        let err = tokenize_line(r#""Ashton, L, 10"#).unwrap_err();
        assert!(err.to_string().contains("unterminated quoted field"));
    }

    #[test]
    fn empty_fields_are_preserved() {
        assert_eq!(toks("A,,1"), vec!["A", "", "1"]);
        assert_eq!(toks("A, C, 1,"), vec!["A", "C", "1", ""]);
        assert_eq!(toks(", C, 1"), vec!["", "C", "1"]);
    }

    #[test]
    fn report_lines_handles_all_terminators() {
        let lines: Vec<&str> = report_lines("a\nb\r\nc\rd").collect();
        assert_eq!(lines, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn report_lines_does_not_yield_trailing_empty_line() {
        let lines: Vec<&str> = report_lines("a\n").collect();
        assert_eq!(lines, vec!["a"]);
        let lines: Vec<&str> = report_lines("a\n\n").collect();
        assert_eq!(lines, vec!["a", ""]);
        assert_eq!(report_lines("").count(), 0);
    }

    #[test]
    fn strip_bom_removes_only_leading_mark() {
        assert_eq!(strip_bom("\u{feff}Riverside"), "Riverside");
        assert_eq!(strip_bom("Riverside"), "Riverside");
        assert_eq!(strip_bom("\u{feff}\u{feff}x"), "\u{feff}x");
    }
}
