//! Strict RFC 4180 record reader for legacy sources.
//!
//! Quoted fields may span lines and escape quotes by doubling them. Blank
//! lines are skipped and records may differ in length. Any quoting mistake
//! fails the whole document.

use std::iter::Peekable;
use std::str::Chars;

/// Tokenize error with the 1-based physical line it was found on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("csv error on line {line}: {message}")]
pub(crate) struct CsvError {
    pub(crate) line: usize,
    pub(crate) message: &'static str,
}

pub(crate) fn read_records(input: &str) -> Result<Vec<Vec<String>>, CsvError> {
    let normalized = input.replace("\r\n", "\n");
    let mut reader = Reader {
        chars: normalized.chars().peekable(),
        line: 1,
    };

    let mut records = Vec::new();
    while let Some(&c) = reader.chars.peek() {
        if c == '\n' {
            reader.bump();
            continue;
        }
        records.push(reader.record()?);
    }
    Ok(records)
}

struct Reader<'a> {
    chars: Peekable<Chars<'a>>,
    line: usize,
}

impl Reader<'_> {
    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next();
        if c == Some('\n') {
            self.line += 1;
        }
        c
    }

    fn error(&self, message: &'static str) -> CsvError {
        CsvError {
            line: self.line,
            message,
        }
    }

    fn record(&mut self) -> Result<Vec<String>, CsvError> {
        let mut fields = Vec::new();
        loop {
            let field = if self.chars.peek() == Some(&'"') {
                self.bump();
                self.quoted_field()?
            } else {
                self.bare_field()?
            };
            fields.push(field);

            match self.bump() {
                Some(',') => continue,
                Some('\n') | None => return Ok(fields),
                Some(_) => return Err(self.error("unexpected character after field")),
            }
        }
    }

    fn quoted_field(&mut self) -> Result<String, CsvError> {
        let start_line = self.line;
        let mut field = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(CsvError {
                        line: start_line,
                        message: "extraneous or missing \" in quoted-field",
                    })
                }
                Some('"') => match self.chars.peek() {
                    Some('"') => {
                        self.bump();
                        field.push('"');
                    }
                    Some(',') | Some('\n') | None => return Ok(field),
                    Some(_) => return Err(self.error("extraneous or missing \" in quoted-field")),
                },
                Some(c) => field.push(c),
            }
        }
    }

    fn bare_field(&mut self) -> Result<String, CsvError> {
        let mut field = String::new();
        loop {
            match self.chars.peek() {
                None | Some(',') | Some('\n') => return Ok(field),
                Some('"') => return Err(self.error("bare \" in non-quoted-field")),
                Some(&c) => {
                    field.push(c);
                    self.bump();
                }
            }
        }
    }
}
