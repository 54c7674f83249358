//! Exit-list record parser
//!
//! The upstream format is line oriented, one directive per line, tokens separated by
//! spaces:
//!
//! ```text
//! @type tordnsel 1.0
//! Downloaded 2024-01-30 13:02:00
//! ExitNode FE39F07EBE7870DCE124AB30DF3ABD0700A43F75
//! Published 2024-01-30 00:10:50
//! LastStatus 2024-01-30 10:00:00
//! ExitAddress 185.241.208.231 2024-01-30 10:21:54
//! ```
//!
//! Each `ExitNode` line opens a record; the open record is emitted when the next
//! `ExitNode` line arrives or the input ends. Parsing is a single forward pass and
//! stops at the first malformed field.

use crate::error::{Error, Field, FieldError, Result};
use crate::types::{ExitAddress, ExitNodeRecord};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::io::BufRead;
use tracing::warn;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One input line, classified by its key
#[derive(Debug, PartialEq, Eq)]
enum Directive<'a> {
    /// `@type` or `Downloaded`
    Header,
    /// `ExitNode <fingerprint>`
    ExitNodeStart(&'a str),
    /// `Published <date> <time>`
    Published(&'a str),
    /// `LastStatus <date> <time>`
    LastStatus(&'a str),
    /// `ExitAddress <ip> <date> <time>`
    ExitAddress(&'a str),
    /// Any other key, including blank lines
    Unknown,
}

impl<'a> Directive<'a> {
    /// Classify a raw line; only lines with a known record key are decoded
    fn classify(line: &'a [u8], line_no: usize) -> Result<Self> {
        let (key, rest) = match line.iter().position(|&b| b == b' ') {
            Some(at) => (&line[..at], &line[at + 1..]),
            None => (line, &[][..]),
        };

        let field = match key {
            b"@type" | b"Downloaded" => return Ok(Directive::Header),
            b"ExitNode" => Field::ExitNode,
            b"Published" => Field::Published,
            b"LastStatus" => Field::LastStatus,
            b"ExitAddress" => Field::ExitAddress,
            _ => return Ok(Directive::Unknown),
        };

        let rest = std::str::from_utf8(rest).map_err(|source| Error::FieldParse {
            field,
            line: line_no,
            source: FieldError::Encoding(source),
        })?;

        Ok(match field {
            Field::ExitNode => Directive::ExitNodeStart(rest),
            Field::Published => Directive::Published(rest),
            Field::LastStatus => Directive::LastStatus(rest),
            Field::ExitAddress => Directive::ExitAddress(rest),
        })
    }
}

/// Streaming parser yielding one [`ExitNodeRecord`] at a time
///
/// After the first error the stream is exhausted.
pub struct RecordStream<R> {
    reader: R,
    buf: Vec<u8>,
    line_no: usize,
    open: Option<ExitNodeRecord>,
    done: bool,
}

impl<R: BufRead> RecordStream<R> {
    /// Wrap a buffered reader
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            line_no: 0,
            open: None,
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for RecordStream<R> {
    type Item = Result<ExitNodeRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => {
                    self.done = true;
                    return self.open.take().map(Ok);
                }
                Ok(_) => self.line_no += 1,
                Err(e) => {
                    self.done = true;
                    return Some(Err(Error::LocalIo {
                        context: format!("read line {}", self.line_no + 1),
                        path: None,
                        source: e,
                    }));
                }
            }

            let line = trim_line_end(&self.buf);
            let outcome = Directive::classify(line, self.line_no)
                .and_then(|directive| step(&mut self.open, directive, self.line_no));
            match outcome {
                Ok(Some(finished)) => return Some(Ok(finished)),
                Ok(None) => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

fn trim_line_end(mut line: &[u8]) -> &[u8] {
    while let [rest @ .., b'\n' | b'\r'] = line {
        line = rest;
    }
    line
}

/// Parse a whole stream into records, in source order
///
/// # Errors
/// * [`Error::FieldParse`] on the first malformed field, including a record line
///   that is not UTF-8; no records are returned
/// * [`Error::LocalIo`] if the reader fails
pub fn parse_records<R: BufRead>(reader: R) -> Result<Vec<ExitNodeRecord>> {
    RecordStream::new(reader).collect()
}

/// Apply one directive to the open record, returning a record it finalized
fn step(
    open: &mut Option<ExitNodeRecord>,
    directive: Directive<'_>,
    line: usize,
) -> Result<Option<ExitNodeRecord>> {
    match directive {
        Directive::Header | Directive::Unknown => Ok(None),

        Directive::ExitNodeStart(rest) => {
            let fingerprint = rest
                .split_ascii_whitespace()
                .next()
                .ok_or_else(|| missing(Field::ExitNode, line, "fingerprint"))?;
            Ok(open.replace(ExitNodeRecord::new(fingerprint)))
        }

        Directive::Published(rest) => {
            let published =
                parse_timestamp(Field::Published, &mut rest.split_ascii_whitespace(), line)?;
            match open {
                Some(record) => record.published = published,
                None => orphan(Field::Published, line),
            }
            Ok(None)
        }

        Directive::LastStatus(rest) => {
            let last_status =
                parse_timestamp(Field::LastStatus, &mut rest.split_ascii_whitespace(), line)?;
            match open {
                Some(record) => record.last_status = last_status,
                None => orphan(Field::LastStatus, line),
            }
            Ok(None)
        }

        Directive::ExitAddress(rest) => {
            let mut tokens = rest.split_ascii_whitespace();
            let ip = tokens
                .next()
                .ok_or_else(|| missing(Field::ExitAddress, line, "ip"))?;
            let updated_at = parse_timestamp(Field::ExitAddress, &mut tokens, line)?;
            match open {
                Some(record) => record.exit_addresses.push(ExitAddress {
                    ip: ip.to_string(),
                    updated_at,
                }),
                None => orphan(Field::ExitAddress, line),
            }
            Ok(None)
        }
    }
}

/// Parse the next `<date> <time>` tokens as a UTC timestamp; trailing tokens are ignored
fn parse_timestamp<'a>(
    field: Field,
    tokens: &mut impl Iterator<Item = &'a str>,
    line: usize,
) -> Result<DateTime<Utc>> {
    let date = tokens.next().ok_or_else(|| missing(field, line, "date"))?;
    let time = tokens.next().ok_or_else(|| missing(field, line, "time"))?;

    let value = format!("{date} {time}");
    NaiveDateTime::parse_from_str(&value, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|source| Error::FieldParse {
            field,
            line,
            source: FieldError::Timestamp { value, source },
        })
}

fn missing(field: Field, line: usize, token: &'static str) -> Error {
    Error::FieldParse {
        field,
        line,
        source: FieldError::MissingToken(token),
    }
}

fn orphan(field: Field, line: usize) {
    warn!(%field, line, "discarding directive outside of an ExitNode record");
}
