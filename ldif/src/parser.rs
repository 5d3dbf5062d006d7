//! LDIF parser.
//!
//! Reads RFC 2849 records from any `BufRead` source as a lazy iterator.
//! Three stages feed each other: physical lines are unfolded (comments
//! dropped), unfolded lines are grouped into blank-line-separated
//! blocks, and each block is assembled into one [`Record`].

use std::io::BufRead;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use url::Url;

use crate::data::{ChangeType, Record};
use crate::error::{LdifError, Result};
use crate::fetch::{FileFetcher, UrlFetcher};
use crate::grammar::is_dn;

/// How `dn:`/`changetype:` violations and undecodable values are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strictness {
    /// Fail with the error and end the record stream.
    #[default]
    Strict,
    /// Log a warning and skip the offending line.
    Lenient,
}

/// Parser options, fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct ParserConfig {
    ignored_attr_types: Vec<String>,
    allowed_url_schemes: Vec<String>,
    strictness: Strictness,
}

impl ParserConfig {
    pub fn new() -> ParserConfig {
        ParserConfig::default()
    }

    /// Drop attributes of this type (case-insensitive).
    pub fn ignore_attr_type(mut self, ad: &str) -> ParserConfig {
        self.ignored_attr_types.push(ad.to_lowercase());
        self
    }

    /// Dereference `:<` values whose URL has this scheme.  With no
    /// scheme allowed, URL-valued attributes are dropped.
    pub fn allow_url_scheme(mut self, scheme: &str) -> ParserConfig {
        self.allowed_url_schemes.push(scheme.to_lowercase());
        self
    }

    pub fn strictness(mut self, strictness: Strictness) -> ParserConfig {
        self.strictness = strictness;
        self
    }

    fn is_ignored(&self, ad: &str) -> bool {
        let ad = ad.to_lowercase();
        self.ignored_attr_types.iter().any(|t| *t == ad)
    }

    fn is_allowed_scheme(&self, scheme: &str) -> bool {
        self.allowed_url_schemes.iter().any(|s| s == scheme)
    }
}

// ---------------------------------------------------------------------------
// Stage 1: unfolding
// ---------------------------------------------------------------------------

/// One unfolded logical line and the physical line it started on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Line {
    pub number: u64,
    pub data: Vec<u8>,
}

/// Strip one trailing `\r\n` or `\n`, but no other whitespace.
fn strip_line_sep(line: &mut Vec<u8>) {
    if line.ends_with(b"\r\n") {
        line.truncate(line.len() - 2);
    } else if line.ends_with(b"\n") {
        line.truncate(line.len() - 1);
    }
}

/// Joins continuation lines and drops comments.
///
/// Continuations are detected by peeking at the reader's buffer, so no
/// physical line past the current logical line is ever consumed.
pub(crate) struct UnfoldedLines<R> {
    inner: R,
    line_no: u64,
}

impl<R: BufRead> UnfoldedLines<R> {
    pub fn new(inner: R) -> Self {
        UnfoldedLines { inner, line_no: 0 }
    }

    fn read_raw(&mut self, buf: &mut Vec<u8>) -> Result<bool> {
        if self.inner.read_until(b'\n', buf)? == 0 {
            return Ok(false);
        }
        self.line_no += 1;
        strip_line_sep(buf);
        Ok(true)
    }

    /// True when the next physical line starts with a space.
    fn continues(&mut self) -> Result<bool> {
        Ok(self.inner.fill_buf()?.first() == Some(&b' '))
    }

    /// Read the next logical line.  Returns `Ok(None)` at EOF.
    pub fn next_line(&mut self) -> Result<Option<Line>> {
        loop {
            let mut data = Vec::new();
            if !self.read_raw(&mut data)? {
                return Ok(None);
            }
            let number = self.line_no;

            let mut cont = Vec::new();
            while self.continues()? {
                cont.clear();
                self.read_raw(&mut cont)?;
                data.extend_from_slice(&cont[1..]);
            }

            if data.first() == Some(&b'#') {
                continue;
            }
            return Ok(Some(Line { number, data }));
        }
    }

    pub fn line_number(&self) -> u64 {
        self.line_no
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: BufRead> Iterator for UnfoldedLines<R> {
    type Item = Result<Line>;

    fn next(&mut self) -> Option<Result<Line>> {
        self.next_line().transpose()
    }
}

// ---------------------------------------------------------------------------
// LdifParser
// ---------------------------------------------------------------------------

/// Lazy, single-pass LDIF record reader.
///
/// Each call to `next()` reads exactly one block from the underlying
/// stream.  After an error is returned the iterator is exhausted.
pub struct LdifParser<R> {
    lines: UnfoldedLines<R>,
    config: ParserConfig,
    fetcher: Box<dyn UrlFetcher>,
    records_read: u64,
    done: bool,
}

impl<R: BufRead> LdifParser<R> {
    pub fn new(reader: R) -> Self {
        Self::with_config(reader, ParserConfig::default())
    }

    pub fn with_config(reader: R, config: ParserConfig) -> Self {
        Self::with_fetcher(reader, config, FileFetcher)
    }

    pub fn with_fetcher(
        reader: R,
        config: ParserConfig,
        fetcher: impl UrlFetcher + 'static,
    ) -> Self {
        LdifParser {
            lines: UnfoldedLines::new(reader),
            config,
            fetcher: Box::new(fetcher),
            records_read: 0,
            done: false,
        }
    }

    /// Number of records returned so far.
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Number of physical lines consumed so far.
    pub fn line_number(&self) -> u64 {
        self.lines.line_number()
    }

    /// Give the underlying reader back to the caller.
    pub fn into_inner(self) -> R {
        self.lines.into_inner()
    }

    // -- stage 2: blocks ----------------------------------------------------

    /// Collect lines up to the next blank line.  Blank lines with nothing
    /// before them are skipped, so empty blocks never surface.
    fn next_block(&mut self) -> Result<Option<Vec<Line>>> {
        let mut block = Vec::new();
        while let Some(line) = self.lines.next_line()? {
            if !line.data.is_empty() {
                block.push(line);
            } else if !block.is_empty() {
                return Ok(Some(block));
            }
        }
        Ok(if block.is_empty() { None } else { Some(block) })
    }

    // -- stage 3: records ---------------------------------------------------

    /// Apply the strictness policy to a data error.
    fn reject(&self, err: LdifError) -> Result<()> {
        if self.config.strictness == Strictness::Lenient && err.is_format_error() {
            tracing::warn!(error = %err, "skipping invalid LDIF line");
            Ok(())
        } else {
            Err(err)
        }
    }

    /// Split a line into its attribute type and decoded value.
    ///
    /// Returns `Ok(None)` for a bare `-` line.  A `None` value means
    /// the value was a URL that is not dereferenced.
    fn parse_attr(&mut self, line: &Line) -> Result<Option<(String, Option<Vec<u8>>)>> {
        let data = &line.data;
        if data.as_slice() == b"-" {
            return Ok(None);
        }
        let colon = data
            .iter()
            .position(|&c| c == b':')
            .ok_or_else(|| LdifError::format(line.number, "Missing ':' after attribute type."))?;
        let attr_type = std::str::from_utf8(&data[..colon])
            .map_err(|_| LdifError::format(line.number, "Attribute type is not valid UTF-8."))?
            .to_string();

        let rest = &data[colon + 1..];
        let value = match rest.first() {
            None => Some(Vec::new()),
            Some(b':') => Some(self.decode_base64(line.number, &rest[1..])?),
            Some(b'<') => self.dereference(line.number, &rest[1..])?,
            Some(_) => {
                let start = rest.iter().position(|&c| c != b' ').unwrap_or(rest.len());
                Some(rest[start..].to_vec())
            }
        };
        Ok(Some((attr_type, value)))
    }

    fn decode_base64(&self, line: u64, text: &[u8]) -> Result<Vec<u8>> {
        STANDARD
            .decode(text.trim_ascii())
            .map_err(|_| LdifError::Base64Decode { line })
    }

    fn dereference(&mut self, line: u64, text: &[u8]) -> Result<Option<Vec<u8>>> {
        if self.config.allowed_url_schemes.is_empty() {
            tracing::debug!(line, "no URL schemes allowed, dropping value");
            return Ok(None);
        }
        let url = match std::str::from_utf8(text.trim_ascii()).map(Url::parse) {
            Ok(Ok(url)) => url,
            _ => {
                tracing::debug!(line, "URL has no usable scheme, dropping value");
                return Ok(None);
            }
        };
        if !self.config.is_allowed_scheme(url.scheme()) {
            tracing::debug!(line, url = %url, "URL scheme not allowed, dropping value");
            return Ok(None);
        }
        Ok(Some(self.fetcher.fetch(&url)?))
    }

    /// Check a `dn:` value.
    fn check_dn(line: u64, dn: Option<&String>, value: Option<Vec<u8>>) -> Result<String> {
        if dn.is_some() {
            return Err(LdifError::format(
                line,
                "Two lines starting with dn: in one record.",
            ));
        }
        let value = value.ok_or_else(|| {
            LdifError::format(line, "No value for dn: (URL not dereferenced).")
        })?;
        match String::from_utf8(value) {
            Ok(s) if is_dn(&s) => Ok(s),
            Ok(s) => Err(LdifError::format(
                line,
                format!("No valid string-representation of distinguished name {:?}.", s),
            )),
            Err(_) => Err(LdifError::format(
                line,
                "Distinguished name is not valid UTF-8.",
            )),
        }
    }

    /// Check a `changetype:` value.
    fn check_changetype(
        line: u64,
        dn: Option<&String>,
        changetype: Option<ChangeType>,
        value: Option<Vec<u8>>,
    ) -> Result<ChangeType> {
        if dn.is_none() {
            return Err(LdifError::format(
                line,
                "Read changetype: before getting valid dn: line.",
            ));
        }
        if changetype.is_some() {
            return Err(LdifError::format(
                line,
                "Two lines starting with changetype: in one record.",
            ));
        }
        let value = value.unwrap_or_default();
        let text = String::from_utf8_lossy(&value);
        text.parse::<ChangeType>().map_err(|_| {
            LdifError::format(line, format!("changetype value {:?} is invalid.", text))
        })
    }

    /// Assemble one block.  `Ok(None)` means the block yields no record.
    fn parse_record(&mut self, block: Vec<Line>) -> Result<Option<Record>> {
        let mut dn: Option<String> = None;
        let mut changetype: Option<ChangeType> = None;
        let mut record = Record::default();

        for line in &block {
            let (attr_type, value) = match self.parse_attr(line) {
                Ok(Some(pair)) => pair,
                Ok(None) => continue,
                Err(e) => {
                    self.reject(e)?;
                    continue;
                }
            };

            if attr_type == "dn" {
                match Self::check_dn(line.number, dn.as_ref(), value) {
                    Ok(s) => dn = Some(s),
                    Err(e) => self.reject(e)?,
                }
            } else if attr_type == "version" && dn.is_none() {
                // version: 1
            } else if attr_type == "changetype" {
                match Self::check_changetype(line.number, dn.as_ref(), changetype, value) {
                    Ok(ct) => changetype = Some(ct),
                    Err(e) => self.reject(e)?,
                }
            } else if let Some(value) = value {
                if !self.config.is_ignored(&attr_type) {
                    if let Some(attr) = record.find_attribute(&attr_type, true) {
                        attr.append_value(&value);
                    }
                }
            }
        }

        if dn.is_none() && record.attributes.is_empty() {
            return Ok(None);
        }
        record.dn = dn;
        record.changetype = changetype;
        Ok(Some(record))
    }

    /// Read the next record.  Returns `Ok(None)` at EOF.
    pub fn read_record(&mut self) -> Result<Option<Record>> {
        while let Some(block) = self.next_block()? {
            if let Some(record) = self.parse_record(block)? {
                self.records_read += 1;
                tracing::trace!(dn = ?record.dn, "parsed record");
                return Ok(Some(record));
            }
        }
        Ok(None)
    }
}

impl<R: BufRead> Iterator for LdifParser<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Result<Record>> {
        if self.done {
            return None;
        }
        let result = self.read_record().transpose();
        if !matches!(result, Some(Ok(_))) {
            self.done = true;
        }
        result
    }
}
