//! LDIF writer.
//!
//! Emits entry and change records with line folding and base64 encoding
//! of values that are not SAFE-STRINGs.

use std::io::{self, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::data::{Attribute, Body, Change, ChangeType};
use crate::error::{LdifError, Result};
use crate::grammar::is_unsafe_string;

/// Writer options, fixed at construction.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    base64_attrs: Vec<String>,
    cols: usize,
    line_sep: String,
}

impl Default for WriterConfig {
    fn default() -> Self {
        WriterConfig {
            base64_attrs: Vec::new(),
            cols: 76,
            line_sep: "\n".to_string(),
        }
    }
}

impl WriterConfig {
    pub fn new() -> WriterConfig {
        WriterConfig::default()
    }

    /// Always base64-encode values of this attribute type (case-insensitive).
    pub fn base64_attr(mut self, ad: &str) -> WriterConfig {
        self.base64_attrs.push(ad.to_lowercase());
        self
    }

    /// Maximum line length before folding.
    pub fn cols(mut self, cols: usize) -> WriterConfig {
        self.cols = cols;
        self
    }

    pub fn line_sep(mut self, sep: &str) -> WriterConfig {
        self.line_sep = sep.to_string();
        self
    }
}

/// Writes LDIF records to an output stream owned by the caller.
pub struct LdifWriter<W> {
    out: W,
    config: WriterConfig,
    records_written: u64,
}

impl<W: Write> LdifWriter<W> {
    pub fn new(out: W) -> Self {
        LdifWriter {
            out,
            config: WriterConfig::default(),
            records_written: 0,
        }
    }

    pub fn with_config(out: W, config: WriterConfig) -> Result<Self> {
        if config.cols < 2 {
            return Err(LdifError::InvalidArgument(format!(
                "column width must be at least 2, got {}",
                config.cols
            )));
        }
        Ok(LdifWriter {
            out,
            config,
            records_written: 0,
        })
    }

    /// Number of records written so far.
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_sep(&mut self) -> io::Result<()> {
        self.out.write_all(self.config.line_sep.as_bytes())
    }

    /// Write `line` as one or more folded lines.
    fn fold_line(&mut self, line: &[u8]) -> io::Result<()> {
        let cols = self.config.cols;
        if line.len() <= cols {
            self.out.write_all(line)?;
            return self.write_sep();
        }
        self.out.write_all(&line[..cols])?;
        self.write_sep()?;
        let mut pos = cols;
        while pos < line.len() {
            let end = line.len().min(pos + cols - 1);
            self.out.write_all(b" ")?;
            self.out.write_all(&line[pos..end])?;
            self.write_sep()?;
            pos = end;
        }
        Ok(())
    }

    fn needs_base64(&self, ad: &str, value: &[u8]) -> bool {
        let ad = ad.to_lowercase();
        self.config.base64_attrs.iter().any(|a| *a == ad) || is_unsafe_string(value)
    }

    /// Write a single attribute type/value pair.
    fn unparse_attr(&mut self, ad: &str, value: &[u8]) -> io::Result<()> {
        let mut line = Vec::with_capacity(ad.len() + value.len() + 3);
        line.extend_from_slice(ad.as_bytes());
        if self.needs_base64(ad, value) {
            line.extend_from_slice(b":: ");
            line.extend_from_slice(STANDARD.encode(value).as_bytes());
        } else {
            line.extend_from_slice(b": ");
            line.extend_from_slice(value);
        }
        self.fold_line(&line)
    }

    fn unparse_entry(&mut self, attributes: &[Attribute]) -> io::Result<()> {
        let mut sorted: Vec<&Attribute> = attributes.iter().collect();
        sorted.sort_by(|a, b| a.ad.as_bytes().cmp(b.ad.as_bytes()));
        for attr in sorted {
            for value in &attr.values {
                self.unparse_attr(&attr.ad, value)?;
            }
        }
        Ok(())
    }

    fn unparse_changetype(&mut self, changetype: ChangeType) -> io::Result<()> {
        self.unparse_attr("changetype", changetype.as_str().as_bytes())
    }

    /// The change type of a change list, or an error when the list is
    /// empty or mixes additions with modifications.
    fn check_changes(changes: &[Change]) -> Result<ChangeType> {
        let first = changes.first().ok_or_else(|| {
            LdifError::InvalidArgument("modification list is empty".to_string())
        })?;
        let changetype = first.change_type();
        if changes.iter().any(|c| c.change_type() != changetype) {
            return Err(LdifError::InvalidArgument(
                "subsequent modification list item of wrong kind".to_string(),
            ));
        }
        Ok(changetype)
    }

    fn unparse_changes(&mut self, changetype: ChangeType, changes: &[Change]) -> io::Result<()> {
        self.unparse_changetype(changetype)?;
        for change in changes {
            match change {
                Change::Add(m) => {
                    for value in &m.values {
                        self.unparse_attr(&m.attr, value)?;
                    }
                }
                Change::Modify(m) => {
                    self.unparse_attr(m.op.as_str(), m.attr.as_bytes())?;
                    for value in &m.values {
                        self.unparse_attr(&m.attr, value)?;
                    }
                    self.out.write_all(b"-")?;
                    self.write_sep()?;
                }
            }
        }
        Ok(())
    }

    fn unparse_modrdn(
        &mut self,
        newrdn: &str,
        deleteoldrdn: bool,
        newsuperior: Option<&str>,
    ) -> io::Result<()> {
        self.unparse_changetype(ChangeType::ModRdn)?;
        self.unparse_attr("newrdn", newrdn.as_bytes())?;
        self.unparse_attr("deleteoldrdn", if deleteoldrdn { b"1" } else { b"0" })?;
        if let Some(sup) = newsuperior {
            self.unparse_attr("newsuperior", sup.as_bytes())?;
        }
        Ok(())
    }

    /// Write one record followed by a blank line.
    ///
    /// Change lists are validated before anything is written, so a
    /// rejected record leaves no partial output behind.
    pub fn unparse(&mut self, dn: &str, body: &Body) -> Result<()> {
        match body {
            Body::Entry(attributes) => {
                self.unparse_attr("dn", dn.as_bytes())?;
                self.unparse_entry(attributes)?;
            }
            Body::Changes(changes) => {
                let changetype = Self::check_changes(changes)?;
                self.unparse_attr("dn", dn.as_bytes())?;
                self.unparse_changes(changetype, changes)?;
            }
            Body::Delete => {
                self.unparse_attr("dn", dn.as_bytes())?;
                self.unparse_changetype(ChangeType::Delete)?;
            }
            Body::ModRdn {
                newrdn,
                deleteoldrdn,
                newsuperior,
            } => {
                self.unparse_attr("dn", dn.as_bytes())?;
                self.unparse_modrdn(newrdn, *deleteoldrdn, newsuperior.as_deref())?;
            }
        }
        self.write_sep()?;
        self.records_written += 1;
        tracing::trace!(dn, records_written = self.records_written, "wrote record");
        Ok(())
    }
}
