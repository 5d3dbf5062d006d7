//! Parse and generate LDIF (LDAP Data Interchange Format, RFC 2849).
//!
//! [`LdifParser`] turns a byte stream into a lazy sequence of
//! [`Record`]s; [`LdifWriter`] writes entry and change records back out
//! with folding and base64 encoding where required.

pub mod data;
pub mod error;
pub mod fetch;
pub mod grammar;
pub mod parser;
pub mod writer;

pub use data::{Attribute, Body, Change, ChangeType, LdapMod, Mod, ModOp, Record};
pub use error::{LdifError, Result};
pub use fetch::{FileFetcher, UrlFetcher};
pub use grammar::{is_dn, is_unsafe_string};
pub use parser::{LdifParser, ParserConfig, Strictness};
pub use writer::{LdifWriter, WriterConfig};
