//! Record types shared by the parser and the writer.

use std::fmt;
use std::str::FromStr;

use crate::error::{LdifError, Result};
use crate::grammar::{CHANGE_TYPES, MOD_OPS};

/// An attribute: a descriptor (name) with a list of binary-safe values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub ad: String,
    pub values: Vec<Vec<u8>>,
}

impl Attribute {
    pub fn new(ad: impl Into<String>) -> Attribute {
        Attribute {
            ad: ad.into(),
            values: Vec::new(),
        }
    }

    /// Build an attribute from text values.
    pub fn with_values<I, V>(ad: impl Into<String>, values: I) -> Attribute
    where
        I: IntoIterator<Item = V>,
        V: AsRef<[u8]>,
    {
        Attribute {
            ad: ad.into(),
            values: values.into_iter().map(|v| v.as_ref().to_vec()).collect(),
        }
    }

    pub fn append_value(&mut self, data: &[u8]) {
        self.values.push(data.to_vec());
    }
}

/// The value of a `changetype:` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    Add,
    Delete,
    Modify,
    ModRdn,
}

impl ChangeType {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeType::Add => CHANGE_TYPES[0],
            ChangeType::Delete => CHANGE_TYPES[1],
            ChangeType::Modify => CHANGE_TYPES[2],
            ChangeType::ModRdn => CHANGE_TYPES[3],
        }
    }
}

impl FromStr for ChangeType {
    type Err = LdifError;

    fn from_str(s: &str) -> Result<ChangeType> {
        match s {
            "add" => Ok(ChangeType::Add),
            "delete" => Ok(ChangeType::Delete),
            "modify" => Ok(ChangeType::Modify),
            "modrdn" => Ok(ChangeType::ModRdn),
            _ => Err(LdifError::InvalidChangeType(s.to_string())),
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// LDAP modification operation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModOp {
    Add,
    Delete,
    Replace,
}

impl ModOp {
    /// Map the numeric operation code (0 = add, 1 = delete, 2 = replace).
    pub fn from_code(code: u8) -> Result<ModOp> {
        match code {
            0 => Ok(ModOp::Add),
            1 => Ok(ModOp::Delete),
            2 => Ok(ModOp::Replace),
            _ => Err(LdifError::InvalidArgument(format!(
                "unknown modification operation code {}",
                code
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModOp::Add => MOD_OPS[0],
            ModOp::Delete => MOD_OPS[1],
            ModOp::Replace => MOD_OPS[2],
        }
    }
}

/// An attribute addition inside an add change record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mod {
    pub attr: String,
    pub values: Vec<Vec<u8>>,
}

/// An LDAP modification with operation type (used in modify change records).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdapMod {
    pub op: ModOp,
    pub attr: String,
    pub values: Vec<Vec<u8>>,
}

/// One element of a change list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    /// `(type, values)`: the record is `changetype: add`.
    Add(Mod),
    /// `(op, type, values)`: the record is `changetype: modify`.
    Modify(LdapMod),
}

impl Change {
    pub fn add<I, V>(attr: impl Into<String>, values: I) -> Change
    where
        I: IntoIterator<Item = V>,
        V: AsRef<[u8]>,
    {
        Change::Add(Mod {
            attr: attr.into(),
            values: values.into_iter().map(|v| v.as_ref().to_vec()).collect(),
        })
    }

    pub fn modify<I, V>(op: ModOp, attr: impl Into<String>, values: I) -> Change
    where
        I: IntoIterator<Item = V>,
        V: AsRef<[u8]>,
    {
        Change::Modify(LdapMod {
            op,
            attr: attr.into(),
            values: values.into_iter().map(|v| v.as_ref().to_vec()).collect(),
        })
    }

    /// The change type implied by this element.
    pub fn change_type(&self) -> ChangeType {
        match self {
            Change::Add(_) => ChangeType::Add,
            Change::Modify(_) => ChangeType::Modify,
        }
    }
}

/// What the writer emits after the `dn:` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// A content record; attributes are written in sorted order.
    Entry(Vec<Attribute>),
    /// A homogeneous list of additions or modifications.
    Changes(Vec<Change>),
    /// `changetype: delete`.
    Delete,
    /// `changetype: modrdn`.
    ModRdn {
        newrdn: String,
        deleteoldrdn: bool,
        newsuperior: Option<String>,
    },
}

/// One parsed LDIF record.  `dn` is `None` for a block that carried
/// attributes but no valid `dn:` line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub dn: Option<String>,
    pub changetype: Option<ChangeType>,
    pub attributes: Vec<Attribute>,
}

impl Record {
    pub fn new(dn: impl Into<String>) -> Record {
        Record {
            dn: Some(dn.into()),
            changetype: None,
            attributes: Vec::new(),
        }
    }

    /// Find an attribute by descriptor name.
    /// If `create` is true and the attribute doesn't exist, create it.
    pub fn find_attribute(&mut self, ad: &str, create: bool) -> Option<&mut Attribute> {
        let pos = self.attributes.iter().position(|a| a.ad == ad);
        match pos {
            Some(i) => Some(&mut self.attributes[i]),
            None if create => {
                self.attributes.push(Attribute::new(ad));
                self.attributes.last_mut()
            }
            None => None,
        }
    }

    /// Find an attribute by descriptor name (immutable).
    pub fn get_attribute(&self, ad: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.ad == ad)
    }

    /// Values of `ad`, or an empty slice.
    pub fn values(&self, ad: &str) -> &[Vec<u8>] {
        self.get_attribute(ad)
            .map(|a| a.values.as_slice())
            .unwrap_or(&[])
    }

    /// Convert to writer input in entry form.
    pub fn into_body(self) -> Body {
        Body::Entry(self.attributes)
    }
}
