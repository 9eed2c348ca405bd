//! Typed header cells.
//!
//! Every header cell names a destination inside the nested document and the
//! scalar type its values are coerced to:
//!
//! - `customer.name(STRING)` sets a plain field under nested maps;
//! - `tags[](STRING)` appends the value to a list;
//! - `items[type=fixed&amount](DOUBLE)` appends one map per cell, mixing
//!   literal pairs from the header with keys bound to the cell value.
//!
//! The header row is resolved once per run into a [`HeaderSchema`]. Columns
//! that cannot be resolved are remembered with the reason and dropped for every
//! row; a malformed list parameter is fatal because no row could be mapped
//! correctly.

use std::{fmt, str::FromStr, sync::OnceLock};

use itertools::Itertools;
use regex::Regex;
use thiserror::Error;

/// Per-column header problems. The column is dropped, the run continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("No or empty header received")]
    EmptyHeader,
    #[error("No field name found in header '{0}'")]
    NoFieldName(String),
    #[error("No type found in header '{0}'")]
    NoTypeFound(String),
    #[error("Type not recognized from header: '{0}'")]
    UnknownType(String),
    #[error("Empty path segment in field path '{0}'")]
    EmptySegment(String),
}

/// Header problems that make the whole run meaningless.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error(
        "Wrong number of parameters for '{header}' (column {column}): '{token}' must be 'key' or 'key=value'"
    )]
    MalformedListParameter {
        column: usize,
        header: String,
        token: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Boolean,
    Date,
    Double,
    Float,
    Integer,
    Long,
    String,
    Text,
}

impl ScalarType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarType::Boolean => "BOOLEAN",
            ScalarType::Date => "DATE",
            ScalarType::Double => "DOUBLE",
            ScalarType::Float => "FLOAT",
            ScalarType::Integer => "INTEGER",
            ScalarType::Long => "LONG",
            ScalarType::String => "STRING",
            ScalarType::Text => "TEXT",
        }
    }

    pub fn variants() -> &'static [ScalarType] {
        &[
            ScalarType::Boolean,
            ScalarType::Date,
            ScalarType::Double,
            ScalarType::Float,
            ScalarType::Integer,
            ScalarType::Long,
            ScalarType::String,
            ScalarType::Text,
        ]
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScalarType {
    type Err = HeaderError;

    /// Expects the already uppercased name produced by [`parse_scalar_type`].
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ScalarType::variants()
            .iter()
            .copied()
            .find(|ty| ty.as_str() == value)
            .ok_or_else(|| HeaderError::UnknownType(value.to_string()))
    }
}

fn field_path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.*?)[\s(]").expect("valid field path regex"))
}

fn scalar_type_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\((.*?)\)").expect("valid scalar type regex"))
}

fn list_target_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([^\[]*)\[(.*)\]").expect("valid list target regex"))
}

/// Returns the header text before the first whitespace or `(`, trimmed.
///
/// A cell without either delimiter is taken whole; it has no type and is
/// dropped by [`parse_scalar_type`] anyway.
pub fn parse_field_path(cell: &str) -> Result<String, HeaderError> {
    if cell.trim().is_empty() {
        return Err(HeaderError::EmptyHeader);
    }
    let path = match field_path_regex().captures(cell) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()),
        None => cell,
    };
    let path = path.trim();
    if path.is_empty() {
        return Err(HeaderError::NoFieldName(cell.to_string()));
    }
    Ok(path.to_string())
}

/// Returns the text between the first `(` and the next `)`, trimmed and uppercased.
pub fn parse_scalar_type(cell: &str) -> Result<String, HeaderError> {
    if cell.trim().is_empty() {
        return Err(HeaderError::EmptyHeader);
    }
    let ty = scalar_type_regex()
        .captures(cell)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_uppercase())
        .unwrap_or_default();
    if ty.is_empty() {
        return Err(HeaderError::NoTypeFound(cell.to_string()));
    }
    Ok(ty)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListParam {
    /// `key=value`: both sides are taken verbatim from the header.
    Literal { key: String, value: String },
    /// `key`: bound to the coerced value of the cell.
    Cell(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldTarget {
    Field(String),
    List { name: String, params: Vec<ListParam> },
}

impl FieldTarget {
    pub fn name(&self) -> &str {
        match self {
            FieldTarget::Field(name) => name,
            FieldTarget::List { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Nested map keys walked from the document root.
    pub parents: Vec<String>,
    pub target: FieldTarget,
    pub scalar_type: ScalarType,
}

impl ColumnSpec {
    pub fn path(&self) -> String {
        self.parents
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.target.name()))
            .join(".")
    }
}

/// Splits `path` on the dots that sit outside brackets.
fn path_segments(path: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, ch) in path.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '.' if depth == 0 => {
                segments.push(&path[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    segments.push(&path[start..]);
    segments
}

/// Splits a field path into parent segments and its final target.
///
/// Dots inside brackets do not separate segments, so literal list values such
/// as `rate=1.5` stay intact. Parent segments are used as map keys verbatim.
/// A final segment holding `[...]` is a list target named by the text before
/// the first `[`; anything after the closing `]` is ignored.
fn split_field_path(
    column: usize,
    header: &str,
    path: &str,
) -> Result<Result<(Vec<String>, FieldTarget), HeaderError>, MappingError> {
    let mut segments = path_segments(path)
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    if segments.iter().any(|segment| segment.is_empty()) {
        return Ok(Err(HeaderError::EmptySegment(path.to_string())));
    }
    let last = segments.pop().unwrap_or_default();
    let Some(caps) = list_target_regex().captures(&last) else {
        return Ok(Ok((segments, FieldTarget::Field(last))));
    };
    if caps[1].is_empty() {
        return Ok(Err(HeaderError::EmptySegment(path.to_string())));
    }
    let name = caps[1].to_string();
    let params = parse_list_params(column, header, &caps[2])?;
    Ok(Ok((segments, FieldTarget::List { name, params })))
}

/// Parses the bracket body of a list target.
pub fn parse_list_params(
    column: usize,
    header: &str,
    body: &str,
) -> Result<Vec<ListParam>, MappingError> {
    if body.is_empty() {
        return Ok(Vec::new());
    }
    body.split('&')
        .map(|token| {
            let parts = token.split('=').collect::<Vec<_>>();
            match parts.as_slice() {
                [key] if !key.is_empty() => Ok(ListParam::Cell(key.to_string())),
                [key, value] if !key.is_empty() => Ok(ListParam::Literal {
                    key: key.to_string(),
                    value: value.to_string(),
                }),
                _ => Err(MappingError::MalformedListParameter {
                    column,
                    header: header.to_string(),
                    token: token.to_string(),
                }),
            }
        })
        .collect()
}

/// Resolves one header cell.
///
/// The outer error is fatal for the run, the inner one drops the column.
pub fn resolve_column(
    column: usize,
    cell: &str,
) -> Result<Result<ColumnSpec, HeaderError>, MappingError> {
    let path = match parse_field_path(cell) {
        Ok(path) => path,
        Err(err) => return Ok(Err(err)),
    };
    let (parents, target) = match split_field_path(column, cell, &path)? {
        Ok(split) => split,
        Err(err) => return Ok(Err(err)),
    };
    let scalar_type = match parse_scalar_type(cell).and_then(|ty| ty.parse::<ScalarType>()) {
        Ok(ty) => ty,
        Err(err) => return Ok(Err(err)),
    };
    Ok(Ok(ColumnSpec {
        parents,
        target,
        scalar_type,
    }))
}

#[derive(Debug, Clone)]
pub struct HeaderColumn {
    pub header: String,
    pub spec: Result<ColumnSpec, HeaderError>,
}

/// The header row, resolved once and shared by every data row.
#[derive(Debug, Clone)]
pub struct HeaderSchema {
    pub columns: Vec<HeaderColumn>,
}

impl HeaderSchema {
    pub fn parse<S: AsRef<str>>(headers: &[S]) -> Result<Self, MappingError> {
        let columns = headers
            .iter()
            .enumerate()
            .map(|(idx, header)| {
                let header = header.as_ref();
                Ok(HeaderColumn {
                    header: header.to_string(),
                    spec: resolve_column(idx, header)?,
                })
            })
            .collect::<Result<Vec<_>, MappingError>>()?;
        Ok(HeaderSchema { columns })
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Columns dropped for every row, with the reason.
    pub fn unresolved(&self) -> impl Iterator<Item = (usize, &HeaderColumn, &HeaderError)> {
        self.columns
            .iter()
            .enumerate()
            .filter_map(|(idx, column)| column.spec.as_ref().err().map(|err| (idx, column, err)))
    }
}
