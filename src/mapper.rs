//! Row to document mapping.
//!
//! [`RecordMapper`] applies a resolved [`HeaderSchema`] to data rows. It never
//! logs: every discarded cell comes back as a [`DroppedValue`] and the caller
//! decides how to report it.

use std::fmt;

use crate::{
    config::CoercionConfig,
    data::{CoercionError, Value, coerce},
    document::{Collision, Document, Node},
    header::{ColumnSpec, FieldTarget, HeaderError, HeaderSchema, ListParam, MappingError},
};

#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    Header(HeaderError),
    Coercion(CoercionError),
    PathCollision { segment: String, found: &'static str },
    MissingCell,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::Header(err) => write!(f, "{err}"),
            DropReason::Coercion(err) => write!(f, "{err}"),
            DropReason::PathCollision { segment, found } => {
                write!(f, "'{segment}' already holds a {found}")
            }
            DropReason::MissingCell => write!(f, "Row has no cell for this column"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DroppedValue {
    pub column: usize,
    pub header: String,
    pub cell: String,
    pub reason: DropReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MappedRecord {
    pub document: Document,
    pub dropped: Vec<DroppedValue>,
}

#[derive(Debug, Clone)]
pub struct RecordMapper {
    schema: HeaderSchema,
    config: CoercionConfig,
}

impl RecordMapper {
    pub fn new(schema: HeaderSchema, config: CoercionConfig) -> Self {
        Self { schema, config }
    }

    pub fn from_headers<S: AsRef<str>>(
        headers: &[S],
        config: CoercionConfig,
    ) -> Result<Self, MappingError> {
        Ok(Self::new(HeaderSchema::parse(headers)?, config))
    }

    pub fn schema(&self) -> &HeaderSchema {
        &self.schema
    }

    /// Maps one data row. Returns `None` for a row without any content.
    pub fn map<S: AsRef<str>>(&self, row: &[S]) -> Option<MappedRecord> {
        if row.iter().all(|cell| cell.as_ref().is_empty()) {
            return None;
        }
        let mut document = Document::new();
        let mut dropped = Vec::new();
        for (idx, column) in self.schema.columns.iter().enumerate() {
            let dropped_value = |cell: &str, reason: DropReason| DroppedValue {
                column: idx,
                header: column.header.clone(),
                cell: cell.to_string(),
                reason,
            };
            let Some(cell) = row.get(idx).map(|cell| cell.as_ref()) else {
                dropped.push(dropped_value("", DropReason::MissingCell));
                continue;
            };
            let spec = match &column.spec {
                Ok(spec) => spec,
                Err(err) => {
                    dropped.push(dropped_value(cell, DropReason::Header(err.clone())));
                    continue;
                }
            };
            let value = match coerce(cell, spec.scalar_type, &self.config) {
                Ok(value) => value,
                Err(err) => {
                    dropped.push(dropped_value(cell, DropReason::Coercion(err)));
                    continue;
                }
            };
            if let Err((segment, collision)) = place_value(&mut document, spec, value) {
                dropped.push(dropped_value(
                    cell,
                    DropReason::PathCollision {
                        segment,
                        found: collision.found,
                    },
                ));
            }
        }
        Some(MappedRecord { document, dropped })
    }
}

/// Writes `value` at the position `spec` describes.
fn place_value(
    document: &mut Document,
    spec: &ColumnSpec,
    value: Value,
) -> Result<(), (String, Collision)> {
    let target = document.walk_mut(&spec.parents)?;
    match &spec.target {
        FieldTarget::Field(name) => {
            target.insert(name.as_str(), value);
        }
        FieldTarget::List { name, params } => {
            let list = target
                .entry_list(name)
                .map_err(|collision| (name.clone(), collision))?;
            list.push(list_element(params, value));
        }
    }
    Ok(())
}

fn list_element(params: &[ListParam], value: Value) -> Node {
    if params.is_empty() {
        return Node::Scalar(value);
    }
    let element = params
        .iter()
        .map(|param| match param {
            ListParam::Literal { key, value: literal } => {
                (key.clone(), Node::Scalar(Value::from(literal.as_str())))
            }
            ListParam::Cell(key) => (key.clone(), Node::Scalar(value.clone())),
        })
        .collect::<Document>();
    Node::Map(element)
}

/// Parses `headers` and maps a single `row`.
pub fn map_record<S: AsRef<str>, T: AsRef<str>>(
    row: &[S],
    headers: &[T],
    config: &CoercionConfig,
) -> Result<Option<MappedRecord>, MappingError> {
    let mapper = RecordMapper::from_headers(headers, config.clone())?;
    Ok(mapper.map(row))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapper(headers: &[&str]) -> RecordMapper {
        RecordMapper::from_headers(headers, CoercionConfig::default()).unwrap()
    }

    fn json_of(mapper: &RecordMapper, row: &[&str]) -> serde_json::Value {
        mapper.map(row).unwrap().document.to_json().unwrap()
    }

    #[test]
    fn nested_paths_build_nested_maps() {
        let mapper = mapper(&["a.b.c(INTEGER)", "a.b.d(STRING)", "e(BOOLEAN)"]);
        assert_eq!(
            json_of(&mapper, &["5", "x", "TRUE"]),
            json!({"a": {"b": {"c": 5, "d": "x"}}, "e": true})
        );
    }

    #[test]
    fn lists_are_built_per_row() {
        let mapper = mapper(&["tags[](STRING)"]);
        assert_eq!(json_of(&mapper, &["x"]), json!({"tags": ["x"]}));
        assert_eq!(json_of(&mapper, &["y"]), json!({"tags": ["y"]}));
    }

    #[test]
    fn repeated_list_columns_append_in_order() {
        let mapper = mapper(&["tags[](STRING)", "tags[](STRING)"]);
        assert_eq!(json_of(&mapper, &["x", "y"]), json!({"tags": ["x", "y"]}));
    }

    #[test]
    fn parameterized_list_appends_one_map_per_cell() {
        let mapper = mapper(&[
            "items[type=fixed&amount](DOUBLE)",
            "items[type=variable&amount](DOUBLE)",
        ]);
        assert_eq!(
            json_of(&mapper, &["10.5", "2"]),
            json!({"items": [
                {"type": "fixed", "amount": 10.5},
                {"type": "variable", "amount": 2.0}
            ]})
        );
    }

    #[test]
    fn literal_params_ignore_cell_value() {
        let mapper = mapper(&["flags[kind=manual](INTEGER)"]);
        assert_eq!(
            json_of(&mapper, &["7"]),
            json!({"flags": [{"kind": "manual"}]})
        );
    }

    #[test]
    fn coercion_failures_drop_only_that_cell() {
        let mapper = mapper(&["amount(DOUBLE)", "name(STRING)"]);
        let record = mapper.map(&["abc", "Alice"]).unwrap();
        assert_eq!(record.document.to_json().unwrap(), json!({"name": "Alice"}));
        assert_eq!(record.dropped.len(), 1);
        assert_eq!(record.dropped[0].column, 0);
        assert_eq!(record.dropped[0].cell, "abc");
        assert!(matches!(record.dropped[0].reason, DropReason::Coercion(_)));
    }

    #[test]
    fn unresolved_headers_drop_every_row() {
        let mapper = mapper(&["id(LONG)", "note", "amount(MONEY)"]);
        for row in [["1", "a", "2"], ["2", "b", "3"]] {
            let record = mapper.map(&row).unwrap();
            assert_eq!(record.document.len(), 1);
            let reasons = record
                .dropped
                .iter()
                .map(|d| d.reason.clone())
                .collect::<Vec<_>>();
            assert_eq!(
                reasons,
                vec![
                    DropReason::Header(HeaderError::NoTypeFound("note".into())),
                    DropReason::Header(HeaderError::UnknownType("MONEY".into())),
                ]
            );
        }
    }

    #[test]
    fn path_collision_keeps_existing_scalar() {
        let mapper = mapper(&["a(STRING)", "a.b(STRING)", "c(STRING)", "c[](STRING)"]);
        let record = mapper.map(&["x", "y", "z", "w"]).unwrap();
        assert_eq!(
            record.document.to_json().unwrap(),
            json!({"a": "x", "c": "z"})
        );
        assert_eq!(
            record.dropped.iter().map(|d| d.column).collect::<Vec<_>>(),
            vec![1, 3]
        );
        assert_eq!(
            record.dropped[0].reason,
            DropReason::PathCollision {
                segment: "a".into(),
                found: "scalar",
            }
        );
    }

    #[test]
    fn plain_paths_last_writer_wins() {
        let mapper = mapper(&["a(STRING)", "a(INTEGER)"]);
        assert_eq!(json_of(&mapper, &["x", "3"]), json!({"a": 3}));
    }

    #[test]
    fn empty_rows_yield_no_document() {
        let mapper = mapper(&["a(STRING)", "b(STRING)"]);
        assert!(mapper.map::<&str>(&[]).is_none());
        assert!(mapper.map(&["", ""]).is_none());
        assert!(mapper.map(&["", "x"]).is_some());
    }

    #[test]
    fn short_rows_report_missing_cells() {
        let mapper = mapper(&["a(STRING)", "b(STRING)"]);
        let record = mapper.map(&["x"]).unwrap();
        assert_eq!(record.document.to_json().unwrap(), json!({"a": "x"}));
        assert_eq!(record.dropped[0].reason, DropReason::MissingCell);
    }

    #[test]
    fn map_record_surfaces_fatal_header() {
        let config = CoercionConfig::default();
        assert!(map_record(&["1"], &["items[a=b=c](STRING)"], &config).is_err());
        let record = map_record(&["5"], &["a.b.c(INTEGER)"], &config)
            .unwrap()
            .unwrap();
        assert_eq!(
            record.document.to_json().unwrap(),
            json!({"a": {"b": {"c": 5}}})
        );
    }
}
