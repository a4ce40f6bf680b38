//! JSON wire codec between in-memory traces and their stored row form.
//!
//! A [`CallTraceRow`] is the flat, string-columned shape that goes into the
//! store: identity columns stay as plain text, type columns are JSON
//! documents. Batch conversion isolates failures per item so one corrupt or
//! unencodable trace never poisons the rest of the batch.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::descriptor::Type;
use crate::errors::{TraceError, TraceResult};
use crate::trace::CallTrace;

use indexmap::IndexMap;

/// Encode one descriptor as a JSON document.
pub fn type_to_json(typ: &Type) -> TraceResult<String> {
    Ok(serde_json::to_string(typ)?)
}

/// Decode one descriptor from a JSON document.
pub fn type_from_json(raw: &str) -> TraceResult<Type> {
    Ok(serde_json::from_str(raw)?)
}

/// Encode an ordered argument map as a JSON object. Key order is preserved,
/// so the document reads in declaration order.
pub fn arg_types_to_json(arg_types: &IndexMap<String, Type>) -> TraceResult<String> {
    Ok(serde_json::to_string(arg_types)?)
}

/// Decode an ordered argument map from a JSON object.
pub fn arg_types_from_json(raw: &str) -> TraceResult<IndexMap<String, Type>> {
    Ok(serde_json::from_str(raw)?)
}

/// The storable form of a [`CallTrace`].
///
/// `arg_types` is always a JSON object (possibly empty); `return_type` and
/// `yield_type` columns are nullable and hold a JSON document when present.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallTraceRow {
    pub module: String,
    pub qualname: String,
    pub arg_types: String,
    pub return_type: Option<String>,
    pub yield_type: Option<String>,
}

impl CallTraceRow {
    /// Encode a trace into its row form.
    pub fn from_trace(trace: &CallTrace) -> TraceResult<Self> {
        Ok(Self {
            module: trace.module.clone(),
            qualname: trace.qualname.clone(),
            arg_types: arg_types_to_json(&trace.arg_types)?,
            return_type: trace
                .return_type
                .as_ref()
                .map(type_to_json)
                .transpose()?,
            yield_type: trace.yield_type.as_ref().map(type_to_json).transpose()?,
        })
    }

    /// Decode a row back into a trace. Decode failures carry the row's
    /// call-site identity so corrupt data is attributable.
    pub fn to_trace(&self) -> TraceResult<CallTrace> {
        let decode = |raw: &str| -> TraceResult<Type> {
            serde_json::from_str(raw).map_err(|source| TraceError::Decode {
                module: self.module.clone(),
                qualname: self.qualname.clone(),
                source,
            })
        };
        let arg_types: IndexMap<String, Type> =
            serde_json::from_str(&self.arg_types).map_err(|source| TraceError::Decode {
                module: self.module.clone(),
                qualname: self.qualname.clone(),
                source,
            })?;
        Ok(CallTrace {
            module: self.module.clone(),
            qualname: self.qualname.clone(),
            arg_types,
            return_type: self.return_type.as_deref().map(decode).transpose()?,
            yield_type: self.yield_type.as_deref().map(decode).transpose()?,
        })
    }
}

/// Encode a batch of traces, skipping (and logging) any that fail.
pub fn serialize_traces(traces: &[CallTrace]) -> Vec<CallTraceRow> {
    let mut rows = Vec::with_capacity(traces.len());
    for trace in traces {
        match CallTraceRow::from_trace(trace) {
            Ok(row) => rows.push(row),
            Err(err) => {
                warn!(fqname = %trace.fqname(), error = %err, "dropping unencodable trace");
            }
        }
    }
    rows
}

/// Decode a batch of rows, skipping (and logging) any that fail.
pub fn decode_traces(rows: &[CallTraceRow]) -> Vec<CallTrace> {
    let mut traces = Vec::with_capacity(rows.len());
    for row in rows {
        match row.to_trace() {
            Ok(trace) => traces.push(trace),
            Err(err) => {
                warn!(
                    module = %row.module,
                    qualname = %row.qualname,
                    error = %err,
                    "dropping undecodable trace row"
                );
            }
        }
    }
    traces
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::SequenceKind;
    use std::collections::BTreeMap;

    fn int() -> Type {
        Type::scalar("builtins.int")
    }

    fn deep_type() -> Type {
        let mut required = BTreeMap::new();
        required.insert("id".to_string(), int());
        let mut optional = BTreeMap::new();
        optional.insert("tags".to_string(), Type::set_of(Type::scalar("builtins.str")));
        Type::union([
            Type::record(None, required, optional),
            Type::Tuple(vec![int(), Type::none()]),
            Type::generator(
                Type::dict_of(Type::scalar("builtins.str"), Type::Unknown),
                Type::none(),
                Type::none(),
            ),
            Type::sequence_of(SequenceKind::FrozenSet, Type::TypeVar("T".to_string())),
            Type::Malformed("recursion limit".to_string()),
        ])
    }

    #[test]
    fn test_type_round_trip_covers_all_shapes() {
        let typ = deep_type();
        let json = type_to_json(&typ).unwrap();
        assert_eq!(type_from_json(&json).unwrap(), typ);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let typ = deep_type();
        assert_eq!(type_to_json(&typ).unwrap(), type_to_json(&typ).unwrap());
    }

    #[test]
    fn test_arg_types_preserve_order() {
        let mut args = IndexMap::new();
        args.insert("zeta".to_string(), int());
        args.insert("alpha".to_string(), Type::none());
        let json = arg_types_to_json(&args).unwrap();
        let decoded = arg_types_from_json(&json).unwrap();
        let keys: Vec<&String> = decoded.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_row_round_trip() {
        let mut args = IndexMap::new();
        args.insert("x".to_string(), deep_type());
        let trace = CallTrace::new("myapp.api", "handler", args, Some(int()), None);
        let row = CallTraceRow::from_trace(&trace).unwrap();
        assert_eq!(row.to_trace().unwrap(), trace);
    }

    #[test]
    fn test_corrupt_row_is_attributable() {
        let row = CallTraceRow {
            module: "myapp.api".to_string(),
            qualname: "handler".to_string(),
            arg_types: "{not json".to_string(),
            return_type: None,
            yield_type: None,
        };
        match row.to_trace() {
            Err(TraceError::Decode {
                module, qualname, ..
            }) => {
                assert_eq!(module, "myapp.api");
                assert_eq!(qualname, "handler");
            }
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_batch_isolates_corruption() {
        let good = CallTraceRow::from_trace(&CallTrace::new(
            "m",
            "f",
            IndexMap::new(),
            Some(int()),
            None,
        ))
        .unwrap();
        let mut rows: Vec<CallTraceRow> = (0..99).map(|_| good.clone()).collect();
        rows.insert(
            40,
            CallTraceRow {
                module: "m".to_string(),
                qualname: "broken".to_string(),
                arg_types: "{}".to_string(),
                return_type: Some("][".to_string()),
                yield_type: None,
            },
        );
        let traces = decode_traces(&rows);
        assert_eq!(traces.len(), 99);
        assert!(traces.iter().all(|t| t.qualname == "f"));
    }

    #[test]
    fn test_serialize_batch_preserves_order() {
        let traces: Vec<CallTrace> = (0..5)
            .map(|i| CallTrace::new("m", format!("f{i}"), IndexMap::new(), None, None))
            .collect();
        let rows = serialize_traces(&traces);
        let names: Vec<&str> = rows.iter().map(|r| r.qualname.as_str()).collect();
        assert_eq!(names, vec!["f0", "f1", "f2", "f3", "f4"]);
    }
}
