//! Converts one reflected runtime value into a [`Type`].
//!
//! Sampling is total: any value the instrumentation boundary can hand us maps
//! to *some* shape, degrading to [`Type::TypeVar`], [`Type::Malformed`], or
//! [`Type::Unknown`] instead of erroring.

use std::collections::BTreeMap;

use crate::descriptor::Type;

/// The reflected shape of one captured concrete value, as delivered by the
/// (out of scope) instrumentation hook.
#[derive(Clone, Debug, PartialEq)]
pub enum RuntimeValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<RuntimeValue>),
    Set(Vec<RuntimeValue>),
    FrozenSet(Vec<RuntimeValue>),
    Tuple(Vec<RuntimeValue>),
    Dict(Vec<(RuntimeValue, RuntimeValue)>),
    Generator {
        yields: Vec<RuntimeValue>,
        sends: Vec<RuntimeValue>,
        returns: Option<Box<RuntimeValue>>,
    },
    /// An instance of an arbitrary class, identified by its qualified name.
    Instance { class: String },
    /// A function, method, or other callable.
    Callable,
    /// A parametric/unresolvable type variable met during reflection.
    Parametric { var: String },
    /// A value whose structure could not be captured uniformly.
    Unreadable { marker: String },
}

/// Capability interface for anything the sampler can describe. Value
/// categories the engine does not recognize fall back to `Unknown` rather
/// than requiring exhaustive coverage.
pub trait Describable {
    /// Return the type shape a hint would use for this value.
    fn describe(&self, max_record_size: usize) -> Type;
}

/// Describe a single captured value.
///
/// `max_record_size` is the structural-record field-count ceiling; 0 disables
/// record sampling so every mapping stays a generic `Dict`.
pub fn sample<T: Describable + ?Sized>(value: &T, max_record_size: usize) -> Type {
    value.describe(max_record_size)
}

impl Describable for RuntimeValue {
    fn describe(&self, max_record_size: usize) -> Type {
        match self {
            RuntimeValue::None => Type::none(),
            RuntimeValue::Bool(_) => Type::scalar("builtins.bool"),
            RuntimeValue::Int(_) => Type::scalar("builtins.int"),
            RuntimeValue::Float(_) => Type::scalar("builtins.float"),
            RuntimeValue::Str(_) => Type::scalar("builtins.str"),
            RuntimeValue::Bytes(_) => Type::scalar("builtins.bytes"),
            RuntimeValue::List(elems) => {
                Type::list_of(describe_elements(elems, max_record_size))
            }
            RuntimeValue::Set(elems) => {
                Type::set_of(describe_elements(elems, max_record_size))
            }
            RuntimeValue::FrozenSet(elems) => {
                Type::frozenset_of(describe_elements(elems, max_record_size))
            }
            RuntimeValue::Tuple(elems) => Type::Tuple(
                elems
                    .iter()
                    .map(|e| e.describe(max_record_size))
                    .collect(),
            ),
            RuntimeValue::Dict(entries) => describe_dict(entries, max_record_size),
            RuntimeValue::Generator {
                yields,
                sends,
                returns,
            } => describe_generator(yields, sends, returns.as_deref(), max_record_size),
            RuntimeValue::Instance { class } => Type::scalar(class.clone()),
            RuntimeValue::Callable => Type::callable(),
            RuntimeValue::Parametric { var } => Type::TypeVar(var.clone()),
            RuntimeValue::Unreadable { marker } => Type::Malformed(marker.clone()),
        }
    }
}

/// Collapse the element types of an ordered container into one descriptor.
/// Empty containers carry no element information.
fn describe_elements(elems: &[RuntimeValue], max_record_size: usize) -> Type {
    if elems.is_empty() {
        return Type::Unknown;
    }
    Type::union(elems.iter().map(|e| e.describe(max_record_size)))
}

/// A mapping with at most `max_record_size` distinct string keys becomes an
/// anonymous record with every observed key required; whether a key is
/// actually optional can only be decided across samples, by the shrinker.
fn describe_dict(entries: &[(RuntimeValue, RuntimeValue)], max_record_size: usize) -> Type {
    if max_record_size > 0 {
        let mut fields: BTreeMap<String, Type> = BTreeMap::new();
        let mut all_string_keys = true;
        for (key, value) in entries {
            match key {
                RuntimeValue::Str(name) => {
                    // Duplicate keys behave like dict assignment: last wins.
                    fields.insert(name.clone(), value.describe(max_record_size));
                }
                _ => {
                    all_string_keys = false;
                    break;
                }
            }
        }
        if all_string_keys && fields.len() <= max_record_size {
            return Type::record(None, fields, BTreeMap::new());
        }
    }
    if entries.is_empty() {
        return Type::dict_of(Type::Unknown, Type::Unknown);
    }
    let key = Type::union(entries.iter().map(|(k, _)| k.describe(max_record_size)));
    let value = Type::union(entries.iter().map(|(_, v)| v.describe(max_record_size)));
    Type::dict_of(key, value)
}

/// Each generator slot is sampled independently. A generator that never
/// receives a sent value or never returns meaningfully has `NoneType` in
/// those slots.
fn describe_generator(
    yields: &[RuntimeValue],
    sends: &[RuntimeValue],
    returns: Option<&RuntimeValue>,
    max_record_size: usize,
) -> Type {
    let yield_type = if yields.is_empty() {
        Type::Unknown
    } else {
        Type::union(yields.iter().map(|y| y.describe(max_record_size)))
    };
    let send_type = if sends.is_empty() {
        Type::none()
    } else {
        Type::union(sends.iter().map(|s| s.describe(max_record_size)))
    };
    let return_type = match returns {
        None => Type::none(),
        Some(value) => value.describe(max_record_size),
    };
    Type::generator(yield_type, send_type, return_type)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
