//! The inferred-type model shared across sampling, shrinking, rewriting, and
//! encoding.
//!
//! [`Type`] is an immutable tagged union. Structural equality is deep, and
//! order-insensitive wherever the representation is a set: union members are
//! kept sorted and deduplicated by the [`Type::union`] constructor, record
//! fields live in `BTreeMap`s. The derived `Ord` doubles as the canonical
//! ordering used everywhere a deterministic result is required.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Qualified name of the Python `None` singleton type.
pub const NONE_TYPE: &str = "builtins.NoneType";

/// Qualified name of the `NotImplemented` singleton type.
pub const NOT_IMPLEMENTED_TYPE: &str = "builtins.NotImplementedType";

/// Qualified name of the builtin string type.
pub const STR_TYPE: &str = "builtins.str";

/// Qualified name used for callables of any arity.
pub const CALLABLE_TYPE: &str = "typing.Callable";

/// The flavor of an ordered homogeneous container.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SequenceKind {
    List,
    Set,
    FrozenSet,
    Iterator,
}

/// One inferred type shape.
///
/// Values are never mutated after construction; every transformation builds a
/// fresh tree. The serialized form is adjacently tagged
/// (`{"kind": ..., "val": ...}`), which is what the codec stores.
#[derive(
    Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(tag = "kind", content = "val", rename_all = "snake_case")]
pub enum Type {
    /// An atomic runtime type identity, stored as the module-qualified class
    /// name (`"builtins.int"`, `"myapp.models.User"`, ...).
    Scalar(String),
    /// An ordered homogeneous container (list/set/frozenset/iterator).
    Sequence { kind: SequenceKind, elem: Box<Type> },
    /// A homogeneous key/value mapping.
    Dict { key: Box<Type>, value: Box<Type> },
    /// A fixed-arity heterogeneous tuple. The empty tuple is a distinct,
    /// valid zero-arity value.
    Tuple(Vec<Type>),
    /// An inferred record shape with string keys; presence/absence of each
    /// key across samples is tracked by the required/optional split.
    Record {
        name: Option<String>,
        required: BTreeMap<String, Type>,
        optional: BTreeMap<String, Type>,
    },
    /// One of several alternative shapes. Always sorted, deduplicated, at
    /// least two members, never directly nested. Construct via
    /// [`Type::union`].
    Union(Vec<Type>),
    /// A generator's yield/send/return slots.
    Generator {
        yields: Box<Type>,
        sends: Box<Type>,
        returns: Box<Type>,
    },
    /// Placeholder for an unresolvable or parametric type met during
    /// reflection.
    TypeVar(String),
    /// Sentinel for a container whose structure could not be captured
    /// uniformly. Opaque leaf.
    Malformed(String),
    /// Top type; the "give up, be permissive" escape hatch.
    Unknown,
}

impl Type {
    pub fn scalar(name: impl Into<String>) -> Type {
        Type::Scalar(name.into())
    }

    pub fn none() -> Type {
        Type::Scalar(NONE_TYPE.to_string())
    }

    pub fn callable() -> Type {
        Type::Scalar(CALLABLE_TYPE.to_string())
    }

    pub fn sequence_of(kind: SequenceKind, elem: Type) -> Type {
        Type::Sequence {
            kind,
            elem: Box::new(elem),
        }
    }

    pub fn list_of(elem: Type) -> Type {
        Type::sequence_of(SequenceKind::List, elem)
    }

    pub fn set_of(elem: Type) -> Type {
        Type::sequence_of(SequenceKind::Set, elem)
    }

    pub fn frozenset_of(elem: Type) -> Type {
        Type::sequence_of(SequenceKind::FrozenSet, elem)
    }

    pub fn iterator_of(elem: Type) -> Type {
        Type::sequence_of(SequenceKind::Iterator, elem)
    }

    pub fn dict_of(key: Type, value: Type) -> Type {
        Type::Dict {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn generator(yields: Type, sends: Type, returns: Type) -> Type {
        Type::Generator {
            yields: Box::new(yields),
            sends: Box::new(sends),
            returns: Box::new(returns),
        }
    }

    /// Build a record shape. Keys present in both maps are kept in
    /// `required`, preserving the invariant that the two field sets are
    /// disjoint.
    pub fn record(
        name: Option<String>,
        required: BTreeMap<String, Type>,
        mut optional: BTreeMap<String, Type>,
    ) -> Type {
        optional.retain(|key, _| !required.contains_key(key));
        Type::Record {
            name,
            required,
            optional,
        }
    }

    /// Build the smallest type covering all of `members`.
    ///
    /// Nested unions are flattened, duplicates dropped, and the result is
    /// sorted canonically. An empty iterator yields `Unknown`; a single
    /// distinct member is returned bare rather than wrapped.
    pub fn union(members: impl IntoIterator<Item = Type>) -> Type {
        let mut set: BTreeSet<Type> = BTreeSet::new();
        for member in members {
            match member {
                Type::Union(inner) => set.extend(inner),
                other => {
                    set.insert(other);
                }
            }
        }
        match set.len() {
            0 => Type::Unknown,
            1 => set.into_iter().next().expect("len checked"),
            _ => Type::Union(set.into_iter().collect()),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Type::Scalar(name) if name == NONE_TYPE)
    }

    /// True for a container shape whose element slots carry no information,
    /// i.e. the shape produced by sampling an empty container.
    pub fn is_empty_container(&self) -> bool {
        match self {
            Type::Sequence { elem, .. } => **elem == Type::Unknown,
            Type::Dict { key, value } => **key == Type::Unknown && **value == Type::Unknown,
            _ => false,
        }
    }

    /// The container family of this shape, used when deciding whether two
    /// union members are redundant variants of the same container.
    pub fn container_kind(&self) -> Option<ContainerKind> {
        match self {
            Type::Sequence { kind, .. } => Some(ContainerKind::Sequence(*kind)),
            Type::Dict { .. } => Some(ContainerKind::Dict),
            _ => None,
        }
    }

    /// True for generic mappings and record shapes alike.
    pub fn is_mapping(&self) -> bool {
        matches!(self, Type::Dict { .. } | Type::Record { .. })
    }
}

/// Container family marker; see [`Type::container_kind`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerKind {
    Sequence(SequenceKind),
    Dict,
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Strip the `builtins.` prefix so common scalars render as bare names.
fn short_name(qualified: &str) -> &str {
    qualified.strip_prefix("builtins.").unwrap_or(qualified)
}

impl fmt::Display for SequenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SequenceKind::List => "List",
            SequenceKind::Set => "Set",
            SequenceKind::FrozenSet => "FrozenSet",
            SequenceKind::Iterator => "Iterator",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Type {
    /// Render the PEP-484-style spelling of the shape. Unions containing
    /// `NoneType` are rendered as `Optional[...]`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Scalar(name) => f.write_str(short_name(name)),
            Type::Sequence { kind, elem } => write!(f, "{kind}[{elem}]"),
            Type::Dict { key, value } => write!(f, "Dict[{key}, {value}]"),
            Type::Tuple(elems) => {
                if elems.is_empty() {
                    return f.write_str("Tuple[()]");
                }
                f.write_str("Tuple[")?;
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{elem}")?;
                }
                f.write_str("]")
            }
            Type::Record {
                name,
                required,
                optional,
            } => {
                f.write_str(name.as_deref().unwrap_or("TypedDict"))?;
                f.write_str("({")?;
                let mut first = true;
                for (field, typ) in required {
                    if !first {
                        f.write_str(", ")?;
                    }
                    first = false;
                    write!(f, "{field:?}: {typ}")?;
                }
                for (field, typ) in optional {
                    if !first {
                        f.write_str(", ")?;
                    }
                    first = false;
                    write!(f, "{field:?}?: {typ}")?;
                }
                f.write_str("})")
            }
            Type::Union(members) => {
                let non_none: Vec<&Type> =
                    members.iter().filter(|m| !m.is_none()).collect();
                if non_none.len() < members.len() {
                    // Optional[...] special case.
                    if non_none.len() == 1 {
                        return write!(f, "Optional[{}]", non_none[0]);
                    }
                    f.write_str("Optional[Union[")?;
                    for (i, member) in non_none.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{member}")?;
                    }
                    return f.write_str("]]");
                }
                f.write_str("Union[")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{member}")?;
                }
                f.write_str("]")
            }
            Type::Generator {
                yields,
                sends,
                returns,
            } => write!(f, "Generator[{yields}, {sends}, {returns}]"),
            Type::TypeVar(id) => f.write_str(id),
            Type::Malformed(marker) => write!(f, "<malformed {marker}>"),
            Type::Unknown => f.write_str("Any"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn int() -> Type {
        Type::scalar("builtins.int")
    }

    fn string() -> Type {
        Type::scalar("builtins.str")
    }

    #[test]
    fn test_union_empty_is_unknown() {
        assert_eq!(Type::union([]), Type::Unknown);
    }

    #[test]
    fn test_union_singleton_unwraps() {
        assert_eq!(Type::union([int()]), int());
    }

    #[test]
    fn test_union_dedups() {
        assert_eq!(Type::union([int(), int()]), int());
    }

    #[test]
    fn test_union_sorts_canonically() {
        let a = Type::union([int(), string()]);
        let b = Type::union([string(), int()]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_union_flattens_nested() {
        let inner = Type::union([int(), string()]);
        let outer = Type::union([inner, Type::none()]);
        match outer {
            Type::Union(members) => assert_eq!(members.len(), 3),
            other => panic!("expected union, got {other:?}"),
        }
    }

    #[test]
    fn test_record_fields_are_disjoint() {
        let mut required = BTreeMap::new();
        required.insert("a".to_string(), int());
        let mut optional = BTreeMap::new();
        optional.insert("a".to_string(), string());
        optional.insert("b".to_string(), string());
        match Type::record(None, required, optional) {
            Type::Record {
                required, optional, ..
            } => {
                assert!(required.contains_key("a"));
                assert!(!optional.contains_key("a"));
                assert!(optional.contains_key("b"));
            }
            other => panic!("expected record, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_tuple_is_distinct() {
        assert_ne!(Type::Tuple(vec![]), Type::list_of(Type::Unknown));
        assert_ne!(Type::Tuple(vec![]), Type::Tuple(vec![int()]));
    }

    #[test]
    fn test_empty_container_detection() {
        assert!(Type::list_of(Type::Unknown).is_empty_container());
        assert!(Type::dict_of(Type::Unknown, Type::Unknown).is_empty_container());
        assert!(!Type::list_of(int()).is_empty_container());
        assert!(!Type::Tuple(vec![]).is_empty_container());
    }

    #[test]
    fn test_display_scalars() {
        assert_eq!(int().to_string(), "int");
        assert_eq!(Type::scalar("myapp.models.User").to_string(), "myapp.models.User");
        assert_eq!(Type::Unknown.to_string(), "Any");
    }

    #[test]
    fn test_display_optional() {
        let t = Type::union([int(), Type::none()]);
        assert_eq!(t.to_string(), "Optional[int]");
    }

    #[test]
    fn test_display_containers() {
        assert_eq!(Type::list_of(int()).to_string(), "List[int]");
        assert_eq!(
            Type::dict_of(string(), int()).to_string(),
            "Dict[str, int]"
        );
        assert_eq!(Type::Tuple(vec![]).to_string(), "Tuple[()]");
    }

    #[test]
    fn test_canonical_order_is_stable() {
        let members = vec![string(), int(), Type::none()];
        let a = Type::union(members.clone());
        let b = Type::union(members.into_iter().rev());
        assert_eq!(a, b);
        if let Type::Union(ms) = a {
            let mut sorted = ms.clone();
            sorted.sort();
            assert_eq!(ms, sorted);
        }
    }
}
