//! Post-processing passes over inferred descriptors.
//!
//! [`TypeRewriter`] is a tree transformer with one override point per shape
//! and a generic recursive fallback, so a concrete rewriter only implements
//! the shapes it cares about. Rewriters are pure: they never fail on a
//! well-formed descriptor, and `Malformed`/`Unknown` are treated as opaque
//! leaves. Policy composition is an explicit ordered chain, not a registry.

use crate::config::{CoreConfig, DEFAULT_MAX_UNION_MEMBERS};
use crate::descriptor::Type;
use crate::trace::AggregatedSignature;

/// A pure transformation over a descriptor tree.
///
/// The default `rewrite` dispatches on the shape; every per-shape method
/// falls back to [`TypeRewriter::generic_rewrite`], which recurses into the
/// children with the same rewriter and reconstructs the parent. The six
/// built-in implementations are the trusted surface; arbitrary third-party
/// rewriters returning structurally invalid descriptors are a documented
/// extension risk, not a guarded one.
pub trait TypeRewriter: Send + Sync {
    fn rewrite(&self, typ: Type) -> Type {
        match typ {
            typ @ Type::Sequence { .. } => self.rewrite_sequence(typ),
            typ @ Type::Dict { .. } => self.rewrite_dict(typ),
            typ @ Type::Tuple(_) => self.rewrite_tuple(typ),
            typ @ Type::Record { .. } => self.rewrite_record(typ),
            typ @ Type::Union(_) => self.rewrite_union(typ),
            typ @ Type::Generator { .. } => self.rewrite_generator(typ),
            leaf => self.rewrite_atom(leaf),
        }
    }

    fn rewrite_sequence(&self, typ: Type) -> Type {
        self.generic_rewrite(typ)
    }

    fn rewrite_dict(&self, typ: Type) -> Type {
        self.generic_rewrite(typ)
    }

    fn rewrite_tuple(&self, typ: Type) -> Type {
        self.generic_rewrite(typ)
    }

    fn rewrite_record(&self, typ: Type) -> Type {
        self.generic_rewrite(typ)
    }

    fn rewrite_union(&self, typ: Type) -> Type {
        self.generic_rewrite(typ)
    }

    fn rewrite_generator(&self, typ: Type) -> Type {
        self.generic_rewrite(typ)
    }

    /// Leaf shapes (`Scalar`, `TypeVar`, `Malformed`, `Unknown`).
    fn rewrite_atom(&self, typ: Type) -> Type {
        typ
    }

    /// Recurse into every child with `self.rewrite` and rebuild the shape.
    /// Union results are re-canonicalized through [`Type::union`].
    fn generic_rewrite(&self, typ: Type) -> Type {
        match typ {
            Type::Sequence { kind, elem } => Type::sequence_of(kind, self.rewrite(*elem)),
            Type::Dict { key, value } => {
                Type::dict_of(self.rewrite(*key), self.rewrite(*value))
            }
            Type::Tuple(elems) => {
                Type::Tuple(elems.into_iter().map(|e| self.rewrite(e)).collect())
            }
            Type::Record {
                name,
                required,
                optional,
            } => Type::record(
                name,
                required
                    .into_iter()
                    .map(|(field, typ)| (field, self.rewrite(typ)))
                    .collect(),
                optional
                    .into_iter()
                    .map(|(field, typ)| (field, self.rewrite(typ)))
                    .collect(),
            ),
            Type::Union(members) => {
                Type::union(members.into_iter().map(|m| self.rewrite(m)))
            }
            Type::Generator {
                yields,
                sends,
                returns,
            } => Type::generator(
                self.rewrite(*yields),
                self.rewrite(*sends),
                self.rewrite(*returns),
            ),
            leaf => leaf,
        }
    }
}

/// Run every slot of an aggregated signature through `rewriter`.
pub fn rewrite_signature(
    sig: AggregatedSignature,
    rewriter: &dyn TypeRewriter,
) -> AggregatedSignature {
    AggregatedSignature {
        module: sig.module,
        qualname: sig.qualname,
        arg_types: sig
            .arg_types
            .into_iter()
            .map(|(name, typ)| (name, rewriter.rewrite(typ)))
            .collect(),
        return_type: sig.return_type.map(|typ| rewriter.rewrite(typ)),
        yield_type: sig.yield_type.map(|typ| rewriter.rewrite(typ)),
    }
}

// ---------------------------------------------------------------------------
// Built-in rewriters
// ---------------------------------------------------------------------------

/// Drop redundant empty containers from unions.
///
/// An empty container is sampled as `C[Unknown]`; when a union also holds the
/// same container kind with a concrete element type, the empty member is
/// strictly subsumed and removed. `Union[List[Any], List[int]] -> List[int]`.
pub struct RemoveEmptyContainers;

impl TypeRewriter for RemoveEmptyContainers {
    fn rewrite_union(&self, typ: Type) -> Type {
        match typ {
            Type::Union(members) => {
                let kept: Vec<Type> = members
                    .iter()
                    .filter(|member| {
                        if !member.is_empty_container() {
                            return true;
                        }
                        let kind = member.container_kind();
                        !members.iter().any(|other| {
                            !other.is_empty_container() && other.container_kind() == kind
                        })
                    })
                    .cloned()
                    .collect();
                Type::union(kept.into_iter().map(|member| self.rewrite(member)))
            }
            other => self.generic_rewrite(other),
        }
    }
}

/// `Union[Dict[K, V1], ..., Dict[K, VN]] -> Dict[K, Union[V1, ..., VN]]`.
///
/// Any non-mapping member or key-type mismatch leaves the union alone. This
/// is the same merge the shrinker applies to same-kind containers, exposed as
/// an independent pass so policy stays decoupled from the core aggregation.
pub struct MergeSiblingDicts;

impl TypeRewriter for MergeSiblingDicts {
    fn rewrite_union(&self, typ: Type) -> Type {
        match typ {
            Type::Union(members) => {
                let mut key_type: Option<Type> = None;
                let mut value_types: Vec<Type> = Vec::new();
                let mut uniform = true;
                for member in &members {
                    match member {
                        Type::Dict { key, value } => {
                            let key = key.as_ref();
                            if *key_type.get_or_insert_with(|| key.clone()) != *key {
                                uniform = false;
                                break;
                            }
                            value_types.push(value.as_ref().clone());
                        }
                        _ => {
                            uniform = false;
                            break;
                        }
                    }
                }
                match (uniform, key_type) {
                    // Recurse into the merged dict so the value union (one
                    // level shallower than the input) is itself merged; a
                    // single pass then reaches the fixed point.
                    (true, Some(key)) => {
                        self.generic_rewrite(Type::dict_of(key, Type::union(value_types)))
                    }
                    _ => self.generic_rewrite(Type::Union(members)),
                }
            }
            other => self.generic_rewrite(other),
        }
    }
}

/// Collapse unions above a member cap to `Unknown`; such unions are noise,
/// not useful documentation.
pub struct CapUnionSize {
    pub max_members: usize,
}

impl CapUnionSize {
    pub fn new(max_members: usize) -> Self {
        Self { max_members }
    }
}

impl Default for CapUnionSize {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UNION_MEMBERS)
    }
}

impl TypeRewriter for CapUnionSize {
    fn rewrite_union(&self, typ: Type) -> Type {
        match &typ {
            Type::Union(members) if members.len() > self.max_members => Type::Unknown,
            _ => self.generic_rewrite(typ),
        }
    }
}

/// Rewrite a generator that is never sent to and never returns a value as a
/// plain iterator over its yield type; the two are behaviorally equivalent.
pub struct NormalizeGenerator;

impl TypeRewriter for NormalizeGenerator {
    fn rewrite_generator(&self, typ: Type) -> Type {
        match typ {
            Type::Generator {
                yields,
                sends,
                returns,
            } if sends.is_none() && returns.is_none() => {
                Type::iterator_of(self.rewrite(*yields))
            }
            other => self.generic_rewrite(other),
        }
    }
}

/// Returns its input unchanged; the default when no rewriting is configured.
pub struct NoOpRewriter;

impl TypeRewriter for NoOpRewriter {
    fn rewrite(&self, typ: Type) -> Type {
        typ
    }
}

/// Applies rewriters in order, feeding each one's output to the next. An
/// empty chain behaves as [`NoOpRewriter`].
pub struct ChainedRewriter {
    rewriters: Vec<Box<dyn TypeRewriter>>,
}

impl ChainedRewriter {
    pub fn new(rewriters: Vec<Box<dyn TypeRewriter>>) -> Self {
        Self { rewriters }
    }
}

impl TypeRewriter for ChainedRewriter {
    fn rewrite(&self, mut typ: Type) -> Type {
        for rewriter in &self.rewriters {
            typ = rewriter.rewrite(typ);
        }
        typ
    }
}

/// The standard post-processing chain: empty-container cleanup, sibling-dict
/// merging, large-union capping, then generator normalization.
pub fn default_rewriter(config: &CoreConfig) -> ChainedRewriter {
    ChainedRewriter::new(vec![
        Box::new(RemoveEmptyContainers),
        Box::new(MergeSiblingDicts),
        Box::new(CapUnionSize::new(config.max_union_members)),
        Box::new(NormalizeGenerator),
    ])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
