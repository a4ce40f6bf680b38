//! Aggregation: merging a multiset of per-sample descriptors for one slot
//! into a single minimal descriptor, and whole-call-site aggregation on top
//! of it.
//!
//! [`shrink_types`] is commutative and idempotent: the result is independent
//! of input order, and re-shrinking a result is a no-op. Everything here is
//! purely functional over immutable inputs, so independent call sites can be
//! aggregated concurrently without locking.

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::debug;

use crate::config::CoreConfig;
use crate::descriptor::{SequenceKind, Type, STR_TYPE};
use crate::rewrite::{rewrite_signature, TypeRewriter};
use crate::trace::{AggregatedSignature, CallTrace};

/// Return the smallest descriptor covering all of `types`.
///
/// Empty input yields `Unknown`. Incoming unions are flattened into the
/// working set before merging, so pre-aggregated inputs behave the same as
/// raw sample lists.
pub fn shrink_types(types: &[Type], config: &CoreConfig) -> Type {
    let mut set: BTreeSet<Type> = BTreeSet::new();
    for typ in types {
        match typ {
            Type::Union(members) => set.extend(members.iter().cloned()),
            other => {
                set.insert(other.clone());
            }
        }
    }
    if set.is_empty() {
        return Type::Unknown;
    }
    if set.len() == 1 {
        let only = set.into_iter().next().expect("len checked");
        return collapse_vacuous_record(only, config);
    }
    if set.iter().all(|t| matches!(t, Type::Record { .. })) {
        return merge_records(set, config);
    }
    if set.iter().all(is_string_keyed_mapping) {
        return merge_into_generic_dict(set, config);
    }
    Type::union(merge_same_kind_containers(set, config))
}

/// A zero-field inferred record says nothing useful; emit a generic empty
/// mapping instead (policy is configurable).
fn collapse_vacuous_record(typ: Type, config: &CoreConfig) -> Type {
    match &typ {
        Type::Record {
            required, optional, ..
        } if config.collapse_empty_record && required.is_empty() && optional.is_empty() => {
            Type::dict_of(Type::Unknown, Type::Unknown)
        }
        _ => typ,
    }
}

fn is_string_keyed_mapping(typ: &Type) -> bool {
    match typ {
        Type::Record { .. } => true,
        Type::Dict { key, .. } => matches!(&**key, Type::Scalar(name) if name == STR_TYPE),
        _ => false,
    }
}

/// Merge record shapes from several samples into one record: a field is
/// required iff every contributing shape requires it, optional otherwise;
/// each field's type is the shrunk union of its observations. Falls back to
/// a generic mapping when the combined key set exceeds the record budget.
fn merge_records(shapes: BTreeSet<Type>, config: &CoreConfig) -> Type {
    let mut parts = Vec::with_capacity(shapes.len());
    let mut all_keys: BTreeSet<String> = BTreeSet::new();
    for shape in &shapes {
        if let Type::Record {
            name,
            required,
            optional,
        } = shape
        {
            all_keys.extend(required.keys().cloned());
            all_keys.extend(optional.keys().cloned());
            parts.push((name, required, optional));
        }
    }
    if config.max_record_size == 0 || all_keys.len() > config.max_record_size {
        return merge_into_generic_dict(shapes.clone(), config);
    }

    let mut required: BTreeMap<String, Type> = BTreeMap::new();
    let mut optional: BTreeMap<String, Type> = BTreeMap::new();
    for key in &all_keys {
        let mut observed: Vec<Type> = Vec::new();
        let mut required_everywhere = true;
        for (_, req, opt) in &parts {
            if let Some(typ) = req.get(key) {
                observed.push(typ.clone());
            } else if let Some(typ) = opt.get(key) {
                observed.push(typ.clone());
                required_everywhere = false;
            } else {
                required_everywhere = false;
            }
        }
        let field_type = shrink_types(&observed, config);
        if required_everywhere {
            required.insert(key.clone(), field_type);
        } else {
            optional.insert(key.clone(), field_type);
        }
    }

    let first_name = parts.first().and_then(|(name, _, _)| (*name).clone());
    let name = if parts.iter().all(|(n, _, _)| **n == first_name) {
        first_name
    } else {
        None
    };
    collapse_vacuous_record(Type::record(name, required, optional), config)
}

/// Merge mapping-shaped members into one generic `Dict` whose key and value
/// types are the shrunk unions of everything observed. Record members
/// contribute a string key and their field types as values; empty mappings
/// contribute nothing.
fn merge_into_generic_dict(shapes: impl IntoIterator<Item = Type>, config: &CoreConfig) -> Type {
    let mut keys: Vec<Type> = Vec::new();
    let mut values: Vec<Type> = Vec::new();
    for shape in shapes {
        match shape {
            Type::Dict { key, value } => {
                if !(*key == Type::Unknown && *value == Type::Unknown) {
                    keys.push(*key);
                    values.push(*value);
                }
            }
            Type::Record {
                required, optional, ..
            } => {
                if !required.is_empty() || !optional.is_empty() {
                    keys.push(Type::scalar(STR_TYPE));
                    values.extend(required.into_values());
                    values.extend(optional.into_values());
                }
            }
            _ => {}
        }
    }
    if keys.is_empty() {
        return Type::dict_of(Type::Unknown, Type::Unknown);
    }
    Type::dict_of(shrink_types(&keys, config), shrink_types(&values, config))
}

/// Shrink one merged container slot, letting concrete observations win over
/// the information-free `Unknown` produced by empty-container samples.
fn shrink_slot(mut types: Vec<Type>, config: &CoreConfig) -> Type {
    if types.iter().any(|t| *t != Type::Unknown) {
        types.retain(|t| *t != Type::Unknown);
    }
    shrink_types(&types, config)
}

/// Merge containers of the same kind before union construction, so shrinking
/// never produces redundant same-shape union members.
fn merge_same_kind_containers(set: BTreeSet<Type>, config: &CoreConfig) -> Vec<Type> {
    let mut sequence_elems: BTreeMap<SequenceKind, Vec<Type>> = BTreeMap::new();
    let mut dict_keys: Vec<Type> = Vec::new();
    let mut dict_values: Vec<Type> = Vec::new();
    let mut saw_dict = false;
    let mut tuples_by_arity: BTreeMap<usize, Vec<Vec<Type>>> = BTreeMap::new();
    let mut rest: Vec<Type> = Vec::new();

    for typ in set {
        match typ {
            Type::Sequence { kind, elem } => {
                sequence_elems.entry(kind).or_default().push(*elem);
            }
            Type::Dict { key, value } => {
                saw_dict = true;
                dict_keys.push(*key);
                dict_values.push(*value);
            }
            Type::Tuple(elems) => {
                tuples_by_arity.entry(elems.len()).or_default().push(elems);
            }
            other => rest.push(other),
        }
    }

    let mut merged: Vec<Type> = Vec::new();
    for (kind, elems) in sequence_elems {
        merged.push(Type::sequence_of(kind, shrink_slot(elems, config)));
    }
    if saw_dict {
        merged.push(Type::dict_of(
            shrink_slot(dict_keys, config),
            shrink_slot(dict_values, config),
        ));
    }
    for (arity, rows) in tuples_by_arity {
        if rows.len() == 1 {
            merged.push(Type::Tuple(rows.into_iter().next().expect("len checked")));
            continue;
        }
        // Equal-arity tuples merge elementwise; differing arities stay
        // distinct union members.
        let mut columns: Vec<Type> = Vec::with_capacity(arity);
        for position in 0..arity {
            let observed: Vec<Type> = rows.iter().map(|row| row[position].clone()).collect();
            columns.push(shrink_types(&observed, config));
        }
        merged.push(Type::Tuple(columns));
    }
    merged.extend(rest);
    merged
}

// ---------------------------------------------------------------------------
// Whole-call-site aggregation
// ---------------------------------------------------------------------------

/// Merge all traces for one call site into its minimal signature.
///
/// Considers at most `config.sample_limit` traces. Parameter order follows
/// first appearance across the considered traces. Returns `None` for an
/// empty input, since there is no call-site identity to report.
pub fn shrink_traces<'a, I>(traces: I, config: &CoreConfig) -> Option<AggregatedSignature>
where
    I: IntoIterator<Item = &'a CallTrace>,
{
    let mut iter = traces.into_iter().take(config.sample_limit);
    let first = iter.next()?;

    let mut arg_observations: IndexMap<String, Vec<Type>> = IndexMap::new();
    let mut return_types: Vec<Type> = Vec::new();
    let mut yield_types: Vec<Type> = Vec::new();
    for trace in std::iter::once(first).chain(iter) {
        for (name, typ) in &trace.arg_types {
            arg_observations
                .entry(name.clone())
                .or_default()
                .push(typ.clone());
        }
        if let Some(typ) = &trace.return_type {
            return_types.push(typ.clone());
        }
        if let Some(typ) = &trace.yield_type {
            yield_types.push(typ.clone());
        }
    }

    let arg_types: IndexMap<String, Type> = arg_observations
        .into_iter()
        .map(|(name, observed)| (name, shrink_types(&observed, config)))
        .collect();
    Some(AggregatedSignature {
        module: first.module.clone(),
        qualname: first.qualname.clone(),
        arg_types,
        return_type: (!return_types.is_empty()).then(|| shrink_types(&return_types, config)),
        yield_type: (!yield_types.is_empty()).then(|| shrink_types(&yield_types, config)),
    })
}

/// Aggregate a flat trace collection: group by (module, qualname), shrink
/// every call site independently in parallel, and run each slot of the
/// result through `rewriter`.
pub fn shrink_all(
    traces: &[CallTrace],
    config: &CoreConfig,
    rewriter: &dyn TypeRewriter,
) -> Vec<AggregatedSignature> {
    let mut groups: BTreeMap<(String, String), Vec<&CallTrace>> = BTreeMap::new();
    for trace in traces {
        groups
            .entry((trace.module.clone(), trace.qualname.clone()))
            .or_default()
            .push(trace);
    }
    debug!(
        sites = groups.len(),
        traces = traces.len(),
        "aggregating call sites"
    );
    let sites: Vec<Vec<&CallTrace>> = groups.into_values().collect();
    sites
        .par_iter()
        .filter_map(|site_traces| {
            shrink_traces(site_traces.iter().copied(), config)
                .map(|sig| rewrite_signature(sig, rewriter))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
