//! Typetrace core library — runtime type inference from observed call traces.
//!
//! This crate turns samples of runtime values into type descriptors, merges
//! the descriptors observed for each call site into one minimal signature,
//! and post-processes the result through a configurable rewriter chain. A
//! SQLite-backed store persists raw traces between the capture and analysis
//! phases.
//!
//! The pipeline, end to end:
//!
//! 1. [`sample::sample`] maps one runtime value to a [`descriptor::Type`].
//! 2. [`store::CallTraceStore`] persists and retrieves [`trace::CallTrace`]
//!    batches via the JSON codec in [`encoding`].
//! 3. [`shrink::shrink_all`] folds each call site's traces into an
//!    [`trace::AggregatedSignature`].
//! 4. [`rewrite::default_rewriter`] cleans the signatures up for rendering.

pub mod config;
pub mod descriptor;
pub mod encoding;
pub mod errors;
pub mod rewrite;
pub mod sample;
pub mod shrink;
pub mod store;
pub mod trace;

pub use config::CoreConfig;
pub use descriptor::{SequenceKind, Type};
pub use errors::{TraceError, TraceResult};
pub use rewrite::{default_rewriter, rewrite_signature, ChainedRewriter, TypeRewriter};
pub use sample::{sample, Describable, RuntimeValue};
pub use shrink::{shrink_all, shrink_traces, shrink_types};
pub use store::{sqlite::SqliteStore, CallTraceStore};
pub use trace::{AggregatedSignature, CallTrace};
