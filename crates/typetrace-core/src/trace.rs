//! Call-sample and aggregated-signature models.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::descriptor::Type;

/// The types observed during a single invocation of a call site.
///
/// Created once per captured invocation by the instrumentation boundary,
/// never mutated afterwards. `return_type` is `None` when the call unwound
/// with an exception; `yield_type` is `None` when the call never yielded.
/// Both present or both absent is tolerated, not rejected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallTrace {
    pub module: String,
    pub qualname: String,
    /// Parameter name to observed type, in declaration order.
    pub arg_types: IndexMap<String, Type>,
    pub return_type: Option<Type>,
    pub yield_type: Option<Type>,
}

impl CallTrace {
    pub fn new(
        module: impl Into<String>,
        qualname: impl Into<String>,
        arg_types: IndexMap<String, Type>,
        return_type: Option<Type>,
        yield_type: Option<Type>,
    ) -> Self {
        Self {
            module: module.into(),
            qualname: qualname.into(),
            arg_types,
            return_type,
            yield_type,
        }
    }

    /// Fully qualified call-site name.
    pub fn fqname(&self) -> String {
        format!("{}.{}", self.module, self.qualname)
    }

    /// Fold one more observed yield type into this trace's yield slot.
    pub fn add_yield_type(&mut self, typ: Type) {
        self.yield_type = match self.yield_type.take() {
            None => Some(typ),
            Some(existing) => Some(Type::union([existing, typ])),
        };
    }
}

/// One call site's minimal signature, derived from all of its samples.
///
/// Produced by the shrinker, optionally post-processed by a rewriter chain,
/// and handed to the (external) rendering/patching step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedSignature {
    pub module: String,
    pub qualname: String,
    pub arg_types: IndexMap<String, Type>,
    pub return_type: Option<Type>,
    pub yield_type: Option<Type>,
}

impl AggregatedSignature {
    /// Fully qualified call-site name.
    pub fn fqname(&self) -> String {
        format!("{}.{}", self.module, self.qualname)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fqname() {
        let trace = CallTrace::new("myapp.views", "Inbox.render", IndexMap::new(), None, None);
        assert_eq!(trace.fqname(), "myapp.views.Inbox.render");
    }

    #[test]
    fn test_add_yield_type_unions() {
        let mut trace = CallTrace::new("m", "f", IndexMap::new(), None, None);
        trace.add_yield_type(Type::scalar("builtins.int"));
        assert_eq!(trace.yield_type, Some(Type::scalar("builtins.int")));
        trace.add_yield_type(Type::scalar("builtins.str"));
        assert_eq!(
            trace.yield_type,
            Some(Type::union([
                Type::scalar("builtins.int"),
                Type::scalar("builtins.str"),
            ]))
        );
        // Re-observing a known type is a no-op.
        trace.add_yield_type(Type::scalar("builtins.int"));
        assert_eq!(
            trace.yield_type,
            Some(Type::union([
                Type::scalar("builtins.int"),
                Type::scalar("builtins.str"),
            ]))
        );
    }

    #[test]
    fn test_both_slots_tolerated() {
        let trace = CallTrace::new(
            "m",
            "f",
            IndexMap::new(),
            Some(Type::none()),
            Some(Type::scalar("builtins.int")),
        );
        assert!(trace.return_type.is_some());
        assert!(trace.yield_type.is_some());
    }
}
