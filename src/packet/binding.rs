//! Upper-layer dispatch rules.
//!
//! A binding states that header kind *upper* may follow header kind *lower*
//! when certain fields of the lower header hold certain values. Predicates
//! are data ([`Pred`]), so bindings stay introspectable: the build direction
//! reuses the same checks as setters to pre-fill the lower header's
//! discriminator fields.

use crate::error::{Error, PacketError};
use crate::field::Value;
use crate::header::Header;

/// Arbitrary predicate over the lower header and the bytes following it
/// (used e.g. to split MLD from MLQ by body length).
pub type PredFn = fn(&Header, &[u8]) -> bool;

/// A field predicate.
#[derive(Debug, Clone)]
pub enum Pred {
    /// Field equals the constant.
    Equals(Value),
    /// Field equals one of the constants. The first one doubles as the
    /// build-direction default.
    In(Vec<Value>),
    /// Evaluated against the lower header and its trailing bytes.
    /// Contributes to match specificity but not to build-direction setters.
    Func(PredFn),
}

/// One `(field, predicate)` pair of a binding.
#[derive(Debug, Clone)]
pub struct FieldCheck {
    pub field: &'static str,
    pub pred: Pred,
}

/// How a binding combines its checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchOp {
    /// Every check must hold (default).
    #[default]
    All,
    /// Any single check suffices.
    Any,
}

/// A dispatch rule: `upper` may follow `lower` when the checks hold.
#[derive(Debug, Clone)]
pub struct Binding {
    lower: &'static str,
    upper: &'static str,
    op: MatchOp,
    checks: Vec<FieldCheck>,
}

impl Binding {
    /// New conjunctive binding (`MatchOp::All`).
    pub fn new(lower: &'static str, upper: &'static str) -> Self {
        Self {
            lower,
            upper,
            op: MatchOp::All,
            checks: Vec::new(),
        }
    }

    /// New disjunctive binding (`MatchOp::Any`).
    pub fn any(lower: &'static str, upper: &'static str) -> Self {
        Self {
            op: MatchOp::Any,
            ..Self::new(lower, upper)
        }
    }

    /// Require `field == value`.
    pub fn eq(mut self, field: &'static str, value: impl Into<Value>) -> Self {
        self.checks.push(FieldCheck {
            field,
            pred: Pred::Equals(value.into()),
        });
        self
    }

    /// Require `field` to equal one of `values`.
    pub fn one_of<V: Into<Value>>(
        mut self,
        field: &'static str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.checks.push(FieldCheck {
            field,
            pred: Pred::In(values.into_iter().map(Into::into).collect()),
        });
        self
    }

    /// Require an arbitrary predicate. `field` is a label for
    /// introspection (e.g. `"body"` for length checks).
    pub fn when(mut self, field: &'static str, pred: PredFn) -> Self {
        self.checks.push(FieldCheck {
            field,
            pred: Pred::Func(pred),
        });
        self
    }

    pub fn lower(&self) -> &'static str {
        self.lower
    }

    pub fn upper(&self) -> &'static str {
        self.upper
    }

    pub fn op(&self) -> MatchOp {
        self.op
    }

    pub fn checks(&self) -> &[FieldCheck] {
        &self.checks
    }

    /// Number of distinct field checks; higher wins ties during resolution.
    pub fn specificity(&self) -> usize {
        self.checks.len()
    }

    /// Evaluate this binding against a just-read lower header and the bytes
    /// following it.
    pub fn matches(&self, lower: &Header, rest: &[u8]) -> bool {
        let mut iter = self.checks.iter().map(|c| c.holds(lower, rest));
        match self.op {
            MatchOp::All => iter.all(|ok| ok),
            MatchOp::Any => self.checks.is_empty() || iter.any(|ok| ok),
        }
    }

    /// Build-direction field assignments: the constants of `Equals` checks,
    /// and the first constant of `In` checks.
    pub(crate) fn setters(&self) -> Vec<(&'static str, Value)> {
        self.checks
            .iter()
            .filter_map(|c| match &c.pred {
                Pred::Equals(v) => Some((c.field, v.clone())),
                Pred::In(vs) => vs.first().map(|v| (c.field, v.clone())),
                Pred::Func(_) => None,
            })
            .collect()
    }
}

impl FieldCheck {
    fn holds(&self, lower: &Header, rest: &[u8]) -> bool {
        match &self.pred {
            Pred::Equals(expected) => lower
                .get(self.field)
                .is_some_and(|actual| value_matches(actual, expected)),
            Pred::In(values) => lower
                .get(self.field)
                .is_some_and(|actual| values.iter().any(|v| value_matches(actual, v))),
            Pred::Func(f) => f(lower, rest),
        }
    }
}

// Integer comparison is width-insensitive: a binding declared with `17u8`
// matches a field stored as U16(17).
fn value_matches(actual: &Value, expected: &Value) -> bool {
    match (actual.as_u64(), expected.as_u64()) {
        (Some(a), Some(b)) => a == b,
        _ => actual == expected,
    }
}

/// Ordered table of bindings. Registration order is the tie-break of last
/// resort during resolution.
#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    bindings: Vec<Binding>,
}

impl BindingTable {
    pub fn register(&mut self, binding: Binding) {
        self.bindings.push(binding);
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.iter()
    }

    /// Pick the upper kind that follows `lower`, or `None` when nothing
    /// matches.
    ///
    /// The most specific matching binding wins; among equally specific
    /// matches naming the same upper kind, registration order decides.
    /// Equally specific matches naming *different* upper kinds are
    /// `AmbiguousBinding`.
    pub fn resolve(&self, lower: &Header, rest: &[u8]) -> Result<Option<&'static str>, Error> {
        let mut best: Vec<&Binding> = Vec::new();
        for binding in &self.bindings {
            if binding.lower != lower.name() || !binding.matches(lower, rest) {
                continue;
            }
            let current = best.first().map(|b| b.specificity());
            match current {
                Some(s) if binding.specificity() < s => {}
                Some(s) if binding.specificity() > s => {
                    best.clear();
                    best.push(binding);
                }
                _ => best.push(binding),
            }
        }
        let Some(first) = best.first() else {
            return Ok(None);
        };
        if let Some(other) = best.iter().find(|b| b.upper != first.upper) {
            return Err(PacketError::AmbiguousBinding {
                lower: lower.name().to_string(),
                first: first.upper.to_string(),
                second: other.upper.to_string(),
            }
            .into());
        }
        Ok(Some(first.upper))
    }

    /// The binding used by `Packet::add` to pre-fill `lower_kind` when
    /// `upper_kind` is pushed (first registered wins).
    pub fn defaults_for(&self, lower_kind: &str, upper_kind: &str) -> Option<&Binding> {
        self.bindings
            .iter()
            .find(|b| b.lower == lower_kind && b.upper == upper_kind)
    }
}
