//! Argument matchers: positional predicates captured at definition time.
//!
//! Every matcher sees both the live argument and the snapshot taken when the
//! call was intercepted. Equality-style matchers read the snapshot, so they
//! stay correct when the caller mutates a shared argument afterwards.
//! Presence and identity checks read the live argument.

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::core::contract::MethodId;
use crate::core::errors::{MockError, Result};
use crate::core::value::Value;

/// A predicate over one `(current, snapshot)` argument pair.
pub trait ArgumentMatcher: Send + Sync {
    /// Whether the argument satisfies this matcher.
    fn matches(&self, current: &Value, snapshot: &Value) -> bool;

    /// Rendering used in reports and failure messages.
    fn describe(&self) -> String;

    /// Structural identity used to reuse nested mocks across statements.
    /// `None` keys the matcher by instance, so two separately built custom
    /// matchers never share a chain path.
    fn key(&self) -> Option<MatcherKey> {
        None
    }
}

/// Structural key of a built-in matcher. Values compare with `Value`
/// equality, so shared cells, mocks and opaque payloads key by identity.
#[derive(Debug, Clone, PartialEq)]
pub enum MatcherKey {
    /// [`eq`] or a literal.
    Equals(Value),
    /// [`ref_eq`].
    RefEquals(Value),
    /// [`len_eq`].
    LenientEquals(Value),
    /// [`same`].
    Same(Value),
    /// [`any`].
    Any,
    /// [`not_null`].
    NotNull,
    /// [`is_null`].
    Null,
    /// [`regex`], by pattern text.
    Regex(String),
}

/// Shared handle to a matcher.
pub type MatcherRef = Arc<dyn ArgumentMatcher>;

/// Exact equality against the snapshot.
#[derive(Debug, Clone)]
pub struct EqualsMatcher(pub Value);

impl ArgumentMatcher for EqualsMatcher {
    fn matches(&self, _current: &Value, snapshot: &Value) -> bool {
        &self.0 == snapshot
    }

    fn describe(&self) -> String {
        self.0.to_string()
    }

    fn key(&self) -> Option<MatcherKey> {
        Some(MatcherKey::Equals(self.0.clone()))
    }
}

/// Deep structural equality against the snapshot.
#[derive(Debug, Clone)]
pub struct RefEqualsMatcher(pub Value);

impl ArgumentMatcher for RefEqualsMatcher {
    fn matches(&self, _current: &Value, snapshot: &Value) -> bool {
        self.0.deep_eq(snapshot)
    }

    fn describe(&self) -> String {
        format!("ref_eq({})", self.0)
    }

    fn key(&self) -> Option<MatcherKey> {
        Some(MatcherKey::RefEquals(self.0.clone()))
    }
}

/// Lenient structural equality against the snapshot.
#[derive(Debug, Clone)]
pub struct LenientEqualsMatcher(pub Value);

impl ArgumentMatcher for LenientEqualsMatcher {
    fn matches(&self, _current: &Value, snapshot: &Value) -> bool {
        self.0.lenient_eq(snapshot)
    }

    fn describe(&self) -> String {
        format!("len_eq({})", self.0)
    }

    fn key(&self) -> Option<MatcherKey> {
        Some(MatcherKey::LenientEquals(self.0.clone()))
    }
}

/// Reference identity against the live argument.
#[derive(Debug, Clone)]
pub struct SameMatcher(pub Value);

impl ArgumentMatcher for SameMatcher {
    fn matches(&self, current: &Value, _snapshot: &Value) -> bool {
        match (&self.0, current) {
            (Value::Shared(a), Value::Shared(b)) => a.same_cell(b),
            (expected, actual) => expected == actual,
        }
    }

    fn describe(&self) -> String {
        format!("same({})", self.0)
    }

    fn key(&self) -> Option<MatcherKey> {
        Some(MatcherKey::Same(self.0.clone()))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AnyMatcher;

impl ArgumentMatcher for AnyMatcher {
    fn matches(&self, _current: &Value, _snapshot: &Value) -> bool {
        true
    }

    fn describe(&self) -> String {
        "any".to_string()
    }

    fn key(&self) -> Option<MatcherKey> {
        Some(MatcherKey::Any)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NotNullMatcher;

impl ArgumentMatcher for NotNullMatcher {
    fn matches(&self, current: &Value, _snapshot: &Value) -> bool {
        !current.is_null()
    }

    fn describe(&self) -> String {
        "not_null".to_string()
    }

    fn key(&self) -> Option<MatcherKey> {
        Some(MatcherKey::NotNull)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NullMatcher;

impl ArgumentMatcher for NullMatcher {
    fn matches(&self, current: &Value, _snapshot: &Value) -> bool {
        current.is_null()
    }

    fn describe(&self) -> String {
        "null".to_string()
    }

    fn key(&self) -> Option<MatcherKey> {
        Some(MatcherKey::Null)
    }
}

/// String argument matching a regular expression.
#[derive(Debug, Clone)]
pub struct RegexMatcher(pub Regex);

impl ArgumentMatcher for RegexMatcher {
    fn matches(&self, _current: &Value, snapshot: &Value) -> bool {
        snapshot.as_str().is_some_and(|s| self.0.is_match(s))
    }

    fn describe(&self) -> String {
        format!("regex({:?})", self.0.as_str())
    }

    fn key(&self) -> Option<MatcherKey> {
        Some(MatcherKey::Regex(self.0.as_str().to_string()))
    }
}

type Predicate = dyn Fn(&Value, &Value) -> bool + Send + Sync;

/// Custom predicate with a human-readable description.
pub struct PredicateMatcher {
    description: String,
    predicate: Box<Predicate>,
}

impl ArgumentMatcher for PredicateMatcher {
    fn matches(&self, current: &Value, snapshot: &Value) -> bool {
        (self.predicate)(current, snapshot)
    }

    fn describe(&self) -> String {
        self.description.clone()
    }
}

// ──────────────────── definition-time arguments ────────────────────

/// An argument position in a defining or asserting statement: either a
/// literal (implicit exact-equality matcher) or an explicit matcher.
pub enum Arg {
    Literal(Value),
    Matcher(MatcherRef),
    #[doc(hidden)]
    Invalid(String),
}

impl Arg {
    /// Wrap a custom matcher.
    #[must_use]
    pub fn matcher(matcher: impl ArgumentMatcher + 'static) -> Self {
        Self::Matcher(Arc::new(matcher))
    }

    fn into_matcher(self) -> Result<MatcherRef> {
        match self {
            Self::Literal(value) => Ok(Arc::new(EqualsMatcher(value))),
            Self::Matcher(matcher) => Ok(matcher),
            Self::Invalid(details) => Err(MockError::InvalidMatcher { details }),
        }
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "Literal({value})"),
            Self::Matcher(matcher) => write!(f, "Matcher({})", matcher.describe()),
            Self::Invalid(details) => write!(f, "Invalid({details})"),
        }
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

impl From<MatcherRef> for Arg {
    fn from(matcher: MatcherRef) -> Self {
        Self::Matcher(matcher)
    }
}

macro_rules! literal_arg_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Arg {
                fn from(value: $ty) -> Self {
                    Self::Literal(Value::from(value))
                }
            }
        )*
    };
}

literal_arg_from!(
    bool,
    i64,
    i32,
    u32,
    f64,
    &str,
    String,
    Vec<Value>,
    crate::core::value::SharedRef,
    crate::mock::object::Mock,
    &crate::mock::object::Mock,
);

/// Exact equality (the implicit matcher for literals).
#[must_use]
pub fn eq(value: impl Into<Value>) -> Arg {
    Arg::matcher(EqualsMatcher(value.into()))
}

/// Deep structural equality; shared cells compared by contents.
#[must_use]
pub fn ref_eq(value: impl Into<Value>) -> Arg {
    Arg::matcher(RefEqualsMatcher(value.into()))
}

/// Lenient structural equality: list order and expected defaults ignored.
#[must_use]
pub fn len_eq(value: impl Into<Value>) -> Arg {
    Arg::matcher(LenientEqualsMatcher(value.into()))
}

/// Same reference as `value` (live argument).
#[must_use]
pub fn same(value: impl Into<Value>) -> Arg {
    Arg::matcher(SameMatcher(value.into()))
}

/// Matches every argument.
#[must_use]
pub fn any() -> Arg {
    Arg::matcher(AnyMatcher)
}

/// Matches any non-null argument.
#[must_use]
pub fn not_null() -> Arg {
    Arg::matcher(NotNullMatcher)
}

/// Matches only `Value::Null`.
#[must_use]
pub fn is_null() -> Arg {
    Arg::matcher(NullMatcher)
}

/// String argument matching `pattern`. An invalid pattern fails the
/// statement it is used in.
#[must_use]
pub fn regex(pattern: &str) -> Arg {
    match Regex::new(pattern) {
        Ok(re) => Arg::matcher(RegexMatcher(re)),
        Err(error) => Arg::Invalid(MockError::from(error).to_string()),
    }
}

/// Custom predicate over `(current, snapshot)`.
#[must_use]
pub fn matching<F>(description: impl Into<String>, predicate: F) -> Arg
where
    F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
{
    Arg::matcher(PredicateMatcher {
        description: description.into(),
        predicate: Box::new(predicate),
    })
}

/// Build a `Vec<Arg>` from literals and matchers.
#[macro_export]
macro_rules! args {
    () => { ::std::vec::Vec::<$crate::invocation::matcher::Arg>::new() };
    ($($arg:expr),+ $(,)?) => {
        ::std::vec![$($crate::invocation::matcher::Arg::from($arg)),+]
    };
}

/// Build a `Vec<Value>` for a production call.
#[macro_export]
macro_rules! values {
    () => { ::std::vec::Vec::<$crate::core::value::Value>::new() };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::core::value::Value::from($value)),+]
    };
}

// ──────────────────── invocation shape ────────────────────

/// A method identity plus one matcher per parameter.
#[derive(Clone)]
pub struct InvocationShape {
    method: MethodId,
    matchers: Vec<MatcherRef>,
}

impl InvocationShape {
    /// Turn definition-time arguments into a shape, enforcing matcher arity.
    pub fn new(method: MethodId, args: Vec<Arg>) -> Result<Self> {
        if args.len() != method.arity() {
            return Err(MockError::MatcherArity {
                method: method.to_string(),
                expected: method.arity(),
                actual: args.len(),
            });
        }
        let matchers = args
            .into_iter()
            .map(Arg::into_matcher)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { method, matchers })
    }

    /// Exact-equality shape for concrete values (used for auto-mock keys).
    #[must_use]
    pub fn exact(method: MethodId, values: &[Value]) -> Self {
        let matchers = values
            .iter()
            .map(|v| Arc::new(EqualsMatcher(v.clone())) as MatcherRef)
            .collect();
        Self { method, matchers }
    }

    #[must_use]
    pub const fn method(&self) -> &MethodId {
        &self.method
    }

    /// Positional, conjunctive match of every argument.
    #[must_use]
    pub fn matches(&self, method: &MethodId, current: &[Value], snapshot: &[Value]) -> bool {
        &self.method == method
            && current.len() == self.matchers.len()
            && snapshot.len() == self.matchers.len()
            && self
                .matchers
                .iter()
                .zip(current.iter().zip(snapshot))
                .all(|(m, (c, s))| m.matches(c, s))
    }

    /// Whether `other` selects the same calls: same method, and matchers
    /// equal by [`ArgumentMatcher::key`] or, for custom matchers, the same
    /// instance.
    #[must_use]
    pub fn same_shape(&self, other: &Self) -> bool {
        self.method == other.method
            && self.matchers.len() == other.matchers.len()
            && self
                .matchers
                .iter()
                .zip(&other.matchers)
                .all(|(a, b)| match (a.key(), b.key()) {
                    (Some(x), Some(y)) => x == y,
                    (None, None) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
                    _ => false,
                })
    }

    /// `(m1, m2, ..)` rendering of the matchers.
    #[must_use]
    pub fn matcher_key(&self) -> String {
        let parts: Vec<String> = self.matchers.iter().map(|m| m.describe()).collect();
        format!("({})", parts.join(", "))
    }
}

impl fmt::Display for InvocationShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}::{}{}",
            self.method.owner(),
            self.method.name(),
            self.matcher_key()
        )
    }
}

impl fmt::Debug for InvocationShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
