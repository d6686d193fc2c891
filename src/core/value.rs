//! Dynamic values crossing a mock's proxy surface.
//!
//! Arguments and results are carried as [`Value`]s. Plain data (scalars,
//! strings, lists, maps) has value semantics. [`SharedRef`] models a mutable
//! object passed by reference: the callee and the caller see the same cell,
//! so the cell can change after the call returns. [`Value::Opaque`] carries
//! anything else; it can be compared by identity but never copied.

#![allow(missing_docs)]

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, MutexGuard};

use crate::mock::object::Mock;

static NEXT_SHARED_ID: AtomicU64 = AtomicU64::new(1);

/// A dynamically typed argument or return value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Shared(SharedRef),
    Mock(Mock),
    Opaque(OpaqueRef),
}

/// Identity-tagged mutable cell passed by reference.
#[derive(Clone)]
pub struct SharedRef {
    id: u64,
    cell: Arc<Mutex<Value>>,
}

/// A payload that can only be shared, never copied.
#[derive(Clone)]
pub struct OpaqueRef {
    type_name: &'static str,
    payload: Arc<dyn Any + Send + Sync>,
}

impl SharedRef {
    /// Allocate a new cell with a fresh identity.
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self {
            id: NEXT_SHARED_ID.fetch_add(1, Ordering::Relaxed),
            cell: Arc::new(Mutex::new(value)),
        }
    }

    /// A detached cell carrying `id`, used for argument snapshots.
    pub(crate) fn with_identity(id: u64, value: Value) -> Self {
        Self {
            id,
            cell: Arc::new(Mutex::new(value)),
        }
    }

    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Clone of the current contents.
    #[must_use]
    pub fn get(&self) -> Value {
        self.cell.lock().clone()
    }

    /// Replace the contents, returning the previous value.
    pub fn set(&self, value: Value) -> Value {
        std::mem::replace(&mut *self.cell.lock(), value)
    }

    /// Lock the cell for in-place mutation.
    pub fn lock(&self) -> MutexGuard<'_, Value> {
        self.cell.lock()
    }

    pub(crate) fn try_lock(&self) -> Option<MutexGuard<'_, Value>> {
        self.cell.try_lock()
    }

    /// Whether both handles point at the same live cell.
    #[must_use]
    pub fn same_cell(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl OpaqueRef {
    #[must_use]
    pub fn new<T: Any + Send + Sync>(payload: T) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            payload: Arc::new(payload),
        }
    }

    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.payload, &other.payload)
    }
}

impl Value {
    /// Wrap `value` in a new by-reference cell.
    #[must_use]
    pub fn shared(value: impl Into<Self>) -> Self {
        Self::Shared(SharedRef::new(value.into()))
    }

    /// Wrap an arbitrary payload that cannot be snapshotted.
    #[must_use]
    pub fn opaque<T: Any + Send + Sync>(payload: T) -> Self {
        Self::Opaque(OpaqueRef::new(payload))
    }

    /// Build a map value from string keys.
    #[must_use]
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Self>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_mock(&self) -> Option<&Mock> {
        match self {
            Self::Mock(m) => Some(m),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_shared(&self) -> Option<&SharedRef> {
        match self {
            Self::Shared(s) => Some(s),
            _ => None,
        }
    }

    /// Short name of the variant, used in reports and errors.
    #[must_use]
    pub const fn variant_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Shared(_) => "shared",
            Self::Mock(_) => "mock",
            Self::Opaque(_) => "opaque",
        }
    }

    /// Values a lenient comparison treats as "not specified".
    #[must_use]
    pub fn is_default_like(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Bool(b) => !*b,
            Self::Int(n) => *n == 0,
            Self::Float(x) => *x == 0.0,
            _ => false,
        }
    }

    /// Structural equality: shared cells are compared by contents, not identity.
    #[must_use]
    pub fn deep_eq(&self, other: &Self) -> bool {
        deep_eq_at(self, other, 0)
    }

    /// Structural equality ignoring list order and default-like values on
    /// the `self` (expected) side.
    #[must_use]
    pub fn lenient_eq(&self, actual: &Self) -> bool {
        lenient_eq_at(self, actual, 0)
    }
}

// Guard against cyclic shared cells in the recursive comparisons.
const MAX_COMPARE_DEPTH: usize = 64;

fn read_shared(cell: &SharedRef) -> Option<Value> {
    cell.try_lock().map(|guard| guard.clone())
}

fn deep_eq_at(a: &Value, b: &Value, depth: usize) -> bool {
    if depth > MAX_COMPARE_DEPTH {
        return false;
    }
    match (a, b) {
        (Value::Shared(x), Value::Shared(y)) => {
            if x.same_cell(y) {
                return true;
            }
            match (read_shared(x), read_shared(y)) {
                (Some(x), Some(y)) => deep_eq_at(&x, &y, depth + 1),
                _ => false,
            }
        }
        (Value::Shared(x), other) | (other, Value::Shared(x)) => {
            read_shared(x).is_some_and(|inner| deep_eq_at(&inner, other, depth + 1))
        }
        (Value::List(xs), Value::List(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .zip(ys)
                    .all(|(x, y)| deep_eq_at(x, y, depth + 1))
        }
        (Value::Map(xs), Value::Map(ys)) => {
            xs.len() == ys.len()
                && xs.iter().all(|(k, x)| {
                    ys.get(k)
                        .is_some_and(|y| deep_eq_at(x, y, depth + 1))
                })
        }
        _ => a == b,
    }
}

fn lenient_eq_at(expected: &Value, actual: &Value, depth: usize) -> bool {
    if depth > MAX_COMPARE_DEPTH {
        return false;
    }
    if expected.is_default_like() {
        return true;
    }
    match (expected, actual) {
        (Value::Shared(x), _) => {
            read_shared(x).is_some_and(|inner| lenient_eq_at(&inner, actual, depth + 1))
        }
        (_, Value::Shared(y)) => {
            read_shared(y).is_some_and(|inner| lenient_eq_at(expected, &inner, depth + 1))
        }
        (Value::List(xs), Value::List(ys)) => {
            if xs.len() != ys.len() {
                return false;
            }
            // Order-insensitive: greedily pair each expected element with an
            // unused actual element.
            let mut used = vec![false; ys.len()];
            xs.iter().all(|x| {
                let found = ys
                    .iter()
                    .enumerate()
                    .find(|(i, y)| !used[*i] && lenient_eq_at(x, y, depth + 1));
                found.is_some_and(|(i, _)| {
                    used[i] = true;
                    true
                })
            })
        }
        (Value::Map(xs), Value::Map(ys)) => xs.iter().all(|(k, x)| {
            ys.get(k).map_or_else(
                || x.is_default_like(),
                |y| lenient_eq_at(x, y, depth + 1),
            )
        }),
        _ => deep_eq_at(expected, actual, depth),
    }
}

/// Exact equality: plain data structurally, shared cells by identity, mocks
/// and opaque payloads by reference.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Shared(a), Self::Shared(b)) => a.id == b.id,
            (Self::Mock(a), Self::Mock(b)) => a.same(b),
            (Self::Opaque(a), Self::Opaque(b)) => a.same(b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        render(self, f, 0)
    }
}

fn render(value: &Value, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    match value {
        Value::Null => write!(f, "null"),
        Value::Bool(b) => write!(f, "{b}"),
        Value::Int(n) => write!(f, "{n}"),
        Value::Float(x) => write!(f, "{x:?}"),
        Value::Str(s) => write!(f, "{s:?}"),
        Value::List(items) => {
            write!(f, "[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                render(item, f, depth + 1)?;
            }
            write!(f, "]")
        }
        Value::Map(entries) => {
            write!(f, "{{")?;
            for (i, (k, v)) in entries.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{k}: ")?;
                render(v, f, depth + 1)?;
            }
            write!(f, "}}")
        }
        Value::Shared(cell) => {
            write!(f, "&{}", cell.id)?;
            if depth > MAX_COMPARE_DEPTH {
                return write!(f, "(..)");
            }
            match read_shared(cell) {
                Some(inner) => {
                    write!(f, "(")?;
                    render(&inner, f, depth + 1)?;
                    write!(f, ")")
                }
                None => write!(f, "(<locked>)"),
            }
        }
        Value::Mock(mock) => write!(f, "mock<{}>", mock.name()),
        Value::Opaque(opaque) => write!(f, "<{}>", opaque.type_name),
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Debug for SharedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedRef(&{})", self.id)
    }
}

impl fmt::Debug for OpaqueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpaqueRef<{}>", self.type_name)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Self::Null
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<Self>> for Value {
    fn from(value: Vec<Self>) -> Self {
        Self::List(value)
    }
}

impl From<SharedRef> for Value {
    fn from(value: SharedRef) -> Self {
        Self::Shared(value)
    }
}

impl From<Mock> for Value {
    fn from(value: Mock) -> Self {
        Self::Mock(value)
    }
}

impl From<&Mock> for Value {
    fn from(value: &Mock) -> Self {
        Self::Mock(value.clone())
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

// ──────────────────── kinds ────────────────────

/// Declared shape of a parameter or return value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Kind {
    Unit,
    Bool,
    Int,
    Float,
    Str,
    List,
    Map,
    /// A non-mockable object type, named for diagnostics.
    Object(String),
    /// Another registered contract; unconfigured calls auto-mock it.
    Mock(String),
    Any,
}

impl Kind {
    /// Shorthand for `Kind::Mock(contract.into())`.
    #[must_use]
    pub fn mock(contract: impl Into<String>) -> Self {
        Self::Mock(contract.into())
    }

    #[must_use]
    pub fn object(type_name: impl Into<String>) -> Self {
        Self::Object(type_name.into())
    }

    #[must_use]
    pub const fn is_mockable(&self) -> bool {
        matches!(self, Self::Mock(_))
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => write!(f, "()"),
            Self::Bool => write!(f, "bool"),
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Str => write!(f, "str"),
            Self::List => write!(f, "list"),
            Self::Map => write!(f, "map"),
            Self::Object(name) | Self::Mock(name) => write!(f, "{name}"),
            Self::Any => write!(f, "any"),
        }
    }
}
