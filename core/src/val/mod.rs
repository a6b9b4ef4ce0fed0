use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::vm::Instructions;

mod builtins;
mod ops;

pub use builtins::{Builtin, BuiltinFn, BUILTINS};


/// A function lowered to bytecode, stored in the constant pool.
#[derive(Debug, Clone)]
pub struct CompiledFunction {
    pub instructions: Instructions,
    pub num_locals: usize,
    pub num_parameters: usize,
}

/// A compiled function paired with the values it captured at construction.
/// Captures are by-value snapshots, so closures never form ownership
/// cycles with their defining environment.
#[derive(Debug, Clone)]
pub struct Closure {
    pub func: Arc<CompiledFunction>,
    pub free: Vec<Val>,
}

/// Key type for hash values. Only integers, booleans and strings are
/// hashable; strings are reduced to a fixed 64-bit digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashKey {
    Int(i64),
    Bool(bool),
    Str(u64),
}

/// A hash entry keeps the original key value alongside the payload, since
/// the key cannot be recovered from its digest.
#[derive(Debug, Clone, PartialEq)]
pub struct HashPair {
    pub key: Val,
    pub value: Val,
}

/// The runtime value model: one tagged union for everything a program can
/// produce. Collections are `Arc`-wrapped so cloning a value is cheap and
/// the language surface never observes shared mutation.
#[derive(Debug, Clone, Default)]
pub enum Val {
    Int(i64),
    Bool(bool),
    #[default]
    Null,
    Str(Arc<str>),
    Array(Arc<[Val]>),
    Hash(Arc<FxHashMap<HashKey, HashPair>>),
    Func(Arc<CompiledFunction>),
    Closure(Arc<Closure>),
    Builtin(&'static Builtin),
    /// In-band runtime error produced by builtins. An ordinary value on
    /// the stack; it does not abort execution.
    Error(Arc<str>),
}

impl Val {
    pub fn type_name(&self) -> &'static str {
        match self {
            Val::Int(_) => "INTEGER",
            Val::Bool(_) => "BOOLEAN",
            Val::Null => "NULL",
            Val::Str(_) => "STRING",
            Val::Array(_) => "ARRAY",
            Val::Hash(_) => "HASH",
            Val::Func(_) => "COMPILED_FUNCTION",
            Val::Closure(_) => "CLOSURE",
            Val::Builtin(_) => "BUILTIN",
            Val::Error(_) => "ERROR",
        }
    }

    /// Only the canonical `false` and `null` are falsy.
    #[inline]
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Val::Bool(false) | Val::Null)
    }

    /// Derives the lookup key for this value, or `None` when the kind is
    /// not usable as a hash key.
    pub fn hash_key(&self) -> Option<HashKey> {
        match self {
            Val::Int(value) => Some(HashKey::Int(*value)),
            Val::Bool(value) => Some(HashKey::Bool(*value)),
            Val::Str(value) => {
                // DefaultHasher::new() uses fixed keys, so the digest is
                // deterministic across runs.
                let mut hasher = DefaultHasher::new();
                value.as_bytes().hash(&mut hasher);
                Some(HashKey::Str(hasher.finish()))
            }
            _ => None,
        }
    }

    pub fn error<S: Into<String>>(message: S) -> Val {
        Val::Error(Arc::from(message.into()))
    }
}

impl PartialEq for Val {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Val::Int(a), Val::Int(b)) => a == b,
            (Val::Bool(a), Val::Bool(b)) => a == b,
            (Val::Null, Val::Null) => true,
            (Val::Str(a), Val::Str(b)) => a == b,
            (Val::Array(a), Val::Array(b)) => a == b,
            (Val::Hash(a), Val::Hash(b)) => a == b,
            // Functions and closures are equal only as the same object.
            (Val::Func(a), Val::Func(b)) => Arc::ptr_eq(a, b),
            (Val::Closure(a), Val::Closure(b)) => Arc::ptr_eq(a, b),
            (Val::Builtin(a), Val::Builtin(b)) => std::ptr::eq(*a, *b),
            (Val::Error(a), Val::Error(b)) => a == b,
            _ => false,
        }
    }
}

// The `Display` form is the user-facing inspect form: strings print raw,
// collections print their elements' inspect forms.
impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Int(value) => write!(f, "{value}"),
            Val::Bool(value) => write!(f, "{value}"),
            Val::Null => write!(f, "null"),
            Val::Str(value) => write!(f, "{value}"),
            Val::Array(elements) => {
                let parts: Vec<String> = elements.iter().map(|e| e.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Val::Hash(pairs) => {
                let parts: Vec<String> = pairs
                    .values()
                    .map(|pair| format!("{}: {}", pair.key, pair.value))
                    .collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            Val::Func(func) => write!(f, "CompiledFunction[{:p}]", Arc::as_ptr(func)),
            Val::Closure(closure) => write!(f, "Closure[{:p}]", Arc::as_ptr(closure)),
            Val::Builtin(_) => write!(f, "builtin function"),
            Val::Error(message) => write!(f, "ERROR: {message}"),
        }
    }
}

impl From<i64> for Val {
    fn from(value: i64) -> Self {
        Val::Int(value)
    }
}

impl From<bool> for Val {
    fn from(value: bool) -> Self {
        Val::Bool(value)
    }
}

impl From<&str> for Val {
    fn from(value: &str) -> Self {
        Val::Str(Arc::from(value))
    }
}

impl From<String> for Val {
    fn from(value: String) -> Self {
        Val::Str(Arc::from(value))
    }
}

impl From<Vec<Val>> for Val {
    fn from(elements: Vec<Val>) -> Self {
        Val::Array(Arc::from(elements))
    }
}
