//! Per-run extension map with heterogeneous value storage.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// Type-safe context key wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextKey(String);

impl ContextKey {
    /// Creates a new ContextKey.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ContextKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ContextKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::borrow::Borrow<str> for ContextKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Workflow-specific data carried by an event.
///
/// Keys are not validated. Values of any `Send + Sync` type are stored and
/// read back by downcasting, so a lookup with the wrong type yields `None`.
/// The reserved protocol slots (state and error) live on the event itself,
/// not here.
///
/// # Examples
///
/// ```
/// use meguri_core::Context;
///
/// let mut ctx = Context::new();
/// ctx.insert("output", "STATE_START+".to_string());
/// ctx.insert("attempts", 2u32);
///
/// assert_eq!(ctx.get::<String>("output").map(String::as_str), Some("STATE_START+"));
/// assert_eq!(ctx.get::<u32>("attempts"), Some(&2));
/// assert_eq!(ctx.get::<String>("attempts"), None);
/// ```
#[derive(Default)]
pub struct Context {
    data: HashMap<ContextKey, Box<dyn Any + Send + Sync>>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("keys", &self.data.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Context {
    /// Creates a new empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, replacing any previous value under the key.
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<ContextKey>, value: T) {
        self.data.insert(key.into(), Box::new(value));
    }

    /// Returns the value for the key if present and of type `T`.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.data.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    /// Returns a mutable reference to the value for the key if present and of type `T`.
    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.data.get_mut(key).and_then(|v| v.downcast_mut::<T>())
    }

    /// Returns the value for the key, inserting `f()` first if it is absent.
    ///
    /// Returns `None` only when the key holds a value of another type.
    pub fn get_or_insert_with<T, F>(&mut self, key: impl Into<ContextKey>, f: F) -> Option<&mut T>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        self.data
            .entry(key.into())
            .or_insert_with(|| Box::new(f()) as Box<dyn Any + Send + Sync>)
            .downcast_mut::<T>()
    }

    /// Removes and returns the value for the key.
    ///
    /// A value of another type is removed as well and `None` is returned.
    pub fn remove<T: Any>(&mut self, key: &str) -> Option<T> {
        self.data
            .remove(key)
            .and_then(|v| v.downcast::<T>().ok())
            .map(|b| *b)
    }

    /// Returns `true` if the context holds a value under the key.
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Returns an iterator over all keys.
    pub fn keys(&self) -> impl Iterator<Item = &ContextKey> {
        self.data.keys()
    }

    /// Returns an iterator over all entries, values type-erased.
    ///
    /// Lets callers export the whole map and downcast only the values they know.
    pub fn iter<'a>(
        &'a self,
    ) -> impl Iterator<Item = (&'a ContextKey, &'a (dyn Any + Send + Sync + 'static))> + 'a {
        self.data.iter().map(|(k, v)| (k, &**v))
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the context has no entries.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Removes all entries.
    pub fn clear(&mut self) {
        self.data.clear();
    }
}
