//! Scope - binding context, reactive override context and parent link.
//!
//! A binding resolves a name by looking at the override context first, then
//! walking up the parent scopes. Override-context entries are signals, so a
//! binding that read `$index` re-runs when the repeater updates it.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use spark_signals::{Signal, signal};

// =============================================================================
// Value
// =============================================================================

/// A bindable value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Str(Rc<str>),
}

impl Value {
    /// JS-style truthiness, used by `if` and `case` matching.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Str(s) => !s.is_empty(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Int(value as i64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value.into())
    }
}

// =============================================================================
// Override Context
// =============================================================================

/// Named reactive values layered over a binding context.
#[derive(Default)]
pub struct OverrideContext {
    values: RefCell<HashMap<String, Signal<Value>>>,
}

impl OverrideContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name`, creating its signal on first write.
    pub fn set(&self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        let existing = self.values.borrow().get(name).cloned();
        match existing {
            Some(sig) => {
                if sig.get() != value {
                    sig.set(value);
                }
            }
            None => {
                self.values
                    .borrow_mut()
                    .insert(name.to_string(), signal(value));
            }
        }
    }

    /// Declare `name` with `Null` unless it already exists.
    pub fn declare(&self, name: &str) {
        if !self.contains(name) {
            self.set(name, Value::Null);
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.borrow().get(name).map(|sig| sig.get())
    }

    pub fn signal(&self, name: &str) -> Option<Signal<Value>> {
        self.values.borrow().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.borrow().contains_key(name)
    }
}

// =============================================================================
// Scope
// =============================================================================

pub struct Scope {
    binding_context: RefCell<Rc<dyn Any>>,
    override_context: OverrideContext,
    parent: RefCell<Option<Rc<Scope>>>,
}

impl Scope {
    pub fn new(binding_context: Rc<dyn Any>) -> Rc<Self> {
        Rc::new(Self {
            binding_context: RefCell::new(binding_context),
            override_context: OverrideContext::new(),
            parent: RefCell::new(None),
        })
    }

    /// A scope with no binding context of its own.
    pub fn empty() -> Rc<Self> {
        Self::new(Rc::new(()))
    }

    pub fn from_parent(parent: &Rc<Scope>, binding_context: Rc<dyn Any>) -> Rc<Self> {
        let scope = Self::new(binding_context);
        scope.set_parent(Some(parent.clone()));
        scope
    }

    pub fn binding_context(&self) -> Rc<dyn Any> {
        self.binding_context.borrow().clone()
    }

    /// The binding context, if it is a `T`.
    pub fn binding_context_as<T: 'static>(&self) -> Option<Rc<T>> {
        self.binding_context().downcast::<T>().ok()
    }

    pub fn set_binding_context(&self, binding_context: Rc<dyn Any>) {
        *self.binding_context.borrow_mut() = binding_context;
    }

    pub fn override_context(&self) -> &OverrideContext {
        &self.override_context
    }

    pub fn parent(&self) -> Option<Rc<Scope>> {
        self.parent.borrow().clone()
    }

    pub fn set_parent(&self, parent: Option<Rc<Scope>>) {
        *self.parent.borrow_mut() = parent;
    }

    /// Find the signal for `name` here or in an ancestor scope.
    pub fn resolve(&self, name: &str) -> Option<Signal<Value>> {
        if let Some(sig) = self.override_context.signal(name) {
            return Some(sig);
        }
        let parent = self.parent();
        parent.and_then(|parent| parent.resolve(name))
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.resolve(name).map(|sig| sig.get())
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("has_parent", &self.parent.borrow().is_some())
            .finish_non_exhaustive()
    }
}
