//! Controller identity registry.
//!
//! Maps a live view-model instance to its controller so hydrating the same
//! instance twice hands back the existing controller. Entries are weak and
//! are removed when the controller is disposed.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use super::Controller;

/// Registry key: the address of the view-model allocation.
pub(crate) fn key_of<T: ?Sized>(view_model: &Rc<T>) -> usize {
    Rc::as_ptr(view_model) as *const () as usize
}

#[derive(Default)]
pub struct ControllerRegistry {
    entries: RefCell<HashMap<usize, Weak<Controller>>>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: ?Sized>(&self, view_model: &Rc<T>) -> Option<Rc<Controller>> {
        self.entries
            .borrow()
            .get(&key_of(view_model))
            .and_then(Weak::upgrade)
    }

    pub(crate) fn insert(&self, key: usize, controller: &Rc<Controller>) {
        self.entries
            .borrow_mut()
            .insert(key, Rc::downgrade(controller));
    }

    pub(crate) fn remove(&self, key: usize) {
        self.entries.borrow_mut().remove(&key);
    }

    /// The first live controller matching `predicate`, in no particular
    /// order.
    pub fn find(&self, predicate: impl Fn(&Rc<Controller>) -> bool) -> Option<Rc<Controller>> {
        self.entries
            .borrow()
            .values()
            .filter_map(Weak::upgrade)
            .find(|controller| predicate(controller))
    }

    /// Live entries.
    pub fn len(&self) -> usize {
        self.entries
            .borrow()
            .values()
            .filter(|entry| entry.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
