//! View factory - creates synthetic views and pools released ones.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use super::{ComponentDefinition, Controller};
use crate::context::AppContext;
use crate::error::LifecycleError;

/// Creates synthetic views from one definition.
///
/// Holds a bounded free list of views that were released and unbound. The
/// pool is only touched by [`ViewFactory::create`] and
/// [`ViewFactory::try_return_to_cache`]; the decision to pool a view is made
/// once, when the view unbinds.
pub struct ViewFactory {
    this: Weak<ViewFactory>,
    context: Rc<AppContext>,
    definition: Rc<ComponentDefinition>,
    cache: RefCell<Vec<Rc<Controller>>>,
    cache_size: Cell<usize>,
}

impl ViewFactory {
    pub fn new(context: &Rc<AppContext>, definition: Rc<ComponentDefinition>) -> Rc<Self> {
        let cache_size = context.config().view_cache_size;
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            context: context.clone(),
            definition,
            cache: RefCell::new(Vec::new()),
            cache_size: Cell::new(cache_size),
        })
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &Rc<ComponentDefinition> {
        &self.definition
    }

    pub fn cache_size(&self) -> usize {
        self.cache_size.get()
    }

    pub fn cached(&self) -> usize {
        self.cache.borrow().len()
    }

    /// Resize the pool. Views beyond the new capacity are disposed.
    pub fn set_cache_size(&self, size: usize) {
        self.cache_size.set(size);
        let evicted: Vec<Rc<Controller>> = {
            let mut cache = self.cache.borrow_mut();
            let keep = cache.len().min(size);
            cache.split_off(keep)
        };
        for view in evicted {
            view.dispose();
        }
    }

    /// Pool `controller` if there is room.
    pub fn try_return_to_cache(&self, controller: &Rc<Controller>) -> bool {
        let mut cache = self.cache.borrow_mut();
        if cache.len() >= self.cache_size.get() {
            return false;
        }
        if cache.iter().any(|view| Rc::ptr_eq(view, controller)) {
            return true;
        }
        tracing::trace!(factory = %self.name(), id = %controller.id(), "view pooled");
        cache.push(controller.clone());
        true
    }

    /// Pop a pooled view, or hydrate a new one. `parent` becomes the view's
    /// hydration parent.
    pub fn create(
        &self,
        parent: Option<&Rc<Controller>>,
    ) -> Result<Rc<Controller>, LifecycleError> {
        let pooled = self.cache.borrow_mut().pop();
        if let Some(view) = pooled {
            view.clear_released();
            return Ok(view);
        }
        let factory = self.this.upgrade().ok_or_else(|| LifecycleError::Abandoned {
            name: self.name().to_string(),
        })?;
        Controller::for_synthetic_view(&self.context, &factory, parent)
    }
}

impl fmt::Debug for ViewFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewFactory")
            .field("name", &self.definition.name)
            .field("cache_size", &self.cache_size.get())
            .field("cached", &self.cache.borrow().len())
            .finish()
    }
}
