use std::{
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

use crate::Blocker;

/// Runtime state every socket wrapper reads: the scheduler bridge slot.
///
/// The embedding scheduler registers its [`Blocker`] at start-up and may
/// clear it at shutdown. While the slot is empty, would-block results are
/// returned to callers instead of suspending the task.
#[derive(Default)]
pub struct Context {
    blocker: RwLock<Option<Arc<dyn Blocker>>>,
}

impl Context {
    /// Create a context with no scheduler registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context with `blocker` registered.
    pub fn with_blocker(blocker: Arc<dyn Blocker>) -> Self {
        Self {
            blocker: RwLock::new(Some(blocker)),
        }
    }

    /// Register `blocker`, returning the previously registered one.
    pub fn set_blocker(&self, blocker: Arc<dyn Blocker>) -> Option<Arc<dyn Blocker>> {
        log::debug!("register scheduler bridge");

        self.blocker
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(blocker)
    }

    /// Remove the registered scheduler, if any.
    pub fn clear_blocker(&self) -> Option<Arc<dyn Blocker>> {
        log::debug!("clear scheduler bridge");

        self.blocker
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// The registered scheduler, if any.
    pub fn blocker(&self) -> Option<Arc<dyn Blocker>> {
        self.blocker
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns true if a scheduler is currently registered.
    pub fn has_blocker(&self) -> bool {
        self.blocker
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("blocker", &self.has_blocker())
            .finish()
    }
}
