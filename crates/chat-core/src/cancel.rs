//! Cooperative cancellation shared between a stream handle and its transport.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

type AbortHook = Box<dyn FnOnce()>;

#[derive(Default)]
struct SignalInner {
    cancelled: Cell<bool>,
    hooks: RefCell<Vec<AbortHook>>,
}

/// One-shot cancel flag. Clones observe the same flag.
///
/// Transports register an abort hook (e.g. `AbortController::abort`) with
/// [`CancelSignal::on_cancel`]; hooks run exactly once, on the first
/// [`CancelSignal::cancel`]. A hook registered after cancellation runs
/// immediately.
#[derive(Clone, Default)]
pub struct CancelSignal {
    inner: Rc<SignalInner>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.get()
    }

    /// Returns `true` if this call flipped the flag.
    pub fn cancel(&self) -> bool {
        if self.inner.cancelled.replace(true) {
            return false;
        }
        let hooks = std::mem::take(&mut *self.inner.hooks.borrow_mut());
        for hook in hooks {
            hook();
        }
        true
    }

    pub fn on_cancel(&self, hook: impl FnOnce() + 'static) {
        if self.is_cancelled() {
            hook();
        } else {
            self.inner.hooks.borrow_mut().push(Box::new(hook));
        }
    }
}

impl fmt::Debug for CancelSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelSignal")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
