//! Synchronous listener registry shared by the state holders.
//!
//! Listeners run on the notifying thread, after the holder has released its
//! own lock, so a listener may read back from the holder that notified it.

use std::sync::{Arc, Mutex, PoisonError, Weak};

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct ListenerSet<E> {
  next_id: u64,
  entries: Vec<(u64, Listener<E>)>,
}

/// A set of listeners for events of type `E`.
pub struct Listeners<E> {
  inner: Arc<Mutex<ListenerSet<E>>>,
}

impl<E> Clone for Listeners<E> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}

impl<E: 'static> Default for Listeners<E> {
  fn default() -> Self {
    Self::new()
  }
}

impl<E: 'static> Listeners<E> {
  pub fn new() -> Self {
    Self {
      inner: Arc::new(Mutex::new(ListenerSet {
        next_id: 0,
        entries: Vec::new(),
      })),
    }
  }

  /// Register a listener. It stays registered until the returned
  /// [`Subscription`] is dropped.
  pub fn subscribe<F>(&self, listener: F) -> Subscription
  where
    F: Fn(&E) + Send + Sync + 'static,
  {
    let id = {
      let mut set = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
      let id = set.next_id;
      set.next_id += 1;
      set.entries.push((id, Arc::new(listener)));
      id
    };

    let weak: Weak<Mutex<ListenerSet<E>>> = Arc::downgrade(&self.inner);
    Subscription {
      unsubscribe: Some(Box::new(move || {
        if let Some(inner) = weak.upgrade() {
          let mut set = inner.lock().unwrap_or_else(PoisonError::into_inner);
          set.entries.retain(|(entry_id, _)| *entry_id != id);
        }
      })),
    }
  }

  /// Call every registered listener with `event`.
  pub fn notify(&self, event: &E) {
    let listeners: Vec<Listener<E>> = {
      let set = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
      set.entries.iter().map(|(_, l)| Arc::clone(l)).collect()
    };
    for listener in listeners {
      listener(event);
    }
  }

  pub fn len(&self) -> usize {
    self
      .inner
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .entries
      .len()
  }
}

/// Handle returned by `subscribe`. Dropping it removes the listener.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
  unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Drop for Subscription {
  fn drop(&mut self) {
    if let Some(unsubscribe) = self.unsubscribe.take() {
      unsubscribe();
    }
  }
}

impl std::fmt::Debug for Subscription {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Subscription").finish_non_exhaustive()
  }
}
