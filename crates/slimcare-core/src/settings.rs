//! Clinic customization shared with every view.
//!
//! The current [`Customization`] lives in an explicit [`SettingsContext`] that
//! is passed to whoever needs it. Subscribers are notified after each update.

use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};

/// Branding shown across the application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Customization {
    pub clinic_name: String,
    /// Logo as a `data:` URI
    pub logo_data_uri: Option<String>,
    /// Accent colour as a hex string
    pub accent_color: String,
}

impl Default for Customization {
    fn default() -> Self {
        Self {
            clinic_name: "SlimCare".into(),
            logo_data_uri: None,
            accent_color: "#16a34a".into(),
        }
    }
}

/// Handle returned by [`SettingsContext::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&Customization) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
}

/// Shared customization with change notification. Cloning shares state.
#[derive(Clone, Default)]
pub struct SettingsContext {
    current: Arc<RwLock<Customization>>,
    subscribers: Arc<Mutex<Subscribers>>,
}

impl SettingsContext {
    pub fn new(initial: Customization) -> Self {
        Self {
            current: Arc::new(RwLock::new(initial)),
            subscribers: Arc::default(),
        }
    }

    /// Snapshot of the current customization.
    pub fn get(&self) -> Customization {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Register a listener called with the new value after every change.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Customization) + Send + Sync + 'static,
    {
        let mut subs = self.lock_subscribers();
        let id = SubscriptionId(subs.next_id);
        subs.next_id += 1;
        subs.listeners.push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.lock_subscribers();
        let before = subs.listeners.len();
        subs.listeners.retain(|(sub_id, _)| *sub_id != id);
        subs.listeners.len() != before
    }

    /// Replace the customization and notify listeners if it changed.
    pub fn set(&self, value: Customization) {
        self.update(|current| *current = value);
    }

    /// Mutate the customization in place and notify listeners if it changed.
    pub fn update<F>(&self, mutate: F)
    where
        F: FnOnce(&mut Customization),
    {
        let snapshot = {
            let mut guard = match self.current.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let before = guard.clone();
            mutate(&mut guard);
            if *guard == before {
                return;
            }
            guard.clone()
        };

        // Listeners run without holding either lock so they may read the context.
        let listeners: Vec<Listener> = self
            .lock_subscribers()
            .listeners
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        tracing::debug!(listeners = listeners.len(), "Customization changed");
        for listener in listeners {
            listener(&snapshot);
        }
    }

    fn lock_subscribers(&self) -> std::sync::MutexGuard<'_, Subscribers> {
        match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl std::fmt::Debug for SettingsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsContext")
            .field("current", &self.get())
            .field("subscribers", &self.lock_subscribers().listeners.len())
            .finish()
    }
}
