//! Completion signals for committed transitions.

use crate::state::InstanceId;
use crate::transition::TransitionInfo;
use crate::value::StateValue;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Event delivered to listeners after a transition commits.
#[derive(Debug, Clone)]
pub struct TransitionEvent {
    pub workflow: String,
    pub instance: InstanceId,
    pub transition: TransitionInfo,
    pub from_value: StateValue,
    pub to_value: StateValue,
}

/// A completion listener.
pub type Listener = Arc<dyn Fn(&TransitionEvent) + Send + Sync>;

/// Handle returned by `connect`, used to disconnect.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    fn new() -> Self {
        Self(format!("sub-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Listener registry of a workflow definition.
///
/// Delivery is synchronous. Listeners are snapshotted before delivery, so a
/// listener may connect or disconnect without deadlocking.
#[derive(Default)]
pub struct TransitionSignals {
    /// Listeners keyed by transition name.
    per_transition: RwLock<HashMap<String, Vec<(SubscriptionId, Listener)>>>,

    /// Listeners for every transition.
    global: RwLock<Vec<(SubscriptionId, Listener)>>,
}

impl TransitionSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to one transition name, whatever its source state.
    pub fn connect<F>(&self, transition: &str, listener: F) -> SubscriptionId
    where
        F: Fn(&TransitionEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.per_transition
            .write()
            .entry(transition.to_string())
            .or_default()
            .push((id.clone(), Arc::new(listener)));
        id
    }

    /// Subscribes to every transition.
    pub fn connect_all<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&TransitionEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        self.global.write().push((id.clone(), Arc::new(listener)));
        id
    }

    /// Removes a subscription.
    ///
    /// Returns true if the subscription was found and removed.
    pub fn disconnect(&self, id: &SubscriptionId) -> bool {
        let mut global = self.global.write();
        let before = global.len();
        global.retain(|(sub, _)| sub != id);
        if global.len() != before {
            return true;
        }
        drop(global);

        let mut per_transition = self.per_transition.write();
        for listeners in per_transition.values_mut() {
            let before = listeners.len();
            listeners.retain(|(sub, _)| sub != id);
            if listeners.len() != before {
                return true;
            }
        }
        false
    }

    /// Delivers an event to the transition's listeners, then to global listeners.
    pub fn notify(&self, event: &TransitionEvent) {
        let mut listeners: Vec<Listener> = self
            .per_transition
            .read()
            .get(&event.transition.name)
            .map(|subs| subs.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default();
        listeners.extend(self.global.read().iter().map(|(_, l)| Arc::clone(l)));

        for listener in listeners {
            listener(event);
        }
    }

    /// Returns the number of active subscriptions.
    pub fn subscription_count(&self) -> usize {
        let per_transition: usize = self.per_transition.read().values().map(Vec::len).sum();
        per_transition + self.global.read().len()
    }
}

impl fmt::Debug for TransitionSignals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionSignals")
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}
