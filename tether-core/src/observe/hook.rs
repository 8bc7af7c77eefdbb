//! Observation hooks.
//!
//! The owner of a bridged property (the "model") is told about reads and
//! changes through [`ObservationHook`]. A bridge keeps only a weak handle
//! to its hook, so the bridge never keeps its owner alive: the owner holds
//! the bridge, the bridge points back weakly.

use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::cache::{MutationEnvelope, Presenter};

/// Identity of an observed property, usually its field name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyId(Cow<'static, str>);

impl PropertyId {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for PropertyId {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl From<String> for PropertyId {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The owner's side of observation.
///
/// `will_access` is called before a bridge returns a value. `did_mutate`
/// wraps an invalidation: implementations must call `invalidate` exactly
/// once and may record the change before or after doing so.
pub trait ObservationHook: Send + Sync {
    fn will_access(&self, property: &PropertyId);

    fn did_mutate(&self, property: &PropertyId, invalidate: &mut dyn FnMut());
}

/// A bridge's registered mutation callback: a weak hook plus the property
/// it reports as.
#[derive(Clone)]
pub struct ObservationBinding {
    hook: Weak<dyn ObservationHook>,
    property: PropertyId,
}

impl ObservationBinding {
    pub fn new(hook: Weak<dyn ObservationHook>, property: impl Into<PropertyId>) -> Self {
        Self {
            hook,
            property: property.into(),
        }
    }

    pub fn property(&self) -> &PropertyId {
        &self.property
    }

    /// Check if the owner is still alive.
    pub fn is_alive(&self) -> bool {
        self.hook.strong_count() > 0
    }

    fn upgrade(&self) -> Option<Arc<dyn ObservationHook>> {
        self.hook.upgrade()
    }
}

impl fmt::Debug for ObservationBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservationBinding")
            .field("property", &self.property)
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Everything a bridge needs to report reads and run invalidations:
/// the (optional) observation binding, the envelope and the presenter.
#[derive(Default)]
pub(crate) struct MutationRelay {
    binding: RwLock<Option<ObservationBinding>>,
    envelope: MutationEnvelope,
    presenter: Option<Arc<dyn Presenter>>,
}

impl MutationRelay {
    pub(crate) fn new(envelope: MutationEnvelope, presenter: Option<Arc<dyn Presenter>>) -> Self {
        Self {
            binding: RwLock::new(None),
            envelope,
            presenter,
        }
    }

    pub(crate) fn bind(&self, binding: ObservationBinding) {
        *self.binding.write() = Some(binding);
    }

    pub(crate) fn binding(&self) -> Option<ObservationBinding> {
        self.binding.read().clone()
    }

    pub(crate) fn envelope(&self) -> &MutationEnvelope {
        &self.envelope
    }

    /// Report a read to the owner, if it is still alive.
    pub(crate) fn will_access(&self) {
        let Some(binding) = self.binding() else {
            return;
        };
        if let Some(hook) = binding.upgrade() {
            hook.will_access(&binding.property);
        }
    }

    /// Run `invalidate` inside the envelope and the owner's mutation hook.
    ///
    /// Without a live owner the invalidation still runs, just unobserved.
    pub(crate) fn mutate(&self, invalidate: &mut dyn FnMut()) {
        let binding = self.binding();
        let hook = binding.as_ref().and_then(ObservationBinding::upgrade);

        self.envelope.run(self.presenter.as_ref(), &mut || match (&binding, &hook) {
            (Some(binding), Some(hook)) => hook.did_mutate(&binding.property, &mut *invalidate),
            _ => invalidate(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct LogHook {
        log: Mutex<Vec<String>>,
    }

    impl ObservationHook for LogHook {
        fn will_access(&self, property: &PropertyId) {
            self.log.lock().push(format!("access:{property}"));
        }

        fn did_mutate(&self, property: &PropertyId, invalidate: &mut dyn FnMut()) {
            self.log.lock().push(format!("will-set:{property}"));
            invalidate();
            self.log.lock().push(format!("did-set:{property}"));
        }
    }

    #[test]
    fn relay_reports_through_live_hook() {
        let hook = Arc::new(LogHook::default());
        let relay = MutationRelay::default();
        relay.bind(ObservationBinding::new(Arc::downgrade(&hook) as Weak<dyn ObservationHook>, "title"));

        relay.will_access();
        let mut invalidated = false;
        relay.mutate(&mut || invalidated = true);

        assert!(invalidated);
        assert_eq!(
            *hook.log.lock(),
            vec!["access:title", "will-set:title", "did-set:title"]
        );
    }

    #[test]
    fn relay_invalidates_without_owner() {
        let relay = MutationRelay::default();
        let mut count = 0;
        relay.mutate(&mut || count += 1);
        assert_eq!(count, 1);

        let hook = Arc::new(LogHook::default());
        relay.bind(ObservationBinding::new(Arc::downgrade(&hook) as Weak<dyn ObservationHook>, "title"));
        drop(hook);

        relay.will_access();
        relay.mutate(&mut || count += 1);
        assert_eq!(count, 2);
        assert!(relay.binding().is_some_and(|b| !b.is_alive()));
    }

    #[test]
    fn binding_does_not_keep_owner_alive() {
        let hook = Arc::new(LogHook::default());
        let binding = ObservationBinding::new(Arc::downgrade(&hook) as Weak<dyn ObservationHook>, "title");
        assert_eq!(Arc::strong_count(&hook), 1);
        assert!(binding.is_alive());

        drop(hook);
        assert!(!binding.is_alive());
    }
}
