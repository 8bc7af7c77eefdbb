//! Mutation Envelopes
//!
//! An envelope wraps a cache invalidation (and the observation callback
//! around it) in a presentation scope: a named transaction or an animated
//! transition. The scopes themselves belong to the host UI layer, which
//! plugs in through the [`Presenter`] trait.
//!
//! A bridge has exactly one envelope. `Direct` runs the invalidation with
//! no wrapping at all.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::RwLock;

/// A named transactional scope for UI updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Label used by the host and in logs.
    pub label: String,

    /// Ask the host to suppress implicit animations inside this scope.
    pub disables_animations: bool,
}

impl Transaction {
    /// A transaction that leaves animations alone.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            disables_animations: false,
        }
    }

    /// Suppress implicit animations inside this transaction.
    pub fn disabling_animations(mut self) -> Self {
        self.disables_animations = true;
        self
    }
}

/// Timing curve of an [`Animation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationCurve {
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
    Spring,
}

/// An animated-transition scope for UI updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Animation {
    pub curve: AnimationCurve,
    pub duration: Duration,
}

impl Animation {
    /// An animation with an explicit curve.
    pub fn new(curve: AnimationCurve, duration: Duration) -> Self {
        Self { curve, duration }
    }

    /// A linear animation.
    pub fn linear(duration: Duration) -> Self {
        Self::new(AnimationCurve::Linear, duration)
    }

    /// An ease-in-out animation.
    pub fn ease_in_out(duration: Duration) -> Self {
        Self::new(AnimationCurve::EaseInOut, duration)
    }
}

impl Default for Animation {
    fn default() -> Self {
        Self::ease_in_out(Duration::from_millis(350))
    }
}

/// Host hook that opens presentation scopes.
///
/// Implementations must call `body` exactly once.
pub trait Presenter: Send + Sync {
    fn with_transaction(&self, transaction: &Transaction, body: &mut dyn FnMut());

    fn with_animation(&self, animation: &Animation, body: &mut dyn FnMut());
}

static PRESENTER: OnceLock<RwLock<Option<Arc<dyn Presenter>>>> = OnceLock::new();

fn presenter_slot() -> &'static RwLock<Option<Arc<dyn Presenter>>> {
    PRESENTER.get_or_init(|| RwLock::new(None))
}

/// Install the process-wide presenter used by envelopes of bridges that
/// were not given one of their own.
pub fn install_presenter(presenter: Arc<dyn Presenter>) {
    *presenter_slot().write() = Some(presenter);
}

/// Remove the process-wide presenter.
pub fn uninstall_presenter() {
    *presenter_slot().write() = None;
}

/// The process-wide presenter, if one is installed.
pub fn installed_presenter() -> Option<Arc<dyn Presenter>> {
    presenter_slot().read().clone()
}

/// Presentation scope applied around an invalidation.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum MutationEnvelope {
    /// Run the invalidation as is.
    #[default]
    Direct,

    /// Run the invalidation inside a transaction.
    Transaction(Transaction),

    /// Run the invalidation inside an animated transition.
    Animation(Animation),
}

impl MutationEnvelope {
    /// Build an envelope from optional builder settings.
    ///
    /// Returns `None` when both a transaction and an animation are given.
    pub fn from_parts(
        transaction: Option<Transaction>,
        animation: Option<Animation>,
    ) -> Option<Self> {
        match (transaction, animation) {
            (Some(_), Some(_)) => None,
            (Some(transaction), None) => Some(Self::Transaction(transaction)),
            (None, Some(animation)) => Some(Self::Animation(animation)),
            (None, None) => Some(Self::Direct),
        }
    }

    /// Check if invalidations run unwrapped.
    pub fn is_direct(&self) -> bool {
        matches!(self, Self::Direct)
    }

    /// The transaction, for a transaction envelope.
    pub fn transaction(&self) -> Option<&Transaction> {
        match self {
            Self::Transaction(transaction) => Some(transaction),
            _ => None,
        }
    }

    /// The animation, for an animation envelope.
    pub fn animation(&self) -> Option<&Animation> {
        match self {
            Self::Animation(animation) => Some(animation),
            _ => None,
        }
    }

    /// Run `body` inside this envelope.
    ///
    /// `presenter` is the bridge's own presenter; without one the installed
    /// process-wide presenter is used, and without that the body runs
    /// directly inside a tracing span named after the scope.
    pub fn run(&self, presenter: Option<&Arc<dyn Presenter>>, body: &mut dyn FnMut()) {
        if self.is_direct() {
            body();
            return;
        }

        let presenter = presenter.cloned().or_else(installed_presenter);
        match (self, presenter) {
            (Self::Transaction(transaction), Some(presenter)) => {
                presenter.with_transaction(transaction, body)
            }
            (Self::Animation(animation), Some(presenter)) => {
                presenter.with_animation(animation, body)
            }
            (Self::Transaction(transaction), None) => {
                let _span =
                    tracing::debug_span!("transaction", label = %transaction.label).entered();
                body();
            }
            (Self::Animation(animation), None) => {
                let _span = tracing::debug_span!(
                    "animation",
                    curve = ?animation.curve,
                    duration_ms = animation.duration.as_millis() as u64
                )
                .entered();
                body();
            }
            (Self::Direct, _) => body(),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
