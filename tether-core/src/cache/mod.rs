//! Caching Primitives
//!
//! [`ValueCache`] is the memoization cell both bridges are built on: it
//! holds at most one value, is cleared by invalidation, and is repopulated
//! lazily on the next read.
//!
//! [`MutationEnvelope`] is the presentation scope (transaction, animation,
//! or none) an invalidation runs in, so the host UI can animate or batch
//! the resulting update.

mod envelope;
mod value_cache;

pub use envelope::{
    install_presenter, installed_presenter, uninstall_presenter, Animation, AnimationCurve,
    MutationEnvelope, Presenter, Transaction,
};
pub use value_cache::{CacheState, ValueCache};

#[cfg(test)]
pub(crate) use envelope::tests::RecordingPresenter;
