//! Progress reporting for publish runs.

use std::marker::PhantomData;

/// Generic progress callback trait.
///
/// Type parameter `T` is the progress data type.
pub trait ProgressCallback<T>: Send + Sync {
    /// Called with progress updates.
    ///
    /// # Returns
    /// - `true` to continue the operation
    /// - `false` to cancel the operation
    fn on_progress(&self, progress: &T) -> bool;
}

/// A progress callback that wraps a closure.
pub struct FnProgress<F, T> {
    callback: F,
    _marker: PhantomData<fn(&T)>,
}

impl<F, T> ProgressCallback<T> for FnProgress<F, T>
where
    F: Fn(&T) -> bool + Send + Sync,
{
    fn on_progress(&self, progress: &T) -> bool {
        (self.callback)(progress)
    }
}

/// Create a progress callback from a closure.
pub fn progress_fn<F, T>(f: F) -> FnProgress<F, T>
where
    F: Fn(&T) -> bool + Send + Sync,
{
    FnProgress {
        callback: f,
        _marker: PhantomData,
    }
}

/// Terminal state of one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    /// Already published with identical bytes at the same name.
    Skipped,
    /// Written to the store.
    Uploaded,
    /// Transform or upload failed; retried on the next run.
    Failed,
}

/// One update per artifact reaching a terminal state.
#[derive(Debug, Clone)]
pub struct PublishProgress {
    /// Local path (or derived name) of the artifact.
    pub path: String,
    /// Remote name, if one was computed before the artifact settled.
    pub remote_name: Option<String>,
    /// Terminal state reached.
    pub state: ArtifactState,
    /// Position of this artifact among those settled in the current wave,
    /// starting at 1.
    pub completed: usize,
    /// Work items queued so far in the current wave. Grows as transforms
    /// fan out.
    pub queued: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_progress_fn() {
        let seen: AtomicUsize = AtomicUsize::new(0);
        let callback: FnProgress<_, PublishProgress> = progress_fn(|p: &PublishProgress| {
            seen.fetch_add(1, Ordering::SeqCst);
            p.state != ArtifactState::Failed
        });

        let mut update: PublishProgress = PublishProgress {
            path: "a.css".into(),
            remote_name: Some("abc".into()),
            state: ArtifactState::Uploaded,
            completed: 1,
            queued: 2,
        };
        assert!(callback.on_progress(&update));

        update.state = ArtifactState::Failed;
        assert!(!callback.on_progress(&update));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
