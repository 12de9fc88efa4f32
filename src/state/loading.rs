//! Reference-counted loading indicator.

use super::presenter::Presenter;
use parking_lot::Mutex;

/// Number of in-flight requests that asked for the loading indicator.
///
/// The presenter hears about the 0 → 1 and 1 → 0 transitions only. The count
/// never goes below zero.
#[derive(Debug, Default)]
pub struct LoadingCounter {
    count: Mutex<usize>,
}

impl LoadingCounter {
    /// Create a counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current count.
    pub fn count(&self) -> usize {
        *self.count.lock()
    }

    /// Whether the indicator is visible.
    pub fn is_visible(&self) -> bool {
        self.count() > 0
    }

    /// Register one in-flight request.
    ///
    /// The returned guard decrements the counter when dropped, so the count
    /// settles even if the request future is dropped mid-flight.
    pub fn begin<'a>(&'a self, presenter: &'a dyn Presenter, text: Option<&str>) -> LoadingGuard<'a> {
        let became_visible = {
            let mut count = self.count.lock();
            *count += 1;
            *count == 1
        };
        if became_visible {
            presenter.loading_changed(true, text);
        }
        LoadingGuard {
            counter: self,
            presenter,
        }
    }

    fn end(&self, presenter: &dyn Presenter) {
        let became_hidden = {
            let mut count = self.count.lock();
            if *count == 0 {
                return;
            }
            *count -= 1;
            *count == 0
        };
        if became_hidden {
            presenter.loading_changed(false, None);
        }
    }
}

/// Decrements the [`LoadingCounter`] on drop.
#[must_use = "the request is counted only while the guard is alive"]
pub struct LoadingGuard<'a> {
    counter: &'a LoadingCounter,
    presenter: &'a dyn Presenter,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.counter.end(self.presenter);
    }
}
