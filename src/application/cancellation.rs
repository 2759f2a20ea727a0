use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Caller-owned stop signal, checked by the searches between solves.
///
/// Clones share the same flag, so one clone can be handed to a search while
/// another stays with the caller (or another thread).
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

pub(crate) fn is_cancelled(cancellation: &Option<Cancellation>) -> bool {
    cancellation.as_ref().is_some_and(Cancellation::is_cancelled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = Cancellation::new();
        let handed_out = token.clone();
        assert!(!handed_out.is_cancelled());
        token.cancel();
        assert!(handed_out.is_cancelled());
        assert!(is_cancelled(&Some(handed_out)));
        assert!(!is_cancelled(&None));
    }
}
