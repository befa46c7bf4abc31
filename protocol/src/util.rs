use tokio::runtime::{Handle, RuntimeFlavor};

/// Runs a blocking closure without starving the async runtime.
///
/// `block_in_place` is only available on the multi-threaded runtime; on the
/// current-thread runtime (or outside any runtime, e.g. in unit tests) the
/// closure runs directly.
#[inline]
pub fn maybe_block_in_place<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_outside_runtime() {
        assert_eq!(maybe_block_in_place(|| 7), 7);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn runs_inside_multi_thread_runtime() {
        assert_eq!(maybe_block_in_place(|| 7), 7);
    }

    #[tokio::test]
    async fn runs_inside_current_thread_runtime() {
        assert_eq!(maybe_block_in_place(|| 7), 7);
    }
}
