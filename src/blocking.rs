//! Blocking wrappers over the async adapters.
//!
//! All blocking calls share one lazily started runtime so that pooled
//! connections survive between calls. Calling a blocking variant from
//! inside an async runtime is rejected instead of panicking.

use std::future::Future;
use std::pin::Pin;
use std::sync::OnceLock;

use futures_util::{Stream, StreamExt};
use tokio::runtime::{Builder, Handle, Runtime};

use crate::error::{Error, Result};

/// Shared runtime (stores Result to handle init errors)
static RUNTIME: OnceLock<std::result::Result<Runtime, String>> = OnceLock::new();

/// Get the blocking runtime (starts once, then cached)
pub fn runtime() -> Result<&'static Runtime> {
    let result = RUNTIME.get_or_init(|| {
        Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("parallel-web-blocking")
            .enable_all()
            .build()
            .map_err(|e| e.to_string())
    });

    match result {
        Ok(rt) => Ok(rt),
        Err(e) => Err(Error::Configuration(format!("Failed to start blocking runtime: {}", e))),
    }
}

fn ensure_outside_runtime() -> Result<()> {
    if Handle::try_current().is_ok() {
        return Err(Error::Configuration(
            "blocking call made from inside an async runtime; use the async variant".to_string(),
        ));
    }
    Ok(())
}

/// Drive `fut` to completion on the shared runtime
pub fn run<T, F>(fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    ensure_outside_runtime()?;
    runtime()?.block_on(fut)
}

/// Iterator over an async stream, pulling one item per `next()`.
///
/// Dropping the iterator drops the stream and whatever connection it holds.
pub struct BlockingStream<T> {
    inner: Pin<Box<dyn Stream<Item = Result<T>> + Send>>,
    runtime: &'static Runtime,
}

impl<T> BlockingStream<T> {
    pub(crate) fn new(inner: Pin<Box<dyn Stream<Item = Result<T>> + Send>>) -> Result<Self> {
        ensure_outside_runtime()?;
        Ok(Self {
            inner,
            runtime: runtime()?,
        })
    }
}

impl<T> Iterator for BlockingStream<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.runtime.block_on(self.inner.next())
    }
}

impl<T> std::fmt::Debug for BlockingStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingStream").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[test]
    fn test_run_outside_runtime() {
        let value = run(async { Ok::<_, Error>(42) }).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_blocking_stream_iterates_in_order() {
        let inner = Box::pin(stream::iter(vec![Ok::<i32, Error>(1), Ok(2), Ok(3)]));
        let items: Vec<i32> = BlockingStream::new(inner)
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(items, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_rejected_inside_runtime() {
        let err = run(async { Ok::<_, Error>(()) }).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
