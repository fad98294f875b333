//! Bounded background write pool and the handle that delivers each result
//! exactly once.

use std::sync::Arc;

use tokio::sync::oneshot::error::TryRecvError;
use tokio::sync::{Semaphore, oneshot};
use tokio::task;

use crate::types::{PersistError, PersistOutcome, PersistRequest, PersistResult};
use crate::writer;

/// Receives the result of one submitted write.
///
/// Exactly one of the two methods is called, exactly once per save, from
/// whatever task drives the handle rather than from the writer thread.
pub trait SaveListener {
    fn on_success(&mut self, outcome: &PersistOutcome);
    fn on_error(&mut self, error: &PersistError);
}

/// A bounded pool of blocking writers.
///
/// Submitting never blocks the caller: each request queues a task that
/// waits for one of `max_in_flight` permits before touching the disk.
/// Writes to the same path are not serialized against each other; two
/// overlapping saves finish in whichever order the scheduler picks, and
/// the file ends up with the later finisher's bytes.
#[derive(Debug, Clone)]
pub struct WritePool {
    permits: Arc<Semaphore>,
    max_in_flight: usize,
}

impl WritePool {
    /// Creates a pool allowing `max_in_flight` concurrent writes, clamped
    /// to at least one.
    #[must_use]
    pub fn new(max_in_flight: usize) -> Self {
        let max_in_flight = max_in_flight.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
        }
    }

    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Queues one write and returns the handle its result arrives on.
    ///
    /// Must be called within a tokio runtime. Dropping the handle abandons
    /// the result but never cancels the write: once submitted, the bytes
    /// land (or fail) regardless of who is still listening.
    #[must_use]
    pub fn submit(&self, request: PersistRequest) -> SaveHandle {
        let (tx, rx) = oneshot::channel();
        let permits = Arc::clone(&self.permits);
        let path = request.path().to_path_buf();
        tracing::debug!(path = %path.display(), "write queued");
        task::spawn(async move {
            let Ok(permit) = permits.acquire_owned().await else {
                let _ = tx.send(Err(PersistError::WorkerGone));
                return;
            };
            let joined = task::spawn_blocking(move || writer::persist_blocking(&request)).await;
            drop(permit);
            let result = match joined {
                Ok(result) => result,
                Err(err) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %err,
                        "write task died before completing"
                    );
                    Err(PersistError::WorkerGone)
                }
            };
            if let Ok(outcome) = &result {
                tracing::debug!(
                    path = %path.display(),
                    bytes = outcome.bytes_written,
                    replacements = outcome.replacements,
                    "write completed"
                );
            }
            let _ = tx.send(result);
        });
        SaveHandle { rx: Some(rx) }
    }
}

/// One pending save.
///
/// The result is yielded at most once: through [`SaveHandle::join`],
/// [`SaveHandle::deliver_to`], or the first successful
/// [`SaveHandle::try_take`] poll.
#[derive(Debug)]
pub struct SaveHandle {
    rx: Option<oneshot::Receiver<PersistResult>>,
}

impl SaveHandle {
    /// Waits for the write to finish.
    pub async fn join(mut self) -> PersistResult {
        match self.rx.take() {
            Some(rx) => rx.await.unwrap_or_else(|_| Err(PersistError::WorkerGone)),
            None => Err(PersistError::WorkerGone),
        }
    }

    /// Polls without waiting. Returns `None` while the write is still in
    /// flight, the result on the first poll after completion, and `None`
    /// on every poll after that.
    pub fn try_take(&mut self) -> Option<PersistResult> {
        let rx = self.rx.as_mut()?;
        match rx.try_recv() {
            Ok(result) => {
                self.rx = None;
                Some(result)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => {
                self.rx = None;
                Some(Err(PersistError::WorkerGone))
            }
        }
    }

    /// Waits for the write, then makes exactly one listener call.
    pub async fn deliver_to<L>(self, listener: &mut L)
    where
        L: SaveListener + ?Sized,
    {
        match self.join().await {
            Ok(outcome) => listener.on_success(&outcome),
            Err(error) => listener.on_error(&error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SaveListener, WritePool};
    use crate::types::{PersistError, PersistOutcome, PersistRequest};
    use std::fs;
    use std::time::Duration;
    use tokio::time::sleep;

    #[derive(Default)]
    struct CountingListener {
        successes: usize,
        errors: usize,
        last_bytes: Option<u64>,
    }

    impl SaveListener for CountingListener {
        fn on_success(&mut self, outcome: &PersistOutcome) {
            self.successes += 1;
            self.last_bytes = Some(outcome.bytes_written);
        }

        fn on_error(&mut self, _error: &PersistError) {
            self.errors += 1;
        }
    }

    #[tokio::test]
    async fn join_returns_the_outcome_and_the_file_exists() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.txt");
        let pool = WritePool::new(2);
        let outcome = pool
            .submit(PersistRequest::new("hello", &path, "utf-8"))
            .join()
            .await
            .expect("join");
        assert_eq!(outcome.bytes_written, 5);
        assert_eq!(fs::read_to_string(&path).expect("read"), "hello");
    }

    #[tokio::test]
    async fn unsupported_label_arrives_through_the_handle() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("never.txt");
        let pool = WritePool::new(2);
        let err = pool
            .submit(PersistRequest::new("hello", &path, "utf-9"))
            .join()
            .await
            .unwrap_err();
        assert!(matches!(err, PersistError::UnsupportedEncoding { .. }));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn try_take_yields_the_result_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.txt");
        let pool = WritePool::new(1);
        let mut handle = pool.submit(PersistRequest::new("polled", &path, "utf-8"));

        let mut first = None;
        for _ in 0..500 {
            if let Some(result) = handle.try_take() {
                first = Some(result);
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        let outcome = first.expect("write finished").expect("success");
        assert_eq!(outcome.bytes_written, 6);
        assert!(handle.try_take().is_none());
        assert!(handle.try_take().is_none());
    }

    #[tokio::test]
    async fn deliver_to_makes_exactly_one_call_on_success() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.txt");
        let pool = WritePool::new(2);
        let mut listener = CountingListener::default();
        pool.submit(PersistRequest::new("abc", &path, "utf-8"))
            .deliver_to(&mut listener)
            .await;
        assert_eq!(listener.successes, 1);
        assert_eq!(listener.errors, 0);
        assert_eq!(listener.last_bytes, Some(3));
    }

    #[tokio::test]
    async fn deliver_to_makes_exactly_one_call_on_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.txt");
        let pool = WritePool::new(2);
        let mut listener = CountingListener::default();
        pool.submit(PersistRequest::new("abc", &path, "not-a-charset"))
            .deliver_to(&mut listener)
            .await;
        assert_eq!(listener.successes, 0);
        assert_eq!(listener.errors, 1);
    }

    #[tokio::test]
    async fn dropping_the_handle_does_not_cancel_the_write() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.txt");
        let pool = WritePool::new(1);
        drop(pool.submit(PersistRequest::new("still lands", &path, "utf-8")));

        let mut found = false;
        for _ in 0..500 {
            if fs::read_to_string(&path).is_ok_and(|s| s == "still lands") {
                found = true;
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        assert!(found, "write never landed after the handle was dropped");
    }

    #[tokio::test]
    async fn a_single_permit_pool_completes_overlapping_submissions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pool = WritePool::new(1);
        let first = pool.submit(PersistRequest::new("one", dir.path().join("1.txt"), "utf-8"));
        let second = pool.submit(PersistRequest::new("two", dir.path().join("2.txt"), "utf-8"));
        first.join().await.expect("first");
        second.join().await.expect("second");
        assert_eq!(
            fs::read_to_string(dir.path().join("1.txt")).expect("read 1"),
            "one"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("2.txt")).expect("read 2"),
            "two"
        );
    }

    #[test]
    fn pool_size_is_clamped_to_at_least_one() {
        let pool = WritePool::new(0);
        assert_eq!(pool.max_in_flight(), 1);
        assert_eq!(WritePool::new(8).max_in_flight(), 8);
    }
}
