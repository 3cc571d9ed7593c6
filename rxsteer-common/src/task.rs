use futures::{future::poll_fn, Future};
use rustc_hash::FxHashSet;
use std::task::{ready, Context, Poll};
use tokio::task::{JoinError, JoinSet};

/// A set of tasks spawned on a Tokio runtime, each tied to a unique key.
///
/// Every task returns its own key alongside its output so the key can be
/// released when the task completes. Spawning a second task for a key that is
/// still live is a no-op.
#[derive(Debug)]
pub struct JoinMap<K, V> {
    keys: FxHashSet<K>,
    joinset: JoinSet<(K, V)>,
}

impl<K, V> Default for JoinMap<K, V> {
    fn default() -> Self {
        Self { keys: FxHashSet::default(), joinset: JoinSet::new() }
    }
}

impl<K: 'static, V: 'static> JoinMap<K, V> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tasks still in the set.
    pub fn len(&self) -> usize {
        self.joinset.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.joinset.is_empty()
    }

    /// Aborts every task in the set. Aborted tasks still have to be joined.
    pub fn abort_all(&mut self) {
        self.joinset.abort_all();
    }
}

impl<K, V> JoinMap<K, V>
where
    K: Eq + std::hash::Hash + Clone + Send + Sync + 'static,
    V: 'static,
{
    /// Spawns `future` unless a task for `key` is already running. Returns whether the
    /// task was spawned.
    pub fn spawn<F>(&mut self, key: K, future: F) -> bool
    where
        F: Future<Output = (K, V)> + Send + 'static,
        V: Send,
    {
        if self.keys.insert(key) {
            self.joinset.spawn(future);
            true
        } else {
            false
        }
    }

    /// Whether a task for `key` is still running.
    pub fn contains_key(&self, key: &K) -> bool {
        self.keys.contains(key)
    }

    /// Waits until one of the tasks completes and returns its output, or `None`
    /// if the set is empty.
    ///
    /// # Cancel Safety
    ///
    /// Cancel safe: if this loses a `tokio::select!` race no task is removed.
    pub async fn join_next(&mut self) -> Option<Result<(K, V), JoinError>> {
        poll_fn(|cx| self.poll_join_next(cx)).await
    }

    /// Waits for every task and collects the successful outputs. Panicked or
    /// aborted tasks are skipped.
    pub async fn join_all(&mut self) -> Vec<(K, V)> {
        let mut out = Vec::with_capacity(self.len());
        while let Some(res) = self.join_next().await {
            if let Ok(kv) = res {
                out.push(kv);
            }
        }
        self.keys.clear();
        out
    }

    /// Polls for one of the tasks to complete, releasing its key on success.
    pub fn poll_join_next(
        &mut self,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<(K, V), JoinError>>> {
        match ready!(self.joinset.poll_join_next(cx)) {
            Some(Ok((key, value))) => {
                self.keys.remove(&key);
                Poll::Ready(Some(Ok((key, value))))
            }
            Some(Err(err)) => Poll::Ready(Some(Err(err))),
            None => Poll::Ready(None),
        }
    }
}
