//! Long-running event sources and their lifecycle.
//!
//! A [`Subscription`] wraps a [`SubscriptionSource`], a stream factory with a
//! stable [`SubscriptionId`]. The application returns its current set of
//! subscriptions every cycle and hands it to a [`SubscriptionManager`], which
//! starts sources that appeared and cancels sources that disappeared.
//!
//! Query enablement builds on this: a disabled query simply contributes no
//! subscription, so nothing runs until it is enabled.

use std::any::TypeId;
use std::collections::HashMap;

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Identity of a running subscription.
///
/// Two subscriptions with the same id are considered the same source; the
/// manager keeps the running one instead of restarting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    type_id: TypeId,
    hash: u64,
}

impl SubscriptionId {
    /// Creates an id for the source type `S` with the given content hash.
    pub fn of<S: 'static>(hash: u64) -> Self {
        Self {
            type_id: TypeId::of::<S>(),
            hash,
        }
    }
}

/// A source of values that can be turned into a stream.
pub trait SubscriptionSource: Send + 'static {
    type Output: Send + 'static;

    /// Creates the stream of values produced by this source.
    fn stream(&self) -> BoxStream<'static, Self::Output>;

    /// Returns the identity of this source.
    fn id(&self) -> SubscriptionId;
}

/// An active event source whose values are delivered as messages.
pub struct Subscription<Msg> {
    id: SubscriptionId,
    stream: BoxStream<'static, Msg>,
}

impl<Msg: Send + 'static> Subscription<Msg> {
    /// Creates a subscription from a source.
    pub fn new<S>(source: S) -> Self
    where
        S: SubscriptionSource<Output = Msg>,
    {
        Self {
            id: source.id(),
            stream: source.stream(),
        }
    }

    /// Transform the values of this subscription into another message type.
    ///
    /// The id is preserved, so mapping does not cause a restart.
    pub fn map<U, F>(self, f: F) -> Subscription<U>
    where
        U: Send + 'static,
        F: Fn(Msg) -> U + Send + 'static,
    {
        Subscription {
            id: self.id,
            stream: self.stream.map(f).boxed(),
        }
    }

    /// Returns the identity of this subscription.
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Consume the subscription, returning its stream.
    pub fn into_stream(self) -> BoxStream<'static, Msg> {
        self.stream
    }
}

/// Handle for a running subscription task
pub struct Handle {
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl Handle {
    pub const fn new(token: CancellationToken, join: JoinHandle<()>) -> Self {
        Self { token, join }
    }

    /// Cancel the subscription and wait for task completion
    pub async fn cancel(self) {
        self.token.cancel();
        let _ = self.join.await;
    }

    fn abort(&self) {
        self.token.cancel();
    }
}

/// Keeps the running subscriptions in sync with the desired set.
pub struct SubscriptionManager<Msg> {
    tx: mpsc::UnboundedSender<Msg>,
    running: HashMap<SubscriptionId, Handle>,
}

impl<Msg: Send + 'static> SubscriptionManager<Msg> {
    /// Creates a manager that forwards subscription values into `tx`.
    pub fn new(tx: mpsc::UnboundedSender<Msg>) -> Self {
        Self {
            tx,
            running: HashMap::new(),
        }
    }

    /// Reconciles running subscriptions with `subscriptions`.
    ///
    /// Sources whose id is already running are left untouched, new ids are
    /// spawned, and running ids missing from the list are cancelled.
    pub fn update(&mut self, subscriptions: impl IntoIterator<Item = Subscription<Msg>>) {
        let mut desired: HashMap<SubscriptionId, Subscription<Msg>> = subscriptions
            .into_iter()
            .map(|sub| (sub.id(), sub))
            .collect();

        self.running.retain(|id, handle| {
            if desired.contains_key(id) {
                true
            } else {
                tracing::debug!(?id, "cancelling subscription");
                handle.abort();
                false
            }
        });

        for (id, sub) in desired.drain() {
            if self.running.contains_key(&id) {
                continue;
            }
            tracing::debug!(?id, "starting subscription");
            let handle = self.spawn(sub);
            self.running.insert(id, handle);
        }
    }

    /// Returns `true` if a subscription with `id` is running.
    pub fn is_running(&self, id: &SubscriptionId) -> bool {
        self.running.contains_key(id)
    }

    /// Number of running subscriptions.
    pub fn len(&self) -> usize {
        self.running.len()
    }

    /// Returns `true` if no subscription is running.
    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }

    /// Cancels every running subscription and waits for the tasks to finish.
    pub async fn shutdown(&mut self) {
        for (_, handle) in self.running.drain() {
            handle.cancel().await;
        }
    }

    fn spawn(&self, sub: Subscription<Msg>) -> Handle {
        let token = CancellationToken::new();
        let child = token.clone();
        let tx = self.tx.clone();
        let mut stream = sub.into_stream();

        let join = tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = child.cancelled() => break,
                    next = stream.next() => match next {
                        Some(msg) => {
                            if tx.send(msg).is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
        });

        Handle::new(token, join)
    }
}

impl<Msg> Drop for SubscriptionManager<Msg> {
    fn drop(&mut self) {
        for handle in self.running.values() {
            handle.token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::hash::{DefaultHasher, Hash, Hasher};
    use tokio::time::{Duration, timeout};

    struct Numbers {
        name: &'static str,
        values: Vec<i32>,
    }

    impl SubscriptionSource for Numbers {
        type Output = i32;

        fn stream(&self) -> BoxStream<'static, i32> {
            stream::iter(self.values.clone()).boxed()
        }

        fn id(&self) -> SubscriptionId {
            let mut hasher = DefaultHasher::new();
            self.name.hash(&mut hasher);
            SubscriptionId::of::<Self>(hasher.finish())
        }
    }

    struct Pending;

    impl SubscriptionSource for Pending {
        type Output = i32;

        fn stream(&self) -> BoxStream<'static, i32> {
            stream::pending().boxed()
        }

        fn id(&self) -> SubscriptionId {
            SubscriptionId::of::<Self>(0)
        }
    }

    #[test]
    fn test_id_depends_on_type_and_hash() {
        assert_eq!(SubscriptionId::of::<Numbers>(1), SubscriptionId::of::<Numbers>(1));
        assert_ne!(SubscriptionId::of::<Numbers>(1), SubscriptionId::of::<Numbers>(2));
        assert_ne!(SubscriptionId::of::<Numbers>(1), SubscriptionId::of::<Pending>(1));
    }

    #[tokio::test]
    async fn test_map_keeps_id() {
        let sub = Subscription::new(Numbers {
            name: "a",
            values: vec![1, 2],
        });
        let id = sub.id();
        let mapped = sub.map(|n| n * 2);
        assert_eq!(mapped.id(), id);

        let values: Vec<_> = mapped.into_stream().collect().await;
        assert_eq!(values, vec![2, 4]);
    }

    #[tokio::test]
    async fn test_manager_forwards_values() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut manager = SubscriptionManager::new(tx);

        manager.update(vec![Subscription::new(Numbers {
            name: "a",
            values: vec![1, 2, 3],
        })]);

        let mut received = vec![];
        for _ in 0..3 {
            let value = timeout(Duration::from_secs(1), rx.recv())
                .await
                .expect("should receive within timeout")
                .expect("channel should be open");
            received.push(value);
        }
        assert_eq!(received, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_manager_starts_and_cancels() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut manager = SubscriptionManager::new(tx);
        let id = Subscription::new(Pending).id();

        manager.update(vec![Subscription::new(Pending)]);
        assert!(manager.is_running(&id));
        assert_eq!(manager.len(), 1);

        // Same id again: kept, not duplicated
        manager.update(vec![Subscription::new(Pending)]);
        assert_eq!(manager.len(), 1);

        manager.update(Vec::new());
        assert!(!manager.is_running(&id));
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut manager = SubscriptionManager::new(tx);
        manager.update(vec![Subscription::new(Pending)]);

        timeout(Duration::from_secs(1), manager.shutdown())
            .await
            .expect("shutdown should finish");
        assert!(manager.is_empty());
    }
}
