//! Topic-based publish/subscribe registry.
//!
//! Maps each channel to the handlers subscribed on it, keyed by subscriber
//! id. A `(id, channel)` pair holds at most one handler at a time.
//!
//! Thread-safe: the registry sits behind a `RwLock`. `publish` dispatches
//! while holding a recursive read lock, so concurrent publishes proceed in
//! parallel and a handler may publish again on the same instance even while a
//! writer is queued. `subscribe`/`unsubscribe` wait for in-flight dispatches
//! to drain. Once `unsubscribe` returns, the removed handler is never invoked
//! again.
//!
//! Handlers must not call `subscribe` or `unsubscribe` on the instance that is
//! dispatching to them; doing so deadlocks.

use crate::bag::Value;
use crate::error::{Error, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, warn};

/// Subscriber callback, invoked with the channel and the published data.
pub type Handler<C, D> = Arc<dyn Fn(&C, &[D]) -> Result<()> + Send + Sync>;

/// Registry of channel subscriptions.
pub struct PubSub<K, C, D = Value> {
    channels: RwLock<BTreeMap<C, BTreeMap<K, Handler<C, D>>>>,
}

impl<K, C, D> PubSub<K, C, D>
where
    K: Ord + Clone + Debug,
    C: Ord + Clone + Debug,
{
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register `handler` for `id` on `channel`.
    ///
    /// Fails with `DuplicateSubscription`, leaving the registry untouched, if
    /// the pair is already registered.
    pub fn subscribe<F>(&self, id: K, channel: C, handler: F) -> Result<()>
    where
        F: Fn(&C, &[D]) -> Result<()> + Send + Sync + 'static,
    {
        let mut channels = self.channels.write();
        let subscribers = channels.entry(channel.clone()).or_default();
        if subscribers.contains_key(&id) {
            return Err(Error::duplicate_subscription(&id, &channel));
        }
        debug!(id = ?id, channel = ?channel, "subscribed");
        subscribers.insert(id, Arc::new(handler));
        Ok(())
    }

    /// Remove the handler for `id` on `channel`.
    pub fn unsubscribe(&self, id: &K, channel: &C) -> Result<()> {
        let mut channels = self.channels.write();
        let Some(subscribers) = channels.get_mut(channel) else {
            return Err(Error::subscription_not_found(id, channel));
        };
        if subscribers.remove(id).is_none() {
            return Err(Error::subscription_not_found(id, channel));
        }
        if subscribers.is_empty() {
            channels.remove(channel);
        }
        debug!(id = ?id, channel = ?channel, "unsubscribed");
        Ok(())
    }

    /// Invoke every handler registered on `channel`, in ascending id order.
    ///
    /// Dispatch continues past a failing handler; the first error is
    /// returned once every handler has run and later ones are logged.
    /// Publishing to a channel without subscribers succeeds.
    pub fn publish(&self, channel: &C, data: &[D]) -> Result<()> {
        // Recursive: a queued writer must not block a handler that publishes
        let channels = self.channels.read_recursive();
        let Some(subscribers) = channels.get(channel) else {
            return Ok(());
        };

        let mut first_error = None;
        for (id, handler) in subscribers {
            if let Err(err) = handler(channel, data) {
                warn!(id = ?id, channel = ?channel, error = %err, "subscriber failed");
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn is_subscribed(&self, id: &K, channel: &C) -> bool {
        self.channels
            .read()
            .get(channel)
            .is_some_and(|subscribers| subscribers.contains_key(id))
    }

    /// Subscriber ids on `channel`, in dispatch order.
    pub fn subscribers(&self, channel: &C) -> Vec<K> {
        self.channels
            .read()
            .get(channel)
            .map(|subscribers| subscribers.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Channels with at least one subscriber.
    pub fn channels(&self) -> Vec<C> {
        self.channels.read().keys().cloned().collect()
    }
}

impl<K, C, D> Default for PubSub<K, C, D>
where
    K: Ord + Clone + Debug,
    C: Ord + Clone + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::sync::Mutex;

    #[test]
    fn test_duplicate_subscription_leaves_state() {
        let bus: PubSub<String, String> = PubSub::new();
        bus.subscribe("id".into(), "ch".into(), |_, _| Ok(())).unwrap();
        let err = bus
            .subscribe("id".into(), "ch".into(), |_, _| Err(Error::internal("replaced")))
            .unwrap_err();
        assert!(err.is(ErrorCode::DuplicateSubscription));
        // The original handler is still the one registered
        assert!(bus.publish(&"ch".into(), &[]).is_ok());
    }

    #[test]
    fn test_unsubscribe_missing() {
        let bus: PubSub<String, String> = PubSub::new();
        let err = bus.unsubscribe(&"missing".into(), &"ch".into()).unwrap_err();
        assert!(err.is(ErrorCode::SubscriptionNotFound));

        bus.subscribe("a".into(), "ch".into(), |_, _| Ok(())).unwrap();
        let err = bus.unsubscribe(&"b".into(), &"ch".into()).unwrap_err();
        assert!(err.is(ErrorCode::SubscriptionNotFound));
    }

    #[test]
    fn test_publish_continues_after_error() {
        let bus: PubSub<u32, &'static str, i64> = PubSub::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for id in [3, 1, 2] {
            let seen = Arc::clone(&seen);
            bus.subscribe(id, "ch", move |_, data: &[i64]| {
                seen.lock().unwrap().push((id, data.to_vec()));
                if id == 1 {
                    Err(Error::internal("first failure"))
                } else if id == 2 {
                    Err(Error::internal("second failure"))
                } else {
                    Ok(())
                }
            })
            .unwrap();
        }

        let err = bus.publish(&"ch", &[7]).unwrap_err();
        assert_eq!(err.message, "first failure");
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(1, vec![7]), (2, vec![7]), (3, vec![7])]
        );
    }

    #[test]
    fn test_empty_channels_are_dropped() {
        let bus: PubSub<&'static str, &'static str> = PubSub::new();
        bus.subscribe("a", "x", |_, _| Ok(())).unwrap();
        assert_eq!(bus.channels(), vec!["x"]);
        bus.unsubscribe(&"a", &"x").unwrap();
        assert!(bus.channels().is_empty());
        assert!(bus.publish(&"x", &[]).is_ok());
    }
}
