//! Handler registry and message dispatch.
//!
//! Handlers are kept per [`Topic`] in registration order. Dispatch copies
//! the matching handler list out of the lock before calling anything, so a
//! handler may register, remove, or send without deadlocking and without
//! disturbing the dispatch in progress.
//!
//! # Dispatch Order
//!
//! 1. Handlers on the message's own topic, called with `payload`
//! 2. Wildcard handlers, called with the whole envelope
//!
//! `pong` messages reach nobody, wildcard handlers included.
//!
//! # Panics in Handlers
//!
//! Every handler call is isolated with `catch_unwind`. A panic is logged at
//! `error` level and reported to error handlers as [`Error::Handler`]; the
//! remaining handlers still run and the session keeps going. A panic inside
//! an error handler is only logged.

// ============================================================================
// Imports
// ============================================================================

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::error;

use crate::error::Error;
use crate::identifiers::SubscriptionId;
use crate::protocol::{InboundEnvelope, Topic};

// ============================================================================
// Types
// ============================================================================

/// Handler for messages on a topic.
pub type MessageHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Handler for connect and disconnect notifications.
pub type LifecycleHandler = Arc<dyn Fn() + Send + Sync>;

/// Handler for transport errors.
pub type ErrorHandler = Arc<dyn Fn(&Error) + Send + Sync>;

type Entries<H> = Vec<(SubscriptionId, H)>;

// ============================================================================
// Registry
// ============================================================================

/// Every handler registered on a client.
#[derive(Default)]
pub(crate) struct Registry {
    topics: FxHashMap<Topic, Entries<MessageHandler>>,
    connect: Entries<LifecycleHandler>,
    disconnect: Entries<LifecycleHandler>,
    error: Entries<ErrorHandler>,
}

impl Registry {
    pub(crate) fn add_message(&mut self, topic: Topic, handler: MessageHandler) -> SubscriptionId {
        let id = SubscriptionId::next();
        self.topics.entry(topic).or_default().push((id, handler));
        id
    }

    pub(crate) fn add_connect(&mut self, handler: LifecycleHandler) -> SubscriptionId {
        let id = SubscriptionId::next();
        self.connect.push((id, handler));
        id
    }

    pub(crate) fn add_disconnect(&mut self, handler: LifecycleHandler) -> SubscriptionId {
        let id = SubscriptionId::next();
        self.disconnect.push((id, handler));
        id
    }

    pub(crate) fn add_error(&mut self, handler: ErrorHandler) -> SubscriptionId {
        let id = SubscriptionId::next();
        self.error.push((id, handler));
        id
    }

    /// Removes the handler registered under `id`, wherever it lives.
    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        let found = self.topics.iter_mut().find_map(|(topic, entries)| {
            remove_entry(entries, id).then(|| (topic.clone(), entries.is_empty()))
        });

        if let Some((topic, emptied)) = found {
            if emptied {
                self.topics.remove(&topic);
            }
            return true;
        }

        remove_entry(&mut self.connect, id)
            || remove_entry(&mut self.disconnect, id)
            || remove_entry(&mut self.error, id)
    }

    pub(crate) fn clear(&mut self) {
        self.topics.clear();
        self.connect.clear();
        self.disconnect.clear();
        self.error.clear();
    }

    /// Total number of registered handlers of every kind.
    pub(crate) fn len(&self) -> usize {
        self.topics.values().map(Vec::len).sum::<usize>()
            + self.connect.len()
            + self.disconnect.len()
            + self.error.len()
    }

    fn message_handlers(&self, topic: &Topic) -> Vec<MessageHandler> {
        self.topics.get(topic).map(snapshot).unwrap_or_default()
    }
}

fn remove_entry<H>(entries: &mut Entries<H>, id: SubscriptionId) -> bool {
    match entries.iter().position(|(entry_id, _)| *entry_id == id) {
        Some(index) => {
            entries.remove(index);
            true
        }
        None => false,
    }
}

fn snapshot<H: Clone>(entries: &Entries<H>) -> Vec<H> {
    entries.iter().map(|(_, handler)| handler.clone()).collect()
}

// ============================================================================
// Dispatch
// ============================================================================

/// Delivers a decoded message. Returns how many handlers ran.
pub(crate) fn dispatch(registry: &Mutex<Registry>, envelope: &InboundEnvelope) -> usize {
    if envelope.topic.is_reserved() {
        return 0;
    }

    let (typed, wildcard) = {
        let registry = registry.lock();
        (
            registry.message_handlers(&envelope.topic),
            registry.message_handlers(&Topic::Wildcard),
        )
    };

    let topic = envelope.topic.to_string();
    let mut failures = Vec::new();
    for handler in &typed {
        failures.extend(guarded(&topic, || handler(&envelope.payload)));
    }
    for handler in &wildcard {
        failures.extend(guarded(&topic, || handler(&envelope.raw)));
    }

    for failure in &failures {
        notify_error(registry, failure);
    }

    typed.len() + wildcard.len()
}

pub(crate) fn notify_connect(registry: &Mutex<Registry>) {
    let handlers = snapshot(&registry.lock().connect);
    notify_lifecycle(registry, "connect", &handlers);
}

pub(crate) fn notify_disconnect(registry: &Mutex<Registry>) {
    let handlers = snapshot(&registry.lock().disconnect);
    notify_lifecycle(registry, "disconnect", &handlers);
}

pub(crate) fn notify_error(registry: &Mutex<Registry>, error: &Error) {
    let handlers = snapshot(&registry.lock().error);
    for handler in &handlers {
        // Already logged; reporting it again could loop.
        let _ = guarded("error", || handler(error));
    }
}

fn notify_lifecycle(registry: &Mutex<Registry>, event: &str, handlers: &[LifecycleHandler]) {
    let failures: Vec<Error> = handlers
        .iter()
        .filter_map(|handler| guarded(event, || handler()))
        .collect();

    for failure in &failures {
        notify_error(registry, failure);
    }
}

/// Runs one handler, turning a panic into [`Error::Handler`].
fn guarded(topic: &str, call: impl FnOnce()) -> Option<Error> {
    let payload = panic::catch_unwind(AssertUnwindSafe(call)).err()?;
    let message = panic_message(payload.as_ref());
    error!(topic, panic = %message, "Handler panicked");
    Some(Error::handler(topic, message))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

// ============================================================================
// Subscription
// ============================================================================

/// Handle to one registered handler.
///
/// Dropping the handle leaves the handler registered; call
/// [`Subscription::unsubscribe`] or [`RealtimeClient::off`] to remove it.
///
/// [`RealtimeClient::off`]: crate::RealtimeClient::off
pub struct Subscription {
    id: SubscriptionId,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId, registry: &Arc<Mutex<Registry>>) -> Self {
        Self {
            id,
            registry: Arc::downgrade(registry),
        }
    }

    /// Token identifying the handler.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Removes the handler.
    ///
    /// Returns `false` if it was already removed or the client is gone.
    pub fn unsubscribe(self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.lock().remove(self.id))
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    type Log = Arc<Mutex<Vec<String>>>;

    fn recorder(log: &Log, label: &'static str) -> MessageHandler {
        let log = Arc::clone(log);
        Arc::new(move |value: &Value| log.lock().push(format!("{label}:{value}")))
    }

    fn decode(text: &str) -> InboundEnvelope {
        InboundEnvelope::decode(text).expect("valid envelope")
    }

    #[test]
    fn test_typed_then_wildcard() {
        let registry = Mutex::new(Registry::default());
        let log = Log::default();
        {
            let mut r = registry.lock();
            r.add_message(Topic::Wildcard, recorder(&log, "any"));
            r.add_message(Topic::Alert, recorder(&log, "alert"));
        }

        let delivered = dispatch(
            &registry,
            &decode(r#"{"type":"alert","payload":{"severity":"critical"}}"#),
        );

        assert_eq!(delivered, 2);
        let log = log.lock();
        assert_eq!(log[0], r#"alert:{"severity":"critical"}"#);
        assert!(log[1].starts_with("any:"));
        assert!(log[1].contains(r#""type":"alert""#));
    }

    #[test]
    fn test_other_topics_untouched() {
        let registry = Mutex::new(Registry::default());
        let log = Log::default();
        registry
            .lock()
            .add_message(Topic::Notification, recorder(&log, "notification"));

        dispatch(&registry, &decode(r#"{"type":"alert","payload":{}}"#));

        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_pong_reaches_nobody() {
        let registry = Mutex::new(Registry::default());
        let log = Log::default();
        {
            let mut r = registry.lock();
            r.add_message(Topic::Wildcard, recorder(&log, "any"));
            r.add_message(Topic::Pong, recorder(&log, "pong"));
        }

        assert_eq!(dispatch(&registry, &decode(r#"{"type":"pong"}"#)), 0);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_registration_order() {
        let registry = Mutex::new(Registry::default());
        let log = Log::default();
        {
            let mut r = registry.lock();
            r.add_message(Topic::Alert, recorder(&log, "first"));
            r.add_message(Topic::Alert, recorder(&log, "second"));
            r.add_message(Topic::Alert, recorder(&log, "third"));
        }

        dispatch(&registry, &decode(r#"{"type":"alert","payload":1}"#));

        assert_eq!(*log.lock(), vec!["first:1", "second:1", "third:1"]);
    }

    #[test]
    fn test_remove_keeps_siblings() {
        let registry = Mutex::new(Registry::default());
        let log = Log::default();
        let (first, _second) = {
            let mut r = registry.lock();
            (
                r.add_message(Topic::Alert, recorder(&log, "first")),
                r.add_message(Topic::Alert, recorder(&log, "second")),
            )
        };

        assert!(registry.lock().remove(first));
        assert!(!registry.lock().remove(first));

        dispatch(&registry, &decode(r#"{"type":"alert","payload":0}"#));
        assert_eq!(*log.lock(), vec!["second:0"]);
    }

    #[test]
    fn test_remove_last_handler_drops_topic() {
        let mut registry = Registry::default();
        let id = registry.add_message(Topic::vitals("p1"), Arc::new(|_: &Value| {}));

        assert!(registry.remove(id));
        assert!(registry.topics.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_handler_may_mutate_registry_during_dispatch() {
        let registry = Arc::new(Mutex::new(Registry::default()));
        let log = Log::default();

        let inner = Arc::clone(&registry);
        let inner_log = Arc::clone(&log);
        registry.lock().add_message(
            Topic::Alert,
            Arc::new(move |_: &Value| {
                inner.lock().add_message(Topic::Alert, recorder(&inner_log, "late"));
            }),
        );

        // The handler added during the first dispatch runs only on the next.
        dispatch(&registry, &decode(r#"{"type":"alert","payload":1}"#));
        assert!(log.lock().is_empty());

        dispatch(&registry, &decode(r#"{"type":"alert","payload":2}"#));
        assert_eq!(*log.lock(), vec!["late:2"]);
    }

    #[test]
    fn test_lifecycle_notifications() {
        let registry = Mutex::new(Registry::default());
        let log = Log::default();
        {
            let mut r = registry.lock();
            let l = Arc::clone(&log);
            r.add_connect(Arc::new(move || l.lock().push("connect".into())));
            let l = Arc::clone(&log);
            r.add_disconnect(Arc::new(move || l.lock().push("disconnect".into())));
            let l = Arc::clone(&log);
            r.add_error(Arc::new(move |e: &Error| l.lock().push(format!("error:{e}"))));
        }

        notify_connect(&registry);
        notify_error(&registry, &Error::ConnectionClosed);
        notify_disconnect(&registry);

        assert_eq!(
            *log.lock(),
            vec!["connect", "error:Connection closed", "disconnect"]
        );
    }

    #[test]
    fn test_panicking_handler_is_isolated() {
        let registry = Mutex::new(Registry::default());
        let log = Log::default();
        let errors = Log::default();
        {
            let mut r = registry.lock();
            r.add_message(Topic::Alert, Arc::new(|_: &Value| panic!("bad handler")));
            r.add_message(Topic::Alert, recorder(&log, "alert"));
            r.add_message(Topic::Wildcard, recorder(&log, "any"));
            let e = Arc::clone(&errors);
            r.add_error(Arc::new(move |err: &Error| e.lock().push(err.to_string())));
        }

        let delivered = dispatch(&registry, &decode(r#"{"type":"alert","payload":1}"#));

        assert_eq!(delivered, 3);
        assert_eq!(log.lock().len(), 2);
        assert_eq!(log.lock()[0], "alert:1");
        assert_eq!(
            *errors.lock(),
            vec!["Handler for 'alert' panicked: bad handler"]
        );
    }

    #[test]
    fn test_panicking_lifecycle_and_error_handlers() {
        let registry = Mutex::new(Registry::default());
        let errors = Log::default();
        {
            let mut r = registry.lock();
            r.add_connect(Arc::new(|| panic!("{}", String::from("connect failed"))));
            r.add_error(Arc::new(|_: &Error| panic!("observer failed")));
            let e = Arc::clone(&errors);
            r.add_error(Arc::new(move |err: &Error| e.lock().push(err.to_string())));
        }

        notify_connect(&registry);

        assert_eq!(
            *errors.lock(),
            vec!["Handler for 'connect' panicked: connect failed"]
        );
    }

    #[test]
    fn test_subscription_unsubscribe() {
        let registry = Arc::new(Mutex::new(Registry::default()));
        let id = registry.lock().add_message(Topic::Alert, Arc::new(|_: &Value| {}));
        let subscription = Subscription::new(id, &registry);

        assert_eq!(subscription.id(), id);
        assert!(subscription.unsubscribe());
        assert_eq!(registry.lock().len(), 0);
    }

    #[test]
    fn test_subscription_outlived_registry() {
        let registry = Arc::new(Mutex::new(Registry::default()));
        let id = registry.lock().add_connect(Arc::new(|| {}));
        let subscription = Subscription::new(id, &registry);
        drop(registry);

        assert!(!subscription.unsubscribe());
    }

    #[test]
    fn test_clear() {
        let mut registry = Registry::default();
        registry.add_message(Topic::Alert, Arc::new(|_: &Value| {}));
        registry.add_error(Arc::new(|_: &Error| {}));
        assert_eq!(registry.len(), 2);

        registry.clear();
        assert_eq!(registry.len(), 0);
    }
}
