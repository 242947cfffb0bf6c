use std::any::TypeId;
use std::sync::Arc;
use parking_lot::Mutex;
use ahash::AHashMap;

/// Pipeline event bus
pub struct EventBus {
    handlers: Arc<Mutex<AHashMap<TypeId, Vec<Box<dyn EventHandler>>>>>,
}

/// Event trait that all events must implement
pub trait Event: Send + Sync + 'static {
    fn as_any(&self) -> &dyn std::any::Any;
}

/// Handler trait for event handlers
pub trait EventHandler: Send + Sync {
    fn handle(&mut self, event: &dyn Event);
}

/// Events published when pipeline inputs change
pub mod events {
    use super::Event;

    /// A new feature collection replaced the previous one
    #[derive(Debug, Clone)]
    pub struct CollectionLoaded {
        pub feature_count: usize,
        pub field_count: usize,
        pub fingerprint: u64,
    }

    /// A new filter spec replaced the previous one
    #[derive(Debug, Clone)]
    pub struct FilterChanged {
        pub clause_count: usize,
        pub matched_count: usize,
    }

    /// The color field selection changed
    #[derive(Debug, Clone)]
    pub struct ColorFieldChanged {
        pub field: Option<String>,
    }

    /// A feature was replaced by an edited copy
    #[derive(Debug, Clone)]
    pub struct FeatureEdited {
        pub feature_id: String,
    }

    macro_rules! impl_event {
        ($($t:ty),*) => {
            $(
                impl Event for $t {
                    fn as_any(&self) -> &dyn std::any::Any {
                        self
                    }
                }
            )*
        }
    }

    impl_event!(
        CollectionLoaded,
        FilterChanged,
        ColorFieldChanged,
        FeatureEdited
    );
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Mutex::new(AHashMap::new())),
        }
    }

    /// Subscribe a handler to events of type `E`
    pub fn subscribe<E: Event>(&self, handler: Box<dyn EventHandler>) {
        self.handlers
            .lock()
            .entry(TypeId::of::<E>())
            .or_default()
            .push(handler);
    }

    /// Subscribe a closure that receives the concrete event
    pub fn on<E, F>(&self, mut f: F)
    where
        E: Event,
        F: FnMut(&E) + Send + Sync + 'static,
    {
        self.subscribe::<E>(handler_from_fn(move |event| {
            if let Some(event) = event.as_any().downcast_ref::<E>() {
                f(event);
            }
        }));
    }

    /// Number of handlers subscribed to `E`
    pub fn handler_count<E: Event>(&self) -> usize {
        self.handlers
            .lock()
            .get(&TypeId::of::<E>())
            .map_or(0, Vec::len)
    }

    /// Publish an event to every handler subscribed to its type.
    ///
    /// Handlers must not publish on the same bus; the handler table is
    /// locked while they run.
    pub fn publish<E: Event>(&self, event: E) {
        let mut handlers = self.handlers.lock();
        for handler in handlers.get_mut(&TypeId::of::<E>()).into_iter().flatten() {
            handler.handle(&event);
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Helper struct for creating event handlers from closures
pub struct ClosureEventHandler<F> {
    handler: F,
}

impl<F> EventHandler for ClosureEventHandler<F>
where
    F: FnMut(&dyn Event) + Send + Sync,
{
    fn handle(&mut self, event: &dyn Event) {
        (self.handler)(event);
    }
}

/// Create an event handler from a closure
pub fn handler_from_fn<F>(f: F) -> Box<dyn EventHandler>
where
    F: FnMut(&dyn Event) + Send + Sync + 'static,
{
    Box::new(ClosureEventHandler { handler: f })
}

#[cfg(test)]
mod tests {
    use super::events::{CollectionLoaded, FeatureEdited};
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_publish_reaches_matching_subscribers_only() {
        let bus = EventBus::new();
        let loaded = Arc::new(AtomicUsize::new(0));

        let counter = loaded.clone();
        bus.subscribe::<CollectionLoaded>(handler_from_fn(move |event| {
            if let Some(e) = event.as_any().downcast_ref::<CollectionLoaded>() {
                counter.fetch_add(e.feature_count, Ordering::SeqCst);
            }
        }));

        bus.publish(CollectionLoaded {
            feature_count: 3,
            field_count: 2,
            fingerprint: 0,
        });
        bus.publish(FeatureEdited {
            feature_id: "a".to_string(),
        });

        assert_eq!(loaded.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_typed_subscription() {
        let bus = EventBus::new();
        let edited = Arc::new(Mutex::new(Vec::new()));

        let sink = edited.clone();
        bus.on::<FeatureEdited, _>(move |event| sink.lock().push(event.feature_id.clone()));
        assert_eq!(bus.handler_count::<FeatureEdited>(), 1);
        assert_eq!(bus.handler_count::<CollectionLoaded>(), 0);

        bus.publish(FeatureEdited {
            feature_id: "a".to_string(),
        });
        assert_eq!(*edited.lock(), vec!["a".to_string()]);
    }
}
