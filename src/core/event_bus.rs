//! Pub/Sub event bus carrying timeline notifications to the UI layer.
//!
//! Architecture:
//! - Components subscribe to event types with callbacks (immediate invocation)
//! - emit() invokes callbacks immediately AND queues for deferred processing
//! - poll() returns queued events for batch processing in the host loop
//!
//! Callback order: FIFO within the same event type. Cross-type order is undefined.
//!
//! Callbacks run on the emitting thread. Provider loads emit from worker
//! threads, so subscribers must not assume they run on the timeline thread.

use log::warn;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

/// Maximum events in queue before oldest are evicted
const MAX_QUEUE_SIZE: usize = 1000;

/// Marker trait for events. Events must be Send + Sync + 'static.
pub trait Event: Any + Send + Sync + 'static {
    fn as_any(&self) -> &dyn Any;
    fn type_name(&self) -> &'static str;
}

impl<T: Any + Send + Sync + 'static> Event for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

type Callback = Arc<dyn Fn(&dyn Any) + Send + Sync>;

/// Boxed event for queue storage
pub type BoxedEvent = Box<dyn Event>;

/// Subscriber table and queue shared by the bus and all its emitters.
#[derive(Default)]
struct Channels {
    subscribers: RwLock<HashMap<TypeId, Vec<Callback>>>,
    queue: Mutex<Vec<BoxedEvent>>,
}

impl Channels {
    fn dispatch<E: Event + Clone>(&self, event: E) {
        // Clone the callback list so a subscriber may subscribe or emit re-entrantly.
        let callbacks: Vec<Callback> = self
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&TypeId::of::<E>())
            .cloned()
            .unwrap_or_default();
        for cb in &callbacks {
            cb(&event);
        }

        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        if queue.len() >= MAX_QUEUE_SIZE {
            let evict_count = queue.len() / 2;
            warn!(
                "Event queue full ({} events), evicting oldest {}",
                queue.len(),
                evict_count
            );
            queue.drain(0..evict_count);
        }
        queue.push(Box::new(event));
    }
}

/// Pub/Sub event bus with deferred processing support.
///
/// Callbacks fire immediately on emit, and the same events stay available for
/// batch processing via poll().
#[derive(Clone, Default)]
pub struct EventBus {
    channels: Arc<Channels>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to events of type E.
    ///
    /// # Example
    /// ```ignore
    /// bus.subscribe::<YearChangedEvent, _>(move |e| {
    ///     println!("year is now {}", e.year);
    /// });
    /// ```
    pub fn subscribe<E, F>(&self, callback: F)
    where
        E: Event,
        F: Fn(&E) + Send + Sync + 'static,
    {
        let wrapped: Callback = Arc::new(move |any: &dyn Any| {
            if let Some(event) = any.downcast_ref::<E>() {
                callback(event);
            }
        });
        self.channels
            .subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(TypeId::of::<E>())
            .or_default()
            .push(wrapped);
    }

    /// Emit event: invoke callbacks immediately AND queue for deferred processing.
    pub fn emit<E: Event + Clone>(&self, event: E) {
        self.channels.dispatch(event);
    }

    /// Drain all events emitted since the last poll.
    pub fn poll(&self) -> Vec<BoxedEvent> {
        std::mem::take(&mut *self.channels.queue.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Get an emitter handle for providers and other collaborators.
    pub fn emitter(&self) -> EventEmitter {
        EventEmitter {
            channels: Arc::clone(&self.channels),
        }
    }

    /// Clear subscribers for type E
    pub fn unsubscribe_all<E: Event>(&self) {
        self.channels
            .subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&TypeId::of::<E>());
    }

    pub fn has_subscribers<E: Event>(&self) -> bool {
        self.channels
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&TypeId::of::<E>())
            .map(|v| !v.is_empty())
            .unwrap_or(false)
    }

    pub fn queue_len(&self) -> usize {
        self.channels.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Lightweight emit-only handle. Cheap to clone into worker jobs.
#[derive(Clone)]
pub struct EventEmitter {
    channels: Arc<Channels>,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field(
                "subscriber_types",
                &self.channels.subscribers.read().map(|s| s.len()).unwrap_or(0),
            )
            .field("queue_len", &self.channels.queue.lock().map(|q| q.len()).unwrap_or(0))
            .finish()
    }
}

impl EventEmitter {
    pub fn emit<E: Event + Clone>(&self, event: E) {
        self.channels.dispatch(event);
    }
}

/// Optional emitter: a no-op until connected to a bus.
///
/// Lets providers and the controller be built standalone (tests, tools)
/// without an event system.
#[derive(Clone, Default, Debug)]
pub struct Notifier {
    inner: Option<EventEmitter>,
}

impl Notifier {
    pub fn silent() -> Self {
        Self { inner: None }
    }

    pub fn from_emitter(emitter: EventEmitter) -> Self {
        Self { inner: Some(emitter) }
    }

    pub fn emit<E: Event + Clone>(&self, event: E) {
        if let Some(ref emitter) = self.inner {
            emitter.emit(event);
        }
    }
}

impl From<&EventBus> for Notifier {
    fn from(bus: &EventBus) -> Self {
        Self::from_emitter(bus.emitter())
    }
}

/// Downcast a queued event to its concrete type.
///
/// Must deref to `dyn Event` before calling `as_any()`, otherwise the blanket
/// impl for `Box<dyn Event>` answers and the downcast always fails.
#[inline]
pub fn downcast_event<E: Event>(event: &BoxedEvent) -> Option<&E> {
    (**event).as_any().downcast_ref::<E>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::{TicksChangedEvent, YearChangedEvent};
    use std::sync::atomic::{AtomicI32, Ordering};

    fn year_event(year: i32) -> YearChangedEvent {
        YearChangedEvent { year, requested: year }
    }

    #[test]
    fn test_subscribe_emit_immediate() {
        let bus = EventBus::new();
        let last = Arc::new(AtomicI32::new(0));
        let l = Arc::clone(&last);

        bus.subscribe::<YearChangedEvent, _>(move |e| {
            l.store(e.year, Ordering::SeqCst);
        });

        bus.emit(year_event(1850));
        assert_eq!(last.load(Ordering::SeqCst), 1850);

        bus.emit(year_event(1860));
        assert_eq!(last.load(Ordering::SeqCst), 1860);
    }

    #[test]
    fn test_emit_queues_for_poll() {
        let bus = EventBus::new();

        bus.emit(year_event(1790));
        bus.emit(year_event(1800));
        bus.emit(TicksChangedEvent(Vec::new()));

        let events = bus.poll();
        assert_eq!(events.len(), 3);
        assert_eq!(bus.poll().len(), 0);
    }

    #[test]
    fn test_emitter_and_notifier_share_queue() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicI32::new(0));
        let c = Arc::clone(&counter);
        bus.subscribe::<YearChangedEvent, _>(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        bus.emitter().emit(year_event(1900));
        Notifier::from(&bus).emit(year_event(1910));
        Notifier::silent().emit(year_event(1920));

        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert_eq!(bus.queue_len(), 2);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicI32::new(0));
        let c = Arc::clone(&counter);
        bus.subscribe::<YearChangedEvent, _>(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert!(bus.has_subscribers::<YearChangedEvent>());

        bus.unsubscribe_all::<YearChangedEvent>();
        bus.emit(year_event(1800));

        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(bus.poll().len(), 1);
    }

    #[test]
    fn test_downcast() {
        let bus = EventBus::new();
        bus.emit(year_event(1830));

        let events = bus.poll();
        let e = downcast_event::<YearChangedEvent>(&events[0]).unwrap();
        assert_eq!(e.year, 1830);
        assert!(downcast_event::<TicksChangedEvent>(&events[0]).is_none());
    }
}
