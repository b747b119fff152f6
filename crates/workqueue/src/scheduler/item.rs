use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::warn;
use uuid::Uuid;

use super::types::{Priority, PRIORITY_LOWEST};

/// Work function. Receives the item being executed and the index of the
/// executing thread (0 = the thread that called `complete` or `begin_frame`).
pub type EntryPoint = Arc<dyn Fn(&WorkItem, usize) + Send + Sync>;

/// Opaque payload slot interpreted by the entry point.
pub type ContextSlot = Option<Arc<dyn Any + Send + Sync>>;

/// Payload handed to the entry point alongside the item.
///
/// The three slots follow the usual start/end/aux split: a range to work on
/// plus one auxiliary value. The scheduler never looks inside.
#[derive(Clone, Default)]
pub struct WorkContext {
    pub start: ContextSlot,
    pub end: ContextSlot,
    pub aux: ContextSlot,
}

impl WorkContext {
    /// Downcast the `start` slot.
    pub fn start_as<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        downcast(&self.start)
    }

    /// Downcast the `end` slot.
    pub fn end_as<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        downcast(&self.end)
    }

    /// Downcast the `aux` slot.
    pub fn aux_as<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        downcast(&self.aux)
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none() && self.aux.is_none()
    }
}

fn downcast<T: Any + Send + Sync>(slot: &ContextSlot) -> Option<Arc<T>> {
    slot.as_ref().and_then(|v| Arc::clone(v).downcast::<T>().ok())
}

impl fmt::Debug for WorkContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkContext")
            .field("start", &self.start.is_some())
            .field("end", &self.end.is_some())
            .field("aux", &self.aux.is_some())
            .finish()
    }
}

#[derive(Default)]
struct Payload {
    entry_point: Option<EntryPoint>,
    context: WorkContext,
}

/// One schedulable unit of work.
///
/// Items are shared as `Arc<WorkItem>` between the submitter and the
/// [`WorkQueue`](crate::WorkQueue). The submitter fills in the payload before
/// calling `add_work_item` and must not touch it again until the item is
/// observed completed.
pub struct WorkItem {
    id: Uuid,
    pooled: bool,
    priority: AtomicU32,
    completed: AtomicBool,
    send_event: AtomicBool,
    payload: Mutex<Payload>,
}

impl WorkItem {
    /// Create a caller-owned item. The scheduler drops its reference after
    /// purging instead of recycling it.
    pub fn new() -> Self {
        Self::with_pooling(false)
    }

    /// Convenience constructor for the common "closure + priority" case.
    pub fn with_entry_point<F>(priority: Priority, f: F) -> Arc<Self>
    where
        F: Fn(&WorkItem, usize) + Send + Sync + 'static,
    {
        let item = Self::new();
        item.set_priority(priority);
        item.set_entry_point(f);
        Arc::new(item)
    }

    pub(crate) fn with_pooling(pooled: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            pooled,
            priority: AtomicU32::new(PRIORITY_LOWEST),
            completed: AtomicBool::new(false),
            send_event: AtomicBool::new(false),
            payload: Mutex::new(Payload::default()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Whether the scheduler may recycle this instance after completion.
    pub fn is_pooled(&self) -> bool {
        self.pooled
    }

    pub fn priority(&self) -> Priority {
        self.priority.load(Ordering::Acquire)
    }

    pub fn set_priority(&self, priority: Priority) {
        self.priority.store(priority, Ordering::Release);
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Whether purging this item notifies the completion listener.
    pub fn sends_event(&self) -> bool {
        self.send_event.load(Ordering::Acquire)
    }

    pub fn set_send_event(&self, send: bool) {
        self.send_event.store(send, Ordering::Release);
    }

    pub fn set_entry_point<F>(&self, f: F)
    where
        F: Fn(&WorkItem, usize) + Send + Sync + 'static,
    {
        self.payload().entry_point = Some(Arc::new(f));
    }

    pub fn has_entry_point(&self) -> bool {
        self.payload().entry_point.is_some()
    }

    pub fn set_context(&self, context: WorkContext) {
        self.payload().context = context;
    }

    /// Snapshot of the context slots (cheap `Arc` clones).
    pub fn context(&self) -> WorkContext {
        self.payload().context.clone()
    }

    /// Run the entry point on the current thread, then flag completion.
    #[cfg(test)]
    pub(crate) fn execute(&self, thread_index: usize) {
        self.run(thread_index);
        self.mark_completed();
    }

    /// Run the entry point without flagging completion.
    ///
    /// The payload lock is released before the entry point runs so the
    /// entry point can read its own context.
    pub(crate) fn run(&self, thread_index: usize) {
        let entry_point = self.payload().entry_point.clone();
        match entry_point {
            Some(f) => f(self, thread_index),
            None => warn!(item = %self.id, "work item executed without an entry point"),
        }
    }

    pub(crate) fn mark_completed(&self) {
        self.completed.store(true, Ordering::Release);
    }

    pub(crate) fn clear_completed(&self) {
        self.completed.store(false, Ordering::Release);
    }

    /// Restore every field to its default before the item re-enters the pool.
    pub(crate) fn reset(&self) {
        {
            let mut payload = self.payload();
            payload.entry_point = None;
            payload.context = WorkContext::default();
        }
        self.priority.store(PRIORITY_LOWEST, Ordering::Release);
        self.send_event.store(false, Ordering::Release);
        self.completed.store(false, Ordering::Release);
    }

    fn payload(&self) -> MutexGuard<'_, Payload> {
        self.payload.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for WorkItem {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem")
            .field("id", &self.id)
            .field("priority", &self.priority())
            .field("pooled", &self.pooled)
            .field("completed", &self.is_completed())
            .field("send_event", &self.sends_event())
            .finish()
    }
}
