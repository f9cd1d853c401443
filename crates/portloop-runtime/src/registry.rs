//! Handle registry
//!
//! Maps each open handle to its `HandleInfo`. Locking is two-level:
//!
//! - the map itself sits behind an `RwLock`, written only on attach/detach;
//! - each `HandleInfo` has a listener-slot `Mutex` that serializes every
//!   registration change for that handle, plus a small `RwLock` around the
//!   looper reference so producers can find the looper without waiting on a
//!   registration that is blocked in a native call.
//!
//! A slot lock may be held while taking the map lock, never the reverse:
//! reverse lookups snapshot the map before inspecting any slots, and the
//! producer path takes only the map and looper locks.
//!
//! The registry is also the default [`CompletionSink`]: native pushes are
//! routed by handle to the looper, and dropped when there is none.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use portloop_core::{
    log_debug, log_trace, CompletionSink, DataListener, EventListener, Handle, PortError,
    PortResult,
};

use crate::config::LooperConfig;
use crate::looper::Looper;

/// Listener slots for one handle. At most one listener per kind.
#[derive(Default)]
pub struct ListenerSlots {
    pub(crate) data: Option<Arc<dyn DataListener>>,
    pub(crate) event: Option<Arc<dyn EventListener>>,
}

impl ListenerSlots {
    pub fn has_any(&self) -> bool {
        self.data.is_some() || self.event.is_some()
    }

    pub(crate) fn data_is(&self, listener: &Arc<dyn DataListener>) -> bool {
        self.data.as_ref().is_some_and(|l| Arc::ptr_eq(l, listener))
    }

    pub(crate) fn event_is(&self, listener: &Arc<dyn EventListener>) -> bool {
        self.event.as_ref().is_some_and(|l| Arc::ptr_eq(l, listener))
    }
}

/// Per-handle record.
///
/// Invariant (checked by [`HandleInfo::is_consistent`]): a looper is present
/// exactly when at least one listener slot is filled.
pub struct HandleInfo {
    handle: Handle,
    port_name: String,
    slots: Mutex<ListenerSlots>,
    looper: RwLock<Option<Arc<Looper>>>,
}

impl HandleInfo {
    fn new(handle: Handle, port_name: String) -> Self {
        Self {
            handle,
            port_name,
            slots: Mutex::new(ListenerSlots::default()),
            looper: RwLock::new(None),
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Lock the listener slots. Held for the whole of a registration change.
    pub(crate) fn lock_slots(&self) -> MutexGuard<'_, ListenerSlots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn looper_read(&self) -> RwLockReadGuard<'_, Option<Arc<Looper>>> {
        self.looper.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn looper_write(&self) -> RwLockWriteGuard<'_, Option<Arc<Looper>>> {
        self.looper.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn looper(&self) -> Option<Arc<Looper>> {
        self.looper_read().clone()
    }

    /// Caller must hold the slot lock.
    pub(crate) fn looper_or_create(&self, config: &LooperConfig) -> Arc<Looper> {
        let mut slot = self.looper_write();
        match &*slot {
            Some(looper) => Arc::clone(looper),
            None => {
                let looper = Arc::new(Looper::new(self.handle, config.clone()));
                *slot = Some(Arc::clone(&looper));
                looper
            }
        }
    }

    /// Drop the looper if no listener needs it any more. Caller must hold the
    /// slot lock and pass the guarded slots in.
    pub(crate) fn release_looper_if_unused(&self, slots: &ListenerSlots) {
        if slots.has_any() {
            return;
        }
        let looper = self.looper_write().take();
        if let Some(looper) = looper {
            looper.stop_all();
            log_debug!("handle {}: last listener gone, looper released", self.handle);
        }
    }

    pub fn has_data_listener(&self) -> bool {
        self.lock_slots().data.is_some()
    }

    pub fn has_event_listener(&self) -> bool {
        self.lock_slots().event.is_some()
    }

    /// Looper present iff a listener is registered.
    pub fn is_consistent(&self) -> bool {
        let slots = self.lock_slots();
        slots.has_any() == self.looper_read().is_some()
    }
}

impl std::fmt::Debug for HandleInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = self.lock_slots();
        f.debug_struct("HandleInfo")
            .field("handle", &self.handle)
            .field("port_name", &self.port_name)
            .field("data_listener", &slots.data.is_some())
            .field("event_listener", &slots.event.is_some())
            .field("looper", &self.looper_read().is_some())
            .finish()
    }
}

/// Handle → HandleInfo map, shared by the manager, dispatcher and native layer.
#[derive(Default)]
pub struct HandleRegistry {
    entries: RwLock<HashMap<Handle, Arc<HandleInfo>>>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<Handle, Arc<HandleInfo>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Handle, Arc<HandleInfo>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create the record for a freshly opened handle.
    pub fn insert(&self, handle: Handle, port_name: impl Into<String>) -> PortResult<Arc<HandleInfo>> {
        let mut entries = self.write();
        if entries.contains_key(&handle) {
            return Err(PortError::HandleAlreadyAttached(handle));
        }
        let info = Arc::new(HandleInfo::new(handle, port_name.into()));
        entries.insert(handle, Arc::clone(&info));
        Ok(info)
    }

    /// Remove the record of a handle about to be closed.
    ///
    /// Refused while any listener is still registered on it.
    pub fn remove(&self, handle: Handle) -> PortResult<Arc<HandleInfo>> {
        let info = self.lookup(handle)?;
        let slots = info.lock_slots();
        if slots.has_any() {
            return Err(PortError::ListenersStillRegistered(handle));
        }
        let mut entries = self.write();
        match entries.get(&handle) {
            Some(current) if Arc::ptr_eq(current, &info) => {}
            _ => return Err(PortError::HandleNotFound(handle)),
        }
        drop(slots);
        entries.remove(&handle).ok_or(PortError::HandleNotFound(handle))
    }

    pub fn lookup(&self, handle: Handle) -> PortResult<Arc<HandleInfo>> {
        self.read()
            .get(&handle)
            .cloned()
            .ok_or(PortError::HandleNotFound(handle))
    }

    fn snapshot(&self) -> Vec<Arc<HandleInfo>> {
        self.read().values().cloned().collect()
    }

    /// Find the handle whose event slot holds `listener`.
    pub fn find_event_listener(&self, listener: &Arc<dyn EventListener>) -> PortResult<Handle> {
        self.snapshot()
            .into_iter()
            .find(|info| info.lock_slots().event_is(listener))
            .map(|info| info.handle)
            .ok_or(PortError::ListenerNotRegistered)
    }

    /// Find the handle whose data slot holds `listener`.
    pub fn find_data_listener(&self, listener: &Arc<dyn DataListener>) -> PortResult<Handle> {
        self.snapshot()
            .into_iter()
            .find(|info| info.lock_slots().data_is(listener))
            .map(|info| info.handle)
            .ok_or(PortError::ListenerNotRegistered)
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.read().contains_key(&handle)
    }

    pub fn handles(&self) -> Vec<Handle> {
        let mut handles: Vec<Handle> = self.read().keys().copied().collect();
        handles.sort();
        handles
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Looper for `handle`, if it exists. Used on the producer path.
    fn looper_for(&self, handle: Handle) -> Option<Arc<Looper>> {
        self.read().get(&handle).and_then(|info| info.looper())
    }
}

impl CompletionSink for HandleRegistry {
    fn push_data(&self, handle: Handle, data: Vec<u8>) {
        match self.looper_for(handle) {
            Some(looper) => looper.push_data(data),
            None => log_trace!("push_data: handle {} has no looper, dropped", handle),
        }
    }

    fn push_data_error(&self, handle: Handle, code: i32) {
        match self.looper_for(handle) {
            Some(looper) => looper.push_data_error(code),
            None => log_trace!("push_data_error: handle {} has no looper, dropped", handle),
        }
    }

    fn push_line_event(&self, handle: Handle, raw: u32) {
        match self.looper_for(handle) {
            Some(looper) => looper.push_line_event(raw),
            None => log_trace!("push_line_event: handle {} has no looper, dropped", handle),
        }
    }
}

impl std::fmt::Debug for HandleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleRegistry")
            .field("handles", &self.handles())
            .finish()
    }
}
