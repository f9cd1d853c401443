//! Completion dispatcher
//!
//! Turns listener registration calls into looper lane changes plus native
//! worker commands, and keeps both sides consistent.
//!
//! Every operation runs with the handle's listener-slot lock held, so calls
//! for one handle are serialized end to end, native call included. Producers
//! never take that lock.
//!
//! Setup order is local first, native last. When the native call fails the
//! local half is undone before the error is returned:
//!
//! ```text
//!   set_up_*:   looper get-or-create → start lanes → store listener → native start
//!                                                                     │ fail
//!               release looper ← clear listener ← stop lanes ◄────────┘
//! ```
//!
//! Teardown is native first; local state only changes once the native worker
//! has actually stopped.

use std::sync::Arc;

use portloop_core::{
    log_debug, log_warn, DataListener, EventListener, Handle, LineMask, ListenerKind, NativeIo,
    NativeOp, PortError, PortResult,
};

use crate::config::LooperConfig;
use crate::looper::Looper;
use crate::registry::{HandleInfo, HandleRegistry, ListenerSlots};

pub struct CompletionDispatcher<N: NativeIo> {
    registry: Arc<HandleRegistry>,
    native: Arc<N>,
    config: LooperConfig,
}

impl<N: NativeIo> CompletionDispatcher<N> {
    /// `config` is expected to have passed `LooperConfig::validate`, which
    /// `PortManager::build` enforces.
    pub(crate) fn new(registry: Arc<HandleRegistry>, native: Arc<N>, config: LooperConfig) -> Self {
        Self { registry, native, config }
    }

    pub fn registry(&self) -> &Arc<HandleRegistry> {
        &self.registry
    }

    pub fn native(&self) -> &Arc<N> {
        &self.native
    }

    pub fn config(&self) -> &LooperConfig {
        &self.config
    }

    // ── Data listener ────────────────────────────────────────────────

    pub fn set_up_data_listener(
        &self,
        handle: Handle,
        listener: Arc<dyn DataListener>,
    ) -> PortResult<()> {
        let info = self.registry.lookup(handle)?;
        let mut slots = info.lock_slots();
        if slots.data.is_some() {
            return Err(PortError::ListenerAlreadyRegistered { handle, kind: ListenerKind::Data });
        }

        let looper = info.looper_or_create(&self.config);
        if let Err(e) = looper.start_data(Arc::clone(&listener)) {
            info.release_looper_if_unused(&slots);
            return Err(e);
        }
        slots.data = Some(listener);

        if let Err(e) = self.native.start_data_worker(handle) {
            log_warn!("handle {}: native start_data_worker failed: {}, rolling back", handle, e);
            looper.stop_data();
            slots.data = None;
            info.release_looper_if_unused(&slots);
            return Err(PortError::native(NativeOp::StartDataWorker, e));
        }

        log_debug!("handle {}: data listener registered", handle);
        Ok(())
    }

    pub fn destroy_data_listener(
        &self,
        handle: Handle,
        listener: &Arc<dyn DataListener>,
    ) -> PortResult<()> {
        let info = self.registry.lookup(handle)?;
        let mut slots = info.lock_slots();
        if !slots.data_is(listener) {
            return Err(PortError::ListenerNotRegistered);
        }

        self.native.stop_data_worker(handle).map_err(|e| {
            log_warn!("handle {}: native stop_data_worker failed: {}", handle, e);
            PortError::native(NativeOp::StopDataWorker, e)
        })?;

        if let Some(looper) = info.looper() {
            looper.stop_data();
        }
        slots.data = None;
        info.release_looper_if_unused(&slots);
        log_debug!("handle {}: data listener removed", handle);
        Ok(())
    }

    // ── Event listener ───────────────────────────────────────────────

    pub fn set_up_event_listener(
        &self,
        handle: Handle,
        listener: Arc<dyn EventListener>,
    ) -> PortResult<()> {
        let info = self.registry.lookup(handle)?;
        let mut slots = info.lock_slots();
        if slots.event.is_some() {
            return Err(PortError::ListenerAlreadyRegistered { handle, kind: ListenerKind::Event });
        }

        // Nothing has been touched yet, so a failure here needs no rollback.
        let status = self.native.get_line_status(handle).map_err(|e| {
            log_warn!("handle {}: native get_line_status failed: {}", handle, e);
            PortError::native(NativeOp::GetLineStatus, e)
        })?;

        let looper = info.looper_or_create(&self.config);
        looper.seed_line_state(status.mask());
        if let Err(e) = looper.start_events(Arc::clone(&listener)) {
            info.release_looper_if_unused(&slots);
            return Err(e);
        }
        slots.event = Some(listener);

        if let Err(e) = self.native.start_event_worker(handle) {
            log_warn!("handle {}: native start_event_worker failed: {}, rolling back", handle, e);
            looper.stop_events();
            slots.event = None;
            info.release_looper_if_unused(&slots);
            return Err(PortError::native(NativeOp::StartEventWorker, e));
        }

        log_debug!("handle {}: event listener registered (lines {})", handle, status.mask());
        Ok(())
    }

    pub fn destroy_event_listener(
        &self,
        handle: Handle,
        listener: &Arc<dyn EventListener>,
    ) -> PortResult<()> {
        let info = self.registry.lookup(handle)?;
        let mut slots = info.lock_slots();
        if !slots.event_is(listener) {
            return Err(PortError::ListenerNotRegistered);
        }

        self.native.stop_event_worker(handle).map_err(|e| {
            log_warn!("handle {}: native stop_event_worker failed: {}", handle, e);
            PortError::native(NativeOp::StopEventWorker, e)
        })?;

        if let Some(looper) = info.looper() {
            looper.stop_events();
            // A data hold placed through this listener ends with it; nothing
            // else could lift it once the listener is gone.
            if looper.is_paused() {
                looper.resume();
            }
        }
        slots.event = None;
        info.release_looper_if_unused(&slots);
        log_debug!("handle {}: event listener removed", handle);
        Ok(())
    }

    // ── Pause / resume ───────────────────────────────────────────────

    /// Stop the native side producing line events, then hold the looper's
    /// data delivery.
    pub fn pause_events(&self, listener: &Arc<dyn EventListener>) -> PortResult<()> {
        self.with_event_listener(listener, |handle, looper| {
            self.native.pause_events(handle).map_err(|e| {
                log_warn!("handle {}: native pause_events failed: {}", handle, e);
                PortError::native(NativeOp::PauseEvents, e)
            })?;
            looper.pause();
            Ok(())
        })
    }

    /// Resume the looper, then the native side. If the native call fails the
    /// looper is paused again.
    pub fn resume_events(&self, listener: &Arc<dyn EventListener>) -> PortResult<()> {
        self.with_event_listener(listener, |handle, looper| {
            looper.resume();
            if let Err(e) = self.native.resume_events(handle) {
                log_warn!("handle {}: native resume_events failed: {}, re-pausing", handle, e);
                looper.pause();
                return Err(PortError::native(NativeOp::ResumeEvents, e));
            }
            Ok(())
        })
    }

    // ── Event mask ───────────────────────────────────────────────────

    pub fn set_event_mask(&self, listener: &Arc<dyn EventListener>, mask: LineMask) -> PortResult<()> {
        self.with_event_listener(listener, |handle, looper| {
            looper.set_line_mask(mask);
            log_debug!("handle {}: event mask set to {}", handle, mask);
            Ok(())
        })
    }

    pub fn event_mask(&self, listener: &Arc<dyn EventListener>) -> PortResult<LineMask> {
        self.with_event_listener(listener, |_, looper| Ok(looper.line_mask()))
    }

    /// Reverse-look-up `listener` and run `f` with its handle's slots locked.
    ///
    /// The slot is re-checked under the lock; a listener removed between the
    /// scan and the lock reports `ListenerNotRegistered`.
    fn with_event_listener<T>(
        &self,
        listener: &Arc<dyn EventListener>,
        f: impl FnOnce(Handle, &Looper) -> PortResult<T>,
    ) -> PortResult<T> {
        let handle = self.registry.find_event_listener(listener)?;
        let info = self.registry.lookup(handle).map_err(|_| PortError::ListenerNotRegistered)?;
        let slots = info.lock_slots();
        let looper = registered_looper(&info, &slots, listener)?;
        f(handle, &looper)
    }
}

fn registered_looper(
    info: &HandleInfo,
    slots: &ListenerSlots,
    listener: &Arc<dyn EventListener>,
) -> PortResult<Arc<Looper>> {
    if !slots.event_is(listener) {
        return Err(PortError::ListenerNotRegistered);
    }
    info.looper().ok_or(PortError::ListenerNotRegistered)
}

impl<N: NativeIo> std::fmt::Debug for CompletionDispatcher<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionDispatcher")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lane::LaneState;
    use portloop_core::{CompletionSink, LineEvent};
    use portloop_sim::SimNative;
    use std::sync::Mutex;
    use std::thread;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct Recorder {
        data: Mutex<Vec<Vec<u8>>>,
        errors: Mutex<Vec<i32>>,
        events: Mutex<Vec<LineEvent>>,
    }

    impl DataListener for Recorder {
        fn on_data(&self, data: &[u8]) {
            self.data.lock().unwrap().push(data.to_vec());
        }
        fn on_data_error(&self, code: i32) {
            self.errors.lock().unwrap().push(code);
        }
    }

    impl EventListener for Recorder {
        fn on_event(&self, event: LineEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    struct Fixture {
        registry: Arc<HandleRegistry>,
        sim: Arc<SimNative>,
        dispatcher: CompletionDispatcher<SimNative>,
    }

    const H: Handle = Handle::new(5);

    fn fixture(config: LooperConfig, lines: LineMask) -> Fixture {
        let registry = Arc::new(HandleRegistry::new());
        let sink: Arc<dyn CompletionSink> = registry.clone();
        let sim = Arc::new(SimNative::new(sink));
        sim.open(H, lines);
        registry.insert(H, "sim0").unwrap();
        let dispatcher = CompletionDispatcher::new(registry.clone(), sim.clone(), config);
        Fixture { registry, sim, dispatcher }
    }

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        cond()
    }

    fn has_looper(f: &Fixture) -> bool {
        f.registry.lookup(H).unwrap().looper().is_some()
    }

    #[test]
    fn test_unknown_handle() {
        let f = fixture(LooperConfig::default(), LineMask::NONE);
        let rec = Arc::new(Recorder::default());
        let err = f
            .dispatcher
            .set_up_data_listener(Handle::new(999), rec)
            .unwrap_err();
        assert_eq!(err, PortError::HandleNotFound(Handle::new(999)));
        assert!(f.sim.calls().is_empty());
    }

    #[test]
    fn test_data_round_trip() {
        let f = fixture(LooperConfig::default(), LineMask::NONE);
        let rec = Arc::new(Recorder::default());
        let listener: Arc<dyn DataListener> = rec.clone();

        f.dispatcher.set_up_data_listener(H, listener.clone()).unwrap();
        assert!(has_looper(&f));
        assert!(f.sim.inject_data(H, b"abc"));
        assert!(f.sim.inject_read_error(H, 5));
        assert!(wait_for(|| rec.data.lock().unwrap().len() == 1));
        assert!(wait_for(|| rec.errors.lock().unwrap().len() == 1));
        assert_eq!(rec.data.lock().unwrap()[0], b"abc".to_vec());

        f.dispatcher.destroy_data_listener(H, &listener).unwrap();
        assert!(!has_looper(&f));
        assert!(!f.sim.port(H).unwrap().data_active);
        assert!(f.registry.lookup(H).unwrap().is_consistent());
    }

    #[test]
    fn test_native_start_failure_rolls_back() {
        let f = fixture(LooperConfig::default(), LineMask::NONE);
        f.sim.fail_on(NativeOp::StartDataWorker, 16);
        let rec: Arc<dyn DataListener> = Arc::new(Recorder::default());

        let err = f.dispatcher.set_up_data_listener(H, rec.clone()).unwrap_err();
        assert!(matches!(err, PortError::NativeIo { op: NativeOp::StartDataWorker, .. }));
        let info = f.registry.lookup(H).unwrap();
        assert!(!info.has_data_listener());
        assert!(info.looper().is_none());

        // Retry succeeds once the native side recovers.
        f.sim.clear_fail(NativeOp::StartDataWorker);
        f.dispatcher.set_up_data_listener(H, rec).unwrap();
        assert!(info.has_data_listener());
    }

    #[test]
    fn test_start_failure_keeps_looper_for_other_listener() {
        let f = fixture(LooperConfig::default(), LineMask::NONE);
        let ev: Arc<dyn EventListener> = Arc::new(Recorder::default());
        f.dispatcher.set_up_event_listener(H, ev).unwrap();
        let looper = f.registry.lookup(H).unwrap().looper().unwrap();

        f.sim.fail_on(NativeOp::StartDataWorker, 1);
        let data: Arc<dyn DataListener> = Arc::new(Recorder::default());
        assert!(f.dispatcher.set_up_data_listener(H, data).is_err());

        let after = f.registry.lookup(H).unwrap().looper().unwrap();
        assert!(Arc::ptr_eq(&looper, &after));
        assert_eq!(after.data_state(), LaneState::Stopped);
        assert_eq!(after.event_state(), LaneState::Running);
    }

    #[test]
    fn test_line_status_failure_has_no_side_effects() {
        let f = fixture(LooperConfig::default(), LineMask::NONE);
        f.sim.fail_on(NativeOp::GetLineStatus, 5);
        let ev: Arc<dyn EventListener> = Arc::new(Recorder::default());

        let err = f.dispatcher.set_up_event_listener(H, ev).unwrap_err();
        assert!(matches!(err, PortError::NativeIo { op: NativeOp::GetLineStatus, .. }));
        assert!(!has_looper(&f));
        assert_eq!(f.sim.call_ops(), vec![NativeOp::GetLineStatus]);
    }

    #[test]
    fn test_cts_dsr_scenario() {
        let f = fixture(
            LooperConfig::new().line_mask(LineMask::CTS | LineMask::DSR),
            LineMask::CTS,
        );
        let rec = Arc::new(Recorder::default());
        f.dispatcher.set_up_event_listener(H, rec.clone()).unwrap();

        assert!(f.sim.set_lines(H, LineMask::DSR));
        assert!(wait_for(|| rec.events.lock().unwrap().len() == 1));
        assert_eq!(
            rec.events.lock().unwrap()[0],
            LineEvent::new(LineMask::CTS, LineMask::DSR)
        );
    }

    #[test]
    fn test_duplicate_and_wrong_listener() {
        let f = fixture(LooperConfig::default(), LineMask::NONE);
        let a: Arc<dyn EventListener> = Arc::new(Recorder::default());
        let b: Arc<dyn EventListener> = Arc::new(Recorder::default());

        f.dispatcher.set_up_event_listener(H, a.clone()).unwrap();
        assert_eq!(
            f.dispatcher.set_up_event_listener(H, b.clone()).unwrap_err(),
            PortError::ListenerAlreadyRegistered { handle: H, kind: ListenerKind::Event }
        );
        assert_eq!(
            f.dispatcher.destroy_event_listener(H, &b).unwrap_err(),
            PortError::ListenerNotRegistered
        );
        assert_eq!(f.dispatcher.pause_events(&b).unwrap_err(), PortError::ListenerNotRegistered);

        f.dispatcher.destroy_event_listener(H, &a).unwrap();
        assert!(!has_looper(&f));
        assert_eq!(f.dispatcher.event_mask(&a).unwrap_err(), PortError::ListenerNotRegistered);
    }

    #[test]
    fn test_pause_calls_native_first() {
        let f = fixture(LooperConfig::default(), LineMask::NONE);
        let rec = Arc::new(Recorder::default());
        let ev: Arc<dyn EventListener> = rec.clone();
        let data: Arc<dyn DataListener> = rec.clone();
        f.dispatcher.set_up_event_listener(H, ev.clone()).unwrap();
        f.dispatcher.set_up_data_listener(H, data).unwrap();
        let looper = f.registry.lookup(H).unwrap().looper().unwrap();

        // Native refusal leaves the local side untouched.
        f.sim.fail_on(NativeOp::PauseEvents, 1);
        assert!(f.dispatcher.pause_events(&ev).is_err());
        assert!(!looper.is_paused());

        f.sim.clear_fail(NativeOp::PauseEvents);
        f.sim.clear_calls();
        f.dispatcher.pause_events(&ev).unwrap();
        assert!(looper.is_paused());
        assert!(f.sim.port(H).unwrap().events_paused);
        assert_eq!(f.sim.call_ops(), vec![NativeOp::PauseEvents]);

        // Line changes are not produced while paused.
        assert!(!f.sim.set_lines(H, LineMask::RI));
    }

    #[test]
    fn test_resume_rolls_back_on_native_failure() {
        let f = fixture(LooperConfig::default(), LineMask::NONE);
        let rec = Arc::new(Recorder::default());
        let ev: Arc<dyn EventListener> = rec.clone();
        let data: Arc<dyn DataListener> = rec.clone();
        f.dispatcher.set_up_event_listener(H, ev.clone()).unwrap();
        f.dispatcher.set_up_data_listener(H, data).unwrap();
        f.dispatcher.pause_events(&ev).unwrap();
        let looper = f.registry.lookup(H).unwrap().looper().unwrap();

        f.sim.inject_data(H, b"held");
        thread::sleep(Duration::from_millis(30));
        assert!(rec.data.lock().unwrap().is_empty());

        f.sim.fail_on(NativeOp::ResumeEvents, 3);
        let err = f.dispatcher.resume_events(&ev).unwrap_err();
        assert!(matches!(err, PortError::NativeIo { op: NativeOp::ResumeEvents, .. }));
        assert!(looper.is_paused());

        f.sim.clear_fail(NativeOp::ResumeEvents);
        f.dispatcher.resume_events(&ev).unwrap();
        assert!(!looper.is_paused());
        assert!(wait_for(|| rec.data.lock().unwrap().len() == 1));
    }

    #[test]
    fn test_event_mask_api() {
        let f = fixture(LooperConfig::default(), LineMask::NONE);
        let rec = Arc::new(Recorder::default());
        let ev: Arc<dyn EventListener> = rec.clone();
        f.dispatcher.set_up_event_listener(H, ev.clone()).unwrap();
        assert_eq!(f.dispatcher.event_mask(&ev).unwrap(), LineMask::ALL);

        f.dispatcher.set_event_mask(&ev, LineMask::DCD).unwrap();
        assert_eq!(f.dispatcher.event_mask(&ev).unwrap(), LineMask::DCD);

        f.sim.set_lines(H, LineMask::DCD | LineMask::CTS);
        assert!(wait_for(|| rec.events.lock().unwrap().len() == 1));
        assert_eq!(rec.events.lock().unwrap()[0].current(), LineMask::DCD);
    }

    #[test]
    fn test_stop_failure_keeps_registration() {
        let f = fixture(LooperConfig::default(), LineMask::NONE);
        let data: Arc<dyn DataListener> = Arc::new(Recorder::default());
        f.dispatcher.set_up_data_listener(H, data.clone()).unwrap();

        f.sim.fail_on(NativeOp::StopDataWorker, 9);
        assert!(f.dispatcher.destroy_data_listener(H, &data).is_err());
        let info = f.registry.lookup(H).unwrap();
        assert!(info.has_data_listener());
        assert_eq!(info.looper().unwrap().data_state(), LaneState::Running);
    }

    #[test]
    fn test_removing_event_listener_lifts_data_hold() {
        let f = fixture(LooperConfig::default(), LineMask::NONE);
        let rec = Arc::new(Recorder::default());
        let ev: Arc<dyn EventListener> = rec.clone();
        let data: Arc<dyn DataListener> = rec.clone();
        f.dispatcher.set_up_data_listener(H, data).unwrap();
        f.dispatcher.set_up_event_listener(H, ev.clone()).unwrap();
        f.dispatcher.pause_events(&ev).unwrap();

        f.sim.inject_data(H, b"queued");
        thread::sleep(Duration::from_millis(30));
        assert!(rec.data.lock().unwrap().is_empty());

        f.dispatcher.destroy_event_listener(H, &ev).unwrap();
        assert_eq!(
            f.dispatcher.resume_events(&ev).unwrap_err(),
            PortError::ListenerNotRegistered
        );
        let looper = f.registry.lookup(H).unwrap().looper().unwrap();
        assert!(!looper.is_paused());

        assert!(wait_for(|| rec.data.lock().unwrap().len() == 1));
        f.sim.inject_data(H, b"after");
        assert!(wait_for(|| rec.data.lock().unwrap().len() == 2));
        assert_eq!(looper.data_stats().unwrap().pending, 0);
    }

    #[test]
    fn test_event_start_failure_rolls_back() {
        let f = fixture(LooperConfig::default(), LineMask::CTS);
        f.sim.fail_on(NativeOp::StartEventWorker, 16);
        let ev: Arc<dyn EventListener> = Arc::new(Recorder::default());

        let err = f.dispatcher.set_up_event_listener(H, ev.clone()).unwrap_err();
        assert!(matches!(err, PortError::NativeIo { op: NativeOp::StartEventWorker, .. }));
        let info = f.registry.lookup(H).unwrap();
        assert!(!info.has_event_listener());
        assert!(info.looper().is_none());
        assert!(info.is_consistent());

        // With a data listener keeping the looper alive, only the event lane goes.
        let data: Arc<dyn DataListener> = Arc::new(Recorder::default());
        f.dispatcher.set_up_data_listener(H, data).unwrap();
        assert!(f.dispatcher.set_up_event_listener(H, ev.clone()).is_err());
        let looper = info.looper().unwrap();
        assert!(!info.has_event_listener());
        assert_eq!(looper.event_state(), LaneState::Stopped);
        assert_eq!(looper.data_state(), LaneState::Running);
        assert!(!f.sim.port(H).unwrap().event_active);

        f.sim.clear_fail(NativeOp::StartEventWorker);
        f.dispatcher.set_up_event_listener(H, ev).unwrap();
        assert_eq!(looper.event_state(), LaneState::Running);
    }

    #[test]
    fn test_event_stop_failure_keeps_registration() {
        let f = fixture(LooperConfig::default(), LineMask::NONE);
        let rec = Arc::new(Recorder::default());
        let ev: Arc<dyn EventListener> = rec.clone();
        f.dispatcher.set_up_event_listener(H, ev.clone()).unwrap();

        f.sim.fail_on(NativeOp::StopEventWorker, 9);
        let err = f.dispatcher.destroy_event_listener(H, &ev).unwrap_err();
        assert!(matches!(err, PortError::NativeIo { op: NativeOp::StopEventWorker, .. }));
        let info = f.registry.lookup(H).unwrap();
        assert!(info.has_event_listener());
        assert_eq!(info.looper().unwrap().event_state(), LaneState::Running);

        // Still delivering.
        assert!(f.sim.set_lines(H, LineMask::RI));
        assert!(wait_for(|| rec.events.lock().unwrap().len() == 1));

        f.sim.clear_fail(NativeOp::StopEventWorker);
        f.dispatcher.destroy_event_listener(H, &ev).unwrap();
        assert!(info.looper().is_none());
    }

    #[test]
    fn test_zero_capacity_fails_setup_cleanly() {
        let f = fixture(LooperConfig::new().queue_capacity(0), LineMask::NONE);
        let data: Arc<dyn DataListener> = Arc::new(Recorder::default());
        let err = f.dispatcher.set_up_data_listener(H, data).unwrap_err();
        assert!(matches!(err, PortError::InvalidConfig(_)));
        let info = f.registry.lookup(H).unwrap();
        assert!(!info.has_data_listener());
        assert!(info.looper().is_none());
        assert!(f.sim.calls().is_empty());
    }

    struct SelfRemoving {
        dispatcher: Mutex<Option<Arc<CompletionDispatcher<SimNative>>>>,
        me: Mutex<Option<Arc<dyn DataListener>>>,
        result: Mutex<Option<PortResult<()>>>,
    }

    impl DataListener for SelfRemoving {
        fn on_data(&self, _data: &[u8]) {
            let dispatcher = self.dispatcher.lock().unwrap().take();
            let me = self.me.lock().unwrap().take();
            if let (Some(d), Some(me)) = (dispatcher, me) {
                *self.result.lock().unwrap() = Some(d.destroy_data_listener(H, &me));
            }
        }
        fn on_data_error(&self, _code: i32) {}
    }

    #[test]
    fn test_listener_unregisters_itself() {
        let f = fixture(LooperConfig::default(), LineMask::NONE);
        let dispatcher = Arc::new(f.dispatcher);
        let listener = Arc::new(SelfRemoving {
            dispatcher: Mutex::new(Some(dispatcher.clone())),
            me: Mutex::new(None),
            result: Mutex::new(None),
        });
        let as_data: Arc<dyn DataListener> = listener.clone();
        *listener.me.lock().unwrap() = Some(as_data.clone());

        dispatcher.set_up_data_listener(H, as_data).unwrap();
        f.sim.inject_data(H, b"bye");

        assert!(wait_for(|| listener.result.lock().unwrap().is_some()));
        assert_eq!(listener.result.lock().unwrap().clone(), Some(Ok(())));
        assert!(f.registry.lookup(H).unwrap().looper().is_none());
    }
}
