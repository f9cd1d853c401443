//! PortManager — owns the registry and dispatcher for one native layer.
//!
//! There is no process-wide instance. An application builds one manager per
//! native backend and shares it by `Arc`:
//!
//! ```ignore
//! let manager = PortManager::build(LooperConfig::from_env(), |sink| SimNative::new(sink))?;
//! // native open succeeded for `h`
//! manager.attach(h, "/dev/ttyS0")?;
//! manager.set_up_event_listener(h, listener.clone())?;
//! ```
//!
//! `attach` / `detach` bracket the native open / close; everything in between
//! is forwarded to the [`CompletionDispatcher`].

use std::sync::Arc;

use portloop_core::{
    log_debug, log_info, CompletionSink, DataListener, EventListener, Handle, LineMask, NativeIo,
    PortError, PortResult,
};

use crate::config::LooperConfig;
use crate::dispatcher::CompletionDispatcher;
use crate::looper::Looper;
use crate::registry::{HandleInfo, HandleRegistry};

pub struct PortManager<N: NativeIo> {
    registry: Arc<HandleRegistry>,
    dispatcher: CompletionDispatcher<N>,
}

impl<N: NativeIo> PortManager<N> {
    /// Validate `config`, create the registry, and hand its sink to `make_native`.
    pub fn build<F>(config: LooperConfig, make_native: F) -> PortResult<Self>
    where
        F: FnOnce(Arc<dyn CompletionSink>) -> N,
    {
        config.validate().map_err(PortError::InvalidConfig)?;
        let registry = Arc::new(HandleRegistry::new());
        let sink: Arc<dyn CompletionSink> = registry.clone();
        let native = Arc::new(make_native(sink));
        log_info!(
            "port manager ready (queue capacity {}, line mask {})",
            config.queue_capacity,
            config.line_mask
        );
        let dispatcher = CompletionDispatcher::new(Arc::clone(&registry), native, config);
        Ok(Self { registry, dispatcher })
    }

    // ── Open / close hooks ───────────────────────────────────────────

    /// Register a handle the native layer has just opened.
    pub fn attach(&self, handle: Handle, port_name: impl Into<String>) -> PortResult<()> {
        let info = self.registry.insert(handle, port_name)?;
        log_debug!("handle {} attached ({})", handle, info.port_name());
        Ok(())
    }

    /// Forget a handle before the native layer closes it.
    pub fn detach(&self, handle: Handle) -> PortResult<()> {
        let info = self.registry.remove(handle)?;
        log_debug!("handle {} detached ({})", handle, info.port_name());
        Ok(())
    }

    // ── Listener API ─────────────────────────────────────────────────

    pub fn set_up_data_listener(&self, handle: Handle, listener: Arc<dyn DataListener>) -> PortResult<()> {
        self.dispatcher.set_up_data_listener(handle, listener)
    }

    pub fn destroy_data_listener(&self, handle: Handle, listener: &Arc<dyn DataListener>) -> PortResult<()> {
        self.dispatcher.destroy_data_listener(handle, listener)
    }

    pub fn set_up_event_listener(&self, handle: Handle, listener: Arc<dyn EventListener>) -> PortResult<()> {
        self.dispatcher.set_up_event_listener(handle, listener)
    }

    pub fn destroy_event_listener(&self, handle: Handle, listener: &Arc<dyn EventListener>) -> PortResult<()> {
        self.dispatcher.destroy_event_listener(handle, listener)
    }

    pub fn pause_events(&self, listener: &Arc<dyn EventListener>) -> PortResult<()> {
        self.dispatcher.pause_events(listener)
    }

    pub fn resume_events(&self, listener: &Arc<dyn EventListener>) -> PortResult<()> {
        self.dispatcher.resume_events(listener)
    }

    pub fn set_event_mask(&self, listener: &Arc<dyn EventListener>, mask: LineMask) -> PortResult<()> {
        self.dispatcher.set_event_mask(listener, mask)
    }

    pub fn event_mask(&self, listener: &Arc<dyn EventListener>) -> PortResult<LineMask> {
        self.dispatcher.event_mask(listener)
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn registry(&self) -> &Arc<HandleRegistry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &CompletionDispatcher<N> {
        &self.dispatcher
    }

    pub fn native(&self) -> &Arc<N> {
        self.dispatcher.native()
    }

    pub fn config(&self) -> &LooperConfig {
        self.dispatcher.config()
    }

    /// The ingestion surface the native layer was given.
    pub fn sink(&self) -> Arc<dyn CompletionSink> {
        self.registry.clone()
    }

    pub fn handle_info(&self, handle: Handle) -> PortResult<Arc<HandleInfo>> {
        self.registry.lookup(handle)
    }

    /// The handle's looper, if any listener is registered on it.
    pub fn looper(&self, handle: Handle) -> PortResult<Option<Arc<Looper>>> {
        Ok(self.registry.lookup(handle)?.looper())
    }
}

impl<N: NativeIo> std::fmt::Debug for PortManager<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortManager")
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}
