//! Pipeline lifecycle controller
//!
//! Lazily creates every shared resource on the first texture request and
//! owns the consumer thread: the control region, all data segments and
//! the registry textures come up together or not at all, and shutdown
//! stops the thread with a flag plus one signal post before unmapping.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use frame_portal_core::{PortalError, RenderBackend, Result, TextureId, TextureRegistry};
use frame_portal_shared_memory::{ControlRegion, DataSegment, ShmNamespace, SLOT_COUNT};
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::render::RenderLoop;

/// Owns the shared-memory transport and the consumer thread behind an
/// idempotent acquire/shutdown surface.
pub struct TexturePipeline<B, R> {
    namespace: ShmNamespace,
    registry: Arc<R>,
    state: Mutex<State<B>>,
}

enum State<B> {
    /// Not initialized; holds the backend until the consumer thread
    /// takes it
    Idle(Option<B>),
    Running(Active),
}

struct Active {
    textures: Vec<TextureId>,
    control: Arc<ControlRegion>,
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl<B: RenderBackend, R: TextureRegistry> TexturePipeline<B, R> {
    /// Build an uninitialized pipeline over the production namespace
    pub fn new(backend: B, registry: R) -> Self {
        Self::with_namespace(backend, registry, ShmNamespace::default())
    }

    /// Build an uninitialized pipeline over an explicit namespace
    pub fn with_namespace(backend: B, registry: R, namespace: ShmNamespace) -> Self {
        Self {
            namespace,
            registry: Arc::new(registry),
            state: Mutex::new(State::Idle(Some(backend))),
        }
    }

    /// Lazily create all shared resources, start the consumer thread and
    /// return the per-slot texture identifiers.
    ///
    /// Idempotent after the first success: later calls return the cached
    /// identifiers without re-initializing or starting a second thread.
    /// On failure nothing stays initialized and the call may be retried.
    pub fn acquire_textures(&self) -> Result<Vec<TextureId>> {
        let mut state = self.state.lock();
        if let State::Running(active) = &*state {
            return Ok(active.textures.clone());
        }

        let State::Idle(backend_slot) = &mut *state else {
            unreachable!()
        };
        let backend = backend_slot.take().ok_or_else(|| {
            PortalError::InitializationFailed("render backend already consumed".to_string())
        })?;

        match self.initialize(backend) {
            Ok(active) => {
                let textures = active.textures.clone();
                *state = State::Running(active);
                Ok(textures)
            }
            Err((err, backend)) => {
                *state = State::Idle(backend);
                error!(%err, "pipeline initialization failed");
                Err(err)
            }
        }
    }

    /// Texture identifiers of a running pipeline
    pub fn textures(&self) -> Result<Vec<TextureId>> {
        match &*self.state.lock() {
            State::Running(active) => Ok(active.textures.clone()),
            State::Idle(_) => Err(PortalError::NotInitialized),
        }
    }

    /// Stop the consumer thread and unmap the shared resources.
    ///
    /// A no-op when never initialized. The shared-memory objects
    /// themselves are left in the system for inspection or reuse.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        if matches!(&*state, State::Idle(_)) {
            debug!("shutdown before initialization, nothing to do");
            return;
        }
        let State::Running(active) = std::mem::replace(&mut *state, State::Idle(None)) else {
            unreachable!()
        };
        drop(state);

        active.stop.store(true, Ordering::SeqCst);
        // One post guarantees the consumer wakes even if no frame ever
        // arrives; it checks the stop flag on every wake.
        if let Err(err) = active.control.post_signal() {
            warn!(%err, "failed to wake consumer for shutdown");
        }
        if active.thread.join().is_err() {
            warn!("consumer thread panicked");
        }
        debug!("pipeline shut down");
        // Dropping `active` unmaps the control region; the segments were
        // owned by the consumer thread and are unmapped already.
    }

    fn initialize(&self, backend: B) -> std::result::Result<Active, (PortalError, Option<B>)> {
        let control = match ControlRegion::open_or_create(&self.namespace) {
            Ok(control) => Arc::new(control),
            Err(err) => {
                return Err((
                    PortalError::InitializationFailed(err.to_string()),
                    Some(backend),
                ))
            }
        };

        let mut segments = Vec::with_capacity(SLOT_COUNT);
        for slot in 0..SLOT_COUNT {
            match DataSegment::open_or_create(&self.namespace, slot) {
                Ok(segment) => segments.push(segment),
                Err(err) => {
                    return Err((
                        PortalError::InitializationFailed(err.to_string()),
                        Some(backend),
                    ))
                }
            }
        }

        let mut textures = Vec::with_capacity(SLOT_COUNT);
        for _ in 0..SLOT_COUNT {
            match self.registry.create_texture() {
                Ok(id) => textures.push(id),
                Err(err) => {
                    return Err((
                        PortalError::InitializationFailed(err.to_string()),
                        Some(backend),
                    ))
                }
            }
        }

        let stop = Arc::new(AtomicBool::new(false));
        let render = RenderLoop {
            backend,
            registry: Arc::clone(&self.registry),
            textures: textures.clone(),
            control: Arc::clone(&control),
            segments,
            stop: Arc::clone(&stop),
        };
        let thread = match std::thread::Builder::new()
            .name("frame-portal-render".to_string())
            .spawn(move || render.run())
        {
            Ok(handle) => handle,
            Err(err) => return Err((PortalError::InitializationFailed(err.to_string()), None)),
        };

        debug!(?textures, "pipeline initialized");
        Ok(Active {
            textures,
            control,
            stop,
            thread,
        })
    }
}
