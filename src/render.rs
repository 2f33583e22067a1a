//! Render/consumer loop
//!
//! A dedicated OS thread owning the GPU rendering context. It blocks on
//! the control region's ready signal, and on each wake drains every slot
//! whose header is valid: upload the slot's bytes into its texture, push
//! the texture to the presentation sink, clear the valid flag. The
//! signal is a counting semaphore, so wake-ups without a visible update
//! (a slot republished before the previous frame was consumed) simply
//! re-enter the wait.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use frame_portal_core::{FrameDescriptor, PixelFormat, RenderBackend, TextureId, TextureRegistry};
use frame_portal_shared_memory::{ControlRegion, DataSegment, SlotHeader, SLOT_COUNT};
use tracing::{debug, error, warn};

/// Outcome of one stay in the waiting state
enum Wake {
    /// At least one slot header is valid
    Fresh,
    /// Stop was requested
    Stop,
}

/// Everything the consumer thread owns
pub(crate) struct RenderLoop<B, R> {
    pub backend: B,
    pub registry: Arc<R>,
    /// Registry texture ids, one per slot, fixed at startup
    pub textures: Vec<TextureId>,
    pub control: Arc<ControlRegion>,
    pub segments: Vec<DataSegment>,
    pub stop: Arc<AtomicBool>,
}

impl<B: RenderBackend, R: TextureRegistry> RenderLoop<B, R> {
    /// Thread entry point
    pub fn run(mut self) {
        let names = match self.starting() {
            Ok(names) => names,
            Err(err) => {
                error!(%err, "render thread failed to start");
                return;
            }
        };
        self.present_until_stopped(&names);
        self.stopped(&names);
    }

    /// STARTING: context + per-slot textures, once
    fn starting(&mut self) -> frame_portal_core::Result<Vec<B::Texture>> {
        self.backend.create_context()?;
        self.backend.make_current()?;
        let names = self.backend.create_textures(SLOT_COUNT)?;
        debug!(slots = SLOT_COUNT, "render thread started");
        Ok(names)
    }

    /// PRESENTING ↔ WAITING until a stop request is observed
    fn present_until_stopped(&mut self, names: &[B::Texture]) {
        let mut frame = FrameDescriptor::default();
        let mut first_pass = true;
        let control = Arc::clone(&self.control);

        loop {
            // PRESENTING: sweep all slots in fixed order under the
            // header mutex. The first pass uploads unconditionally so
            // every texture has defined content before it is ever
            // presented.
            if let Err(err) = self.backend.make_current() {
                error!(%err, "lost render context");
                break;
            }
            {
                let mut headers = match control.lock() {
                    Ok(guard) => guard,
                    Err(err) => {
                        error!(%err, "control mutex failed");
                        break;
                    }
                };
                for slot in 0..SLOT_COUNT {
                    let header = headers.header(slot);
                    if header.is_valid() || first_pass {
                        self.upload_slot(names[slot], slot, &header, &mut frame);
                        headers.clear_valid(slot);
                    }
                }
            }
            self.backend.clear_current();
            first_pass = false;

            // WAITING
            match self.wait_for_frames() {
                Ok(Wake::Fresh) => continue,
                Ok(Wake::Stop) => break,
                Err(err) => {
                    error!(%err, "signal wait failed");
                    break;
                }
            }
        }
    }

    /// Block until a writer signals and a valid header is visible, or a
    /// stop is requested.
    ///
    /// The stop flag is checked on every wake before anything else, so a
    /// shutdown's single post is never lost.
    fn wait_for_frames(&self) -> frame_portal_shared_memory::Result<Wake> {
        loop {
            self.control.wait_signal()?;
            if self.stop.load(Ordering::SeqCst) {
                return Ok(Wake::Stop);
            }
            let headers = self.control.lock()?;
            if headers.any_valid() {
                return Ok(Wake::Fresh);
            }
            // Counted signal with no visible update: the slot was
            // republished before we woke. Re-enter the wait.
        }
    }

    /// Upload one slot's current bytes and publish its texture
    fn upload_slot(
        &mut self,
        name: B::Texture,
        slot: usize,
        header: &SlotHeader,
        frame: &mut FrameDescriptor,
    ) {
        let segment = &self.segments[slot];
        let len = header.frame_len();
        if len > segment.capacity() {
            // Only possible for a header written outside the writer
            // contract; never read past the segment.
            warn!(slot, len, capacity = segment.capacity(), "header exceeds slot capacity, skipping");
            return;
        }

        let format =
            PixelFormat::from_bytes_per_pixel(header.bytes_per_pixel).unwrap_or(PixelFormat::Rgba);
        let pixels = &segment.bytes()[..len];
        if let Err(err) = self
            .backend
            .upload(name, format, header.width, header.height, pixels)
        {
            warn!(slot, %err, "texture upload failed");
            return;
        }

        frame.name = name.into();
        if let Err(err) = self.registry.push_frame(self.textures[slot], frame) {
            warn!(slot, %err, "frame publish failed");
        }
    }

    /// STOPPED: tear down GPU state on the owning thread
    fn stopped(&mut self, names: &[B::Texture]) {
        if let Err(err) = self.backend.make_current() {
            warn!(%err, "could not make context current for teardown");
        }
        self.backend.delete_textures(names);
        self.backend.clear_current();
        self.backend.destroy_context();
        debug!("render thread stopped");
    }
}
