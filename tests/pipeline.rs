//! End-to-end pipeline tests over real shared memory with recording
//! GPU/registry fakes standing in for the hosting process.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use frame_portal::{
    handle_method_call, unlink_all, ControlRegion, FrameDescriptor, MethodCall, MethodResponse,
    PixelFormat, PortalError, RenderBackend, ShmNamespace, SlotWriter, TexturePipeline,
    TextureId, TextureRegistry, SLOT_COUNT,
};

#[derive(Debug, Clone, PartialEq)]
struct Upload {
    texture: u32,
    format: PixelFormat,
    width: i32,
    height: i32,
    bytes: usize,
}

#[derive(Default)]
struct GpuState {
    fail_create_context: bool,
    context_alive: bool,
    current: bool,
    next_name: u32,
    uploads: Vec<Upload>,
    deleted: Vec<u32>,
    destroyed: bool,
}

/// Recording stand-in for the EGL/GL side
#[derive(Clone, Default)]
struct MockGpu(Arc<Mutex<GpuState>>);

impl MockGpu {
    fn failing() -> Self {
        let gpu = Self::default();
        gpu.0.lock().unwrap().fail_create_context = true;
        gpu
    }

    fn uploads(&self) -> Vec<Upload> {
        self.0.lock().unwrap().uploads.clone()
    }
}

impl RenderBackend for MockGpu {
    type Texture = u32;

    fn create_context(&mut self) -> frame_portal::Result<()> {
        let mut state = self.0.lock().unwrap();
        if state.fail_create_context {
            return Err(PortalError::ContextCreationFailed("mock refusal".into()));
        }
        state.context_alive = true;
        Ok(())
    }

    fn make_current(&mut self) -> frame_portal::Result<()> {
        self.0.lock().unwrap().current = true;
        Ok(())
    }

    fn clear_current(&mut self) {
        self.0.lock().unwrap().current = false;
    }

    fn create_textures(&mut self, count: usize) -> frame_portal::Result<Vec<u32>> {
        let mut state = self.0.lock().unwrap();
        Ok((0..count)
            .map(|_| {
                state.next_name += 1;
                state.next_name
            })
            .collect())
    }

    fn upload(
        &mut self,
        texture: u32,
        format: PixelFormat,
        width: i32,
        height: i32,
        pixels: &[u8],
    ) -> frame_portal::Result<()> {
        let mut state = self.0.lock().unwrap();
        assert!(state.current, "upload without a current context");
        state.uploads.push(Upload {
            texture,
            format,
            width,
            height,
            bytes: pixels.len(),
        });
        Ok(())
    }

    fn delete_textures(&mut self, textures: &[u32]) {
        self.0.lock().unwrap().deleted.extend_from_slice(textures);
    }

    fn destroy_context(&mut self) {
        let mut state = self.0.lock().unwrap();
        state.destroyed = true;
        state.context_alive = false;
    }
}

#[derive(Default)]
struct RegistryState {
    fail_create: bool,
    next_id: i64,
    pushes: Vec<(TextureId, u64)>,
}

/// Recording stand-in for the host texture registry
#[derive(Clone, Default)]
struct MockRegistry(Arc<Mutex<RegistryState>>);

impl MockRegistry {
    fn failing() -> Self {
        let registry = Self::default();
        registry.0.lock().unwrap().fail_create = true;
        registry
    }

    fn allow_create(&self) {
        self.0.lock().unwrap().fail_create = false;
    }

    fn pushes(&self) -> Vec<(TextureId, u64)> {
        self.0.lock().unwrap().pushes.clone()
    }
}

impl TextureRegistry for MockRegistry {
    fn create_texture(&self) -> frame_portal::Result<TextureId> {
        let mut state = self.0.lock().unwrap();
        if state.fail_create {
            return Err(PortalError::Registry("mock refusal".into()));
        }
        state.next_id += 1;
        Ok(TextureId(100 + state.next_id))
    }

    fn push_frame(
        &self,
        texture: TextureId,
        frame: &FrameDescriptor,
    ) -> frame_portal::Result<()> {
        self.0.lock().unwrap().pushes.push((texture, frame.name));
        Ok(())
    }
}

fn test_namespace(tag: &str) -> ShmNamespace {
    ShmNamespace::new(format!("fp_it_{}_{}", tag, uuid::Uuid::new_v4().simple()))
}

fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[test]
fn first_pass_uploads_every_slot() {
    init_logging();
    let ns = test_namespace("firstpass");
    let gpu = MockGpu::default();
    let registry = MockRegistry::default();
    let pipeline = TexturePipeline::with_namespace(gpu.clone(), registry.clone(), ns.clone());

    let textures = pipeline.acquire_textures().unwrap();
    assert_eq!(textures.len(), SLOT_COUNT);

    // No writer has published anything, yet the first sweep defines
    // every texture's content before the consumer ever waits.
    assert!(wait_until(Duration::from_secs(5), || {
        gpu.uploads().len() == SLOT_COUNT
    }));
    let uploaded: Vec<u32> = gpu.uploads().iter().map(|u| u.texture).collect();
    assert_eq!(uploaded, vec![1, 2, 3, 4]);
    assert_eq!(registry.pushes().len(), SLOT_COUNT);

    pipeline.shutdown();
    unlink_all(&ns).unwrap();
}

#[test]
fn fresh_frame_is_uploaded_once() {
    init_logging();
    let ns = test_namespace("fresh");
    let gpu = MockGpu::default();
    let registry = MockRegistry::default();
    let pipeline = TexturePipeline::with_namespace(gpu.clone(), registry.clone(), ns.clone());

    pipeline.acquire_textures().unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        gpu.uploads().len() == SLOT_COUNT
    }));

    let mut writer = SlotWriter::open(&ns, 2).unwrap();
    writer
        .publish(64, 64, PixelFormat::Rgba, &vec![0x5Au8; 64 * 64 * 4])
        .unwrap();

    assert!(wait_until(Duration::from_secs(5), || {
        gpu.uploads().len() == SLOT_COUNT + 1
    }));
    let uploads = gpu.uploads();
    let last = uploads.last().unwrap();
    assert_eq!(last.texture, 3); // slot 2's texture name
    assert_eq!(last.width, 64);
    assert_eq!(last.height, 64);
    assert_eq!(last.format, PixelFormat::Rgba);
    assert_eq!(last.bytes, 64 * 64 * 4);

    // The consumer cleared the valid flag, so with no new publish the
    // slot is not swept again.
    let control = ControlRegion::open_or_create(&ns).unwrap();
    assert!(!control.lock().unwrap().any_valid());
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(gpu.uploads().len(), SLOT_COUNT + 1);

    drop(control);
    pipeline.shutdown();
    unlink_all(&ns).unwrap();
}

#[test]
fn rgb_frames_upload_as_three_channel() {
    init_logging();
    let ns = test_namespace("rgb");
    let gpu = MockGpu::default();
    let pipeline =
        TexturePipeline::with_namespace(gpu.clone(), MockRegistry::default(), ns.clone());

    pipeline.acquire_textures().unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        gpu.uploads().len() == SLOT_COUNT
    }));

    let mut writer = SlotWriter::open(&ns, 0).unwrap();
    writer
        .publish(8, 8, PixelFormat::Rgb, &vec![0u8; 8 * 8 * 3])
        .unwrap();

    assert!(wait_until(Duration::from_secs(5), || {
        gpu.uploads().len() == SLOT_COUNT + 1
    }));
    let uploads = gpu.uploads();
    let last = uploads.last().unwrap();
    assert_eq!(last.format, PixelFormat::Rgb);
    assert_eq!(last.bytes, 8 * 8 * 3);

    pipeline.shutdown();
    unlink_all(&ns).unwrap();
}

#[test]
fn acquire_is_idempotent() {
    init_logging();
    let ns = test_namespace("idem");
    let registry = MockRegistry::default();
    let pipeline =
        TexturePipeline::with_namespace(MockGpu::default(), registry.clone(), ns.clone());

    let first = pipeline.acquire_textures().unwrap();
    let second = pipeline.acquire_textures().unwrap();
    assert_eq!(first, second);
    // Exactly one round of texture creation happened
    assert_eq!(registry.0.lock().unwrap().next_id, SLOT_COUNT as i64);

    pipeline.shutdown();
    unlink_all(&ns).unwrap();
}

#[test]
fn shutdown_wakes_waiting_consumer() {
    init_logging();
    let ns = test_namespace("stop");
    let gpu = MockGpu::default();
    let pipeline =
        TexturePipeline::with_namespace(gpu.clone(), MockRegistry::default(), ns.clone());

    pipeline.acquire_textures().unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        gpu.uploads().len() == SLOT_COUNT
    }));

    // The consumer is blocked in its wait with no writer anywhere; the
    // stop flag plus a single post must get it out.
    pipeline.shutdown();

    let state = gpu.0.lock().unwrap();
    assert!(state.destroyed);
    assert_eq!(state.deleted, vec![1, 2, 3, 4]);
    assert!(!state.current);
    drop(state);

    assert!(matches!(
        pipeline.textures(),
        Err(PortalError::NotInitialized)
    ));
    unlink_all(&ns).unwrap();
}

#[test]
fn shutdown_before_acquire_is_a_noop() {
    let pipeline = TexturePipeline::with_namespace(
        MockGpu::default(),
        MockRegistry::default(),
        test_namespace("noop"),
    );
    pipeline.shutdown();
    assert!(matches!(
        pipeline.textures(),
        Err(PortalError::NotInitialized)
    ));
}

#[test]
fn failed_initialization_can_be_retried() {
    init_logging();
    let ns = test_namespace("retry");
    let registry = MockRegistry::failing();
    let pipeline =
        TexturePipeline::with_namespace(MockGpu::default(), registry.clone(), ns.clone());

    let err = pipeline.acquire_textures().unwrap_err();
    assert!(matches!(err, PortalError::InitializationFailed(_)));

    // Nothing stayed initialized; once the registry recovers the same
    // pipeline comes up.
    registry.allow_create();
    let textures = pipeline.acquire_textures().unwrap();
    assert_eq!(textures.len(), SLOT_COUNT);

    pipeline.shutdown();
    unlink_all(&ns).unwrap();
}

#[test]
fn context_failure_is_fatal_to_the_thread_only() {
    init_logging();
    let ns = test_namespace("ctxfail");
    let gpu = MockGpu::failing();
    let pipeline =
        TexturePipeline::with_namespace(gpu.clone(), MockRegistry::default(), ns.clone());

    // Resource allocation succeeds, so the caller still gets its ids;
    // the consumer thread exits without ever presenting.
    let textures = pipeline.acquire_textures().unwrap();
    assert_eq!(textures.len(), SLOT_COUNT);

    std::thread::sleep(Duration::from_millis(50));
    assert!(gpu.uploads().is_empty());

    pipeline.shutdown();
    unlink_all(&ns).unwrap();
}

#[test]
fn channel_dispatch() {
    init_logging();
    let ns = test_namespace("channel");
    let pipeline = TexturePipeline::with_namespace(
        MockGpu::default(),
        MockRegistry::default(),
        ns.clone(),
    );

    let response = handle_method_call(&pipeline, &MethodCall::new("get_texture"));
    let MethodResponse::Success { value } = response else {
        panic!("expected success, got {response:?}");
    };
    let ids: Vec<i64> = serde_json::from_value(value).unwrap();
    assert_eq!(ids.len(), SLOT_COUNT);
    assert_eq!(ids, vec![101, 102, 103, 104]);

    let response = handle_method_call(&pipeline, &MethodCall::new("set_volume"));
    assert_eq!(response, MethodResponse::NotImplemented);

    pipeline.shutdown();
    unlink_all(&ns).unwrap();
}

#[test]
fn channel_reports_initialization_failure() {
    init_logging();
    let ns = test_namespace("chanerr");
    let pipeline = TexturePipeline::with_namespace(
        MockGpu::default(),
        MockRegistry::failing(),
        ns.clone(),
    );

    let response = handle_method_call(&pipeline, &MethodCall::new("get_texture"));
    let MethodResponse::Error { code, message, .. } = response else {
        panic!("expected error, got {response:?}");
    };
    assert_eq!(code, "gl-error");
    assert_eq!(message, "Failed to initialize");

    unlink_all(&ns).unwrap();
}
