//! Device-level behavior: pipeline caching through submission, render-target
//! descriptor recycling, and the display registry.

mod common;

use common::MockBackend;
use vitrine_gpu::descriptors::DescriptorId;
use vitrine_gpu::device::{Device, DeviceRegistry, DisplayId};
use vitrine_gpu::error::GpuError;
use vitrine_gpu::frame::Frame;
use vitrine_gpu::image::{ColorStates, ImageFormat};
use vitrine_gpu::ops::{DrawOp, OpList};
use vitrine_gpu::pipeline::{Blend, ShaderFlags, ShaderKind};
use vitrine_gpu::Color;

fn draw(blend: Blend, vertices: std::ops::Range<u32>) -> DrawOp {
    DrawOp {
        shader: ShaderKind::Color,
        flags: ShaderFlags::empty(),
        color_states: ColorStates::default(),
        variation: 0,
        blend,
        vertices,
        texture: None,
    }
}

// ── pipeline cache ───────────────────────────────────────────────────────

#[test]
fn identical_draws_share_one_compiled_pipeline() {
    let (backend, state) = MockBackend::new();
    let mut device = Device::new(backend);
    let target = device
        .create_offscreen_image(ImageFormat::Bgra8UnormSrgb, 32, 32)
        .unwrap();

    let mut frame = Frame::new(&device);
    frame.begin(&target, Some(Color::TRANSPARENT), None, None);
    let vertices = frame.create_vertex_buffer(&device, 256).unwrap();
    let globals = frame.create_globals_buffer(&device, 32).unwrap();

    let mut ops = OpList::new();
    ops.push_draw(draw(Blend::Over, 0..6));
    ops.push_draw(draw(Blend::Over, 6..12));
    frame
        .submit(&mut device, vertices, globals, None, &ops)
        .unwrap();

    assert_eq!(device.pipeline_compile_count(), 1);
    let submission = &state.borrow().submissions[0];
    assert_eq!(submission.draw_count, 2);
    assert_eq!(submission.pipelines[0], submission.pipelines[1]);
}

#[test]
fn changed_blend_compiles_a_distinct_pipeline() {
    let (backend, state) = MockBackend::new();
    let mut device = Device::new(backend);
    let target = device
        .create_offscreen_image(ImageFormat::Bgra8UnormSrgb, 32, 32)
        .unwrap();

    let mut frame = Frame::new(&device);
    frame.begin(&target, None, None, None);
    let vertices = frame.create_vertex_buffer(&device, 256).unwrap();
    let globals = frame.create_globals_buffer(&device, 32).unwrap();

    let mut ops = OpList::new();
    ops.push_draw(draw(Blend::Over, 0..6));
    ops.push_draw(draw(Blend::Add, 6..12));
    frame
        .submit(&mut device, vertices, globals, None, &ops)
        .unwrap();

    assert_eq!(device.pipeline_compile_count(), 2);
    let submission = &state.borrow().submissions[0];
    assert_ne!(submission.pipelines[0], submission.pipelines[1]);
}

#[test]
fn cache_persists_across_frames() {
    let (backend, _state) = MockBackend::new();
    let mut device = Device::new(backend);
    let target = device
        .create_offscreen_image(ImageFormat::Bgra8UnormSrgb, 32, 32)
        .unwrap();

    for _ in 0..3 {
        let mut frame = Frame::new(&device);
        frame.begin(&target, None, None, None);
        let vertices = frame.create_vertex_buffer(&device, 64).unwrap();
        let globals = frame.create_globals_buffer(&device, 32).unwrap();

        let mut ops = OpList::new();
        ops.push_draw(draw(Blend::Over, 0..6));
        frame
            .submit(&mut device, vertices, globals, None, &ops)
            .unwrap();
    }

    assert_eq!(device.pipeline_compile_count(), 1);
}

// ── render-target descriptors ────────────────────────────────────────────

#[test]
fn render_target_pool_grows_past_one_heap() {
    let (backend, _state) = MockBackend::new();
    let mut device = Device::new(backend);

    let mut ids = Vec::new();
    for _ in 0..65 {
        let image = device
            .create_offscreen_image(ImageFormat::Bgra8UnormSrgb, 4, 4)
            .unwrap();
        ids.push(device.alloc_render_target(&image));
    }

    assert_eq!(device.render_target_count(), 65);
    // The 65th allocation lands in a second heap.
    assert_eq!(ids[64], DescriptorId(64));

    for id in ids {
        device.free_render_target(id);
    }
    assert_eq!(device.render_target_count(), 0);
}

#[test]
fn freed_render_target_slot_is_reused() {
    let (backend, _state) = MockBackend::new();
    let mut device = Device::new(backend);

    let mut ids = Vec::new();
    for _ in 0..12 {
        let image = device
            .create_offscreen_image(ImageFormat::Bgra8UnormSrgb, 4, 4)
            .unwrap();
        ids.push(device.alloc_render_target(&image));
    }

    device.free_render_target(ids[10]);
    assert_eq!(device.render_target_count(), 11);

    let image = device
        .create_offscreen_image(ImageFormat::Bgra8UnormSrgb, 4, 4)
        .unwrap();
    let reused = device.alloc_render_target(&image);
    assert_eq!(reused, ids[10]);
    assert_eq!(device.render_target_count(), 12);
}

// ── image factories ──────────────────────────────────────────────────────

#[test]
fn image_factories_tag_usage_and_size() {
    use vitrine_gpu::backend::GpuImage;
    use vitrine_gpu::device::ATLAS_SIZE;
    use vitrine_gpu::image::ImageUsage;

    let (backend, _state) = MockBackend::new();
    let device = Device::new(backend);

    let offscreen = device
        .create_offscreen_image(ImageFormat::Rgba16Float, 320, 200)
        .unwrap();
    assert_eq!(offscreen.info().usage, ImageUsage::RenderTarget);
    assert_eq!((offscreen.width(), offscreen.height()), (320, 200));

    let atlas = device.create_atlas_image(ImageFormat::R8Unorm).unwrap();
    assert_eq!(atlas.info().usage, ImageUsage::Sampled);
    assert_eq!((atlas.width(), atlas.height()), (ATLAS_SIZE, ATLAS_SIZE));

    let upload = device
        .create_upload_image(ImageFormat::Rgba8Unorm, 16, 16, false)
        .unwrap();
    assert_eq!(upload.info().usage, ImageUsage::Sampled);

    let download = device
        .create_download_image(ImageFormat::Rgba8Unorm, 16, 16)
        .unwrap();
    assert_eq!(download.info().usage, ImageUsage::Download);
}

#[test]
fn only_requested_uploads_carry_a_mip_chain() {
    use vitrine_gpu::backend::GpuImage;

    let (backend, _state) = MockBackend::new();
    let device = Device::new(backend);

    // Minified sampling of a level-0-only image must stay within level 0,
    // so single-level uploads must not allocate a chain.
    let flat = device
        .create_upload_image(ImageFormat::Rgba8Unorm, 256, 256, false)
        .unwrap();
    assert!(!flat.info().mipmapped);

    let chained = device
        .create_upload_image(ImageFormat::Rgba8Unorm, 256, 256, true)
        .unwrap();
    assert!(chained.info().mipmapped);

    // Atlas pages are only ever written at level 0.
    let atlas = device.create_atlas_image(ImageFormat::R8Unorm).unwrap();
    assert!(!atlas.info().mipmapped);
}

// ── display registry ─────────────────────────────────────────────────────

#[test]
fn registry_returns_one_device_per_display() {
    let mut registry: DeviceRegistry<MockBackend> = DeviceRegistry::new();

    let a = registry
        .get_for_display(DisplayId(1), || Ok(MockBackend::new().0))
        .unwrap();
    let again = registry
        .get_for_display(DisplayId(1), || panic!("backend recreated for cached display"))
        .unwrap();
    assert!(std::rc::Rc::ptr_eq(&a, &again));

    let b = registry
        .get_for_display(DisplayId(2), || Ok(MockBackend::new().0))
        .unwrap();
    assert!(!std::rc::Rc::ptr_eq(&a, &b));
    assert_eq!(registry.len(), 2);
}

#[test]
fn registry_caches_nothing_on_bring_up_failure() {
    let mut registry: DeviceRegistry<MockBackend> = DeviceRegistry::new();

    let result = registry.get_for_display(DisplayId(7), || {
        Err(GpuError::BackendUnavailable {
            backend: "mock",
            reason: "no adapter".into(),
        })
    });
    assert!(result.is_err());
    assert!(registry.is_empty());

    // A later attempt starts fresh and can succeed.
    let device = registry.get_for_display(DisplayId(7), || Ok(MockBackend::new().0));
    assert!(device.is_ok());
    assert_eq!(registry.len(), 1);
}

#[test]
fn remove_display_drops_only_the_registry_reference() {
    let mut registry: DeviceRegistry<MockBackend> = DeviceRegistry::new();
    let device = registry
        .get_for_display(DisplayId(3), || Ok(MockBackend::new().0))
        .unwrap();

    registry.remove_display(DisplayId(3));
    assert!(registry.is_empty());

    // Held references stay usable.
    assert!(device
        .borrow()
        .create_offscreen_image(ImageFormat::Bgra8UnormSrgb, 4, 4)
        .is_ok());
}
