//! Renderer behavior: swapchain rotation, the resize barrier, and
//! render-target descriptor accounting across rebuilds.

mod common;

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use common::{MockBackend, MockDrawContext};
use vitrine_gpu::backend::GpuImage;
use vitrine_gpu::device::Device;
use vitrine_gpu::renderer::Renderer;

type MockRenderer = Renderer<MockBackend, MockDrawContext>;

fn renderer(buffer_count: usize) -> (MockRenderer, Rc<RefCell<Device<MockBackend>>>) {
    let (backend, state) = MockBackend::new();
    let device = Rc::new(RefCell::new(Device::new(backend)));
    let context = MockDrawContext::new(state, buffer_count, 800, 600);
    let renderer = Renderer::new(device.clone(), context).unwrap();
    (renderer, device)
}

#[test]
fn construction_adopts_the_full_image_set() {
    let (_renderer, device) = renderer(3);
    assert_eq!(device.borrow().render_target_count(), 3);
}

#[test]
fn backbuffers_rotate_across_frames() {
    let (mut renderer, _device) = renderer(3);

    let mut seen = Vec::new();
    for _ in 0..6 {
        renderer.begin_frame().unwrap();
        seen.push(renderer.get_backbuffer().id);
        renderer.end_frame().unwrap();
    }

    // Three distinct images, revisited in the same order.
    let distinct: HashSet<_> = seen.iter().copied().collect();
    assert_eq!(distinct.len(), 3);
    assert_eq!(seen[0..3], seen[3..6]);
}

#[test]
fn end_frame_presents_the_drawn_backbuffer() {
    let (mut renderer, _device) = renderer(2);

    renderer.begin_frame().unwrap();
    let drawn = renderer.get_backbuffer().id;
    renderer.end_frame().unwrap();

    assert_eq!(*renderer.context().presented.borrow(), vec![drawn]);
}

#[test]
fn resize_rebuilds_before_the_next_frame_never_mid_set() {
    let (mut renderer, device) = renderer(3);

    let mut old_ids = HashSet::new();
    for _ in 0..3 {
        renderer.begin_frame().unwrap();
        old_ids.insert(renderer.get_backbuffer().id);
        renderer.end_frame().unwrap();
    }

    renderer.resize(1024, 768);

    // Every post-resize frame draws into a post-resize image.
    for _ in 0..4 {
        renderer.begin_frame().unwrap();
        let image = renderer.get_backbuffer();
        assert!(
            !old_ids.contains(&image.id),
            "stale backbuffer {} handed out after resize",
            image.id
        );
        assert_eq!((image.width(), image.height()), (1024, 768));
        renderer.end_frame().unwrap();
    }

    // The old set's render targets were released exactly once each.
    assert_eq!(device.borrow().render_target_count(), 3);
}

#[test]
fn noop_resize_keeps_the_current_set() {
    let (mut renderer, _device) = renderer(2);

    renderer.begin_frame().unwrap();
    let before = renderer.get_backbuffer().id;
    renderer.end_frame().unwrap();

    renderer.resize(800, 600);

    let mut seen = HashSet::new();
    for _ in 0..2 {
        renderer.begin_frame().unwrap();
        seen.insert(renderer.get_backbuffer().id);
        renderer.end_frame().unwrap();
    }
    assert!(seen.contains(&before));
}

#[test]
fn dropping_the_renderer_releases_all_render_targets() {
    let (renderer, device) = renderer(3);
    assert_eq!(device.borrow().render_target_count(), 3);

    drop(renderer);
    assert_eq!(device.borrow().render_target_count(), 0);
}
