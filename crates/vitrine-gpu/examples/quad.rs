//! Windowed demo: clears the backbuffer and draws a flat-color quad next to
//! a two-stop gradient quad.
//!
//! Run with `cargo run --example quad`.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{Context, Result};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use vitrine_gpu::backend::wgpu::{
    Globals, SurfaceInit, Vertex, WgpuBackend, WgpuBackendInit, WgpuDrawContext,
};
use vitrine_gpu::backend::GpuImage;
use vitrine_gpu::logging::{init_logging, LoggingConfig};
use vitrine_gpu::{
    Blend, Color, ColorStates, Device, DrawOp, Frame, OpList, Renderer, ShaderFlags, ShaderKind,
};

struct DemoWindow {
    window: Arc<Window>,
    device: Rc<RefCell<Device<WgpuBackend>>>,
    renderer: Renderer<WgpuBackend, WgpuDrawContext<'static>>,
    ops: OpList,
}

fn quad(x: f32, y: f32, w: f32, h: f32, color: Color) -> [Vertex; 6] {
    let c = color.to_array();
    let v = |px: f32, py: f32, u: f32, t: f32| Vertex {
        pos: [px, py],
        uv: [u, t],
        color: c,
    };
    [
        v(x, y, 0.0, 0.0),
        v(x, y + h, 0.0, 1.0),
        v(x + w, y, 1.0, 0.0),
        v(x + w, y, 1.0, 0.0),
        v(x, y + h, 0.0, 1.0),
        v(x + w, y + h, 1.0, 1.0),
    ]
}

impl DemoWindow {
    fn new(event_loop: &ActiveEventLoop) -> Result<Self> {
        let attrs = Window::default_attributes()
            .with_title("vitrine quad")
            .with_inner_size(LogicalSize::new(800.0, 600.0));
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("failed to create window")?,
        );

        let backend =
            WgpuBackend::new(WgpuBackendInit::default()).context("GPU backend unavailable")?;
        let size = window.inner_size();
        let context = WgpuDrawContext::new(
            &backend,
            window.clone(),
            size.width,
            size.height,
            SurfaceInit::default(),
        )
        .context("failed to attach surface")?;

        let device = Rc::new(RefCell::new(Device::new(backend)));
        let renderer = Renderer::new(device.clone(), context)?;

        Ok(Self {
            window,
            device,
            renderer,
            ops: OpList::new(),
        })
    }

    fn redraw(&mut self) -> Result<()> {
        self.renderer.begin_frame()?;
        let backbuffer = self.renderer.get_backbuffer().clone();
        let (width, height) = (backbuffer.width() as f32, backbuffer.height() as f32);

        let mut frame = Frame::new(&self.device.borrow());
        frame.begin(
            &backbuffer,
            Some(Color::from_straight(0.10, 0.10, 0.12, 1.0)),
            None,
            None,
        );

        let mut vertices = Vec::with_capacity(12);
        vertices.extend_from_slice(&quad(
            40.0,
            40.0,
            width / 2.0 - 80.0,
            height - 80.0,
            Color::from_straight(0.90, 0.35, 0.20, 1.0),
        ));
        // The gradient shader ignores vertex color; uv.x drives the ramp.
        vertices.extend_from_slice(&quad(
            width / 2.0 + 40.0,
            40.0,
            width / 2.0 - 80.0,
            height - 80.0,
            Color::from_straight(1.0, 1.0, 1.0, 1.0),
        ));

        let vertex_bytes: &[u8] = bytemuck::cast_slice(&vertices);
        let vbuf = frame.create_vertex_buffer(&self.device.borrow(), vertex_bytes.len() as u64)?;
        frame.map_buffer(vbuf).copy_from_slice(vertex_bytes);
        frame.unmap_buffer(vbuf, vertex_bytes.len() as u64);

        let globals = Globals {
            target_size: [width, height, 0.0, 0.0],
            clip_rect: [0.0; 4],
        };
        let globals_bytes = bytemuck::bytes_of(&globals);
        let gbuf = frame.create_globals_buffer(&self.device.borrow(), globals_bytes.len() as u64)?;
        frame.map_buffer(gbuf).copy_from_slice(globals_bytes);
        frame.unmap_buffer(gbuf, globals_bytes.len() as u64);

        let stops: [[f32; 4]; 2] = [
            Color::from_straight(0.15, 0.45, 0.85, 1.0).to_array(),
            Color::from_straight(0.85, 0.20, 0.55, 1.0).to_array(),
        ];
        let stop_bytes: &[u8] = bytemuck::cast_slice(&stops);
        let sbuf = frame.create_storage_buffer(&self.device.borrow(), stop_bytes.len() as u64)?;
        frame.map_buffer(sbuf).copy_from_slice(stop_bytes);
        frame.unmap_buffer(sbuf, stop_bytes.len() as u64);

        self.ops.clear();
        self.ops.push_draw(DrawOp {
            shader: ShaderKind::Color,
            flags: ShaderFlags::empty(),
            color_states: ColorStates::default(),
            variation: 0,
            blend: Blend::Over,
            vertices: 0..6,
            texture: None,
        });
        self.ops.push_draw(DrawOp {
            shader: ShaderKind::LinearGradient,
            flags: ShaderFlags::empty(),
            color_states: ColorStates::default(),
            variation: 0,
            blend: Blend::Over,
            vertices: 6..12,
            texture: None,
        });

        frame.submit(
            &mut self.device.borrow_mut(),
            vbuf,
            gbuf,
            Some(sbuf),
            &self.ops,
        )?;
        self.renderer.end_frame()?;
        Ok(())
    }
}

#[derive(Default)]
struct App {
    window: Option<DemoWindow>,
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        match DemoWindow::new(event_loop) {
            Ok(window) => self.window = Some(window),
            Err(err) => {
                log::error!("failed to set up demo window: {err:#}");
                event_loop.exit();
            }
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);
        if let Some(window) = &self.window {
            window.window.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(window) = self.window.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                window.renderer.resize(size.width, size.height);
                window.window.request_redraw();
            }
            WindowEvent::RedrawRequested => {
                if let Err(err) = window.redraw() {
                    log::error!("redraw failed: {err:#}");
                    event_loop.exit();
                }
            }
            _ => {}
        }
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
    event_loop
        .run_app(&mut App::default())
        .context("winit event loop terminated with error")?;
    Ok(())
}
