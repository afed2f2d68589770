mod loader;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use glam::Vec2;
use globe_core::constants::WHEEL_NOTCH;
use globe_core::gpu::GpuRenderer;
use globe_core::{
    dispatch_event, run_globe, Color, Coordinates, Globe, GlobeEvent, GlobeOptions, Marker,
    PumpFrameSource,
};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::WindowBuilder;

use loader::FileLoader;

const DEFAULT_TEXTURE: &str = "assets/globe.jpg";

/// (lat, lon, value, color) for the demo scene.
const DEMO_MARKERS: [(f64, f64, f64, Option<u32>); 6] = [
    (1.3521, 103.8198, 56.0, None),
    (51.5072, -0.1276, 89.0, Some(0x4fc3f7)),
    (40.7128, -74.0060, 84.0, Some(0x4fc3f7)),
    (-33.8688, 151.2093, 52.0, None),
    (35.6762, 139.6503, 140.0, Some(0xef5350)),
    (-23.5505, -46.6333, 122.0, None),
];

fn demo_markers() -> anyhow::Result<Rc<[Marker]>> {
    DEMO_MARKERS
        .iter()
        .map(|&(lat, lon, value, color)| {
            let marker = Marker::new(Coordinates::new(lat, lon)?, value);
            Ok(match color {
                Some(hex) => marker.with_color(Color::from_hex(hex)),
                None => marker,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()
        .map(Rc::from)
}

fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let texture = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_TEXTURE.to_string());

    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Globe (native)")
            .with_inner_size(PhysicalSize::new(1024, 768))
            .build(&event_loop)?,
    );
    let size = window.inner_size();

    let instance = wgpu::Instance::default();
    let surface = instance.create_surface(window.clone())?;
    let renderer = pollster::block_on(GpuRenderer::new(
        &instance,
        surface,
        size.width,
        size.height,
    ))?;

    let mut options = GlobeOptions::default();
    options.globe.texture = texture;
    let loader = FileLoader::new();
    let mut globe = Globe::new(options, renderer, loader.clone())?;
    globe.set_size(size.width, size.height);
    globe.on_asset_error(|e| log::warn!("[asset] running without texture: {}", e));
    let markers = demo_markers()?;
    globe.set_markers(markers.clone());

    let globe = Rc::new(RefCell::new(globe));
    let queue = globe.borrow().event_queue();
    let source = Rc::new(PumpFrameSource::new());
    let render_loop = run_globe(globe.clone(), source.clone());
    let mut cursor = Vec2::ZERO;

    log::info!("[native] drag to rotate, scroll to zoom, 1-6 focus a marker, Esc clears focus");

    event_loop.run(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Poll);
        let send = |e: GlobeEvent| dispatch_event(&globe, &queue, e);
        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => {
                    render_loop.cancel();
                    elwt.exit();
                }
                WindowEvent::Resized(size) => send(GlobeEvent::Resize {
                    width: size.width,
                    height: size.height,
                }),
                WindowEvent::CursorMoved { position, .. } => {
                    cursor = Vec2::new(position.x as f32, position.y as f32);
                    send(GlobeEvent::PointerMove {
                        x: cursor.x,
                        y: cursor.y,
                    });
                }
                WindowEvent::CursorLeft { .. } => send(GlobeEvent::PointerLeave),
                WindowEvent::MouseInput {
                    state,
                    button: MouseButton::Left,
                    ..
                } => match state {
                    ElementState::Pressed => send(GlobeEvent::PointerDown {
                        x: cursor.x,
                        y: cursor.y,
                    }),
                    ElementState::Released => send(GlobeEvent::PointerUp),
                },
                WindowEvent::MouseWheel { delta, .. } => {
                    // DOM convention: positive is away from the user
                    let delta_y = match delta {
                        MouseScrollDelta::LineDelta(_, y) => -y * WHEEL_NOTCH,
                        MouseScrollDelta::PixelDelta(p) => -p.y as f32,
                    };
                    send(GlobeEvent::Wheel { delta_y });
                }
                WindowEvent::KeyboardInput {
                    event:
                        KeyEvent {
                            logical_key,
                            state: ElementState::Pressed,
                            ..
                        },
                    ..
                } => match logical_key {
                    Key::Named(NamedKey::Escape) => send(GlobeEvent::Focus(None)),
                    Key::Character(s) => {
                        let index = s.parse::<usize>().ok().and_then(|d| d.checked_sub(1));
                        if let Some(m) = index.and_then(|i| markers.get(i)) {
                            send(GlobeEvent::Focus(Some(m.coordinates)));
                        }
                    }
                    _ => {}
                },
                _ => {}
            },
            Event::AboutToWait => {
                loader.poll();
                source.pump_now();
            }
            _ => {}
        }
    })?;
    Ok(())
}
