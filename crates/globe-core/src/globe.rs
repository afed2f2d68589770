//! The globe scene: owns markers, camera, hover state and tweens, and runs
//! one render+update step per frame.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use glam::Vec2;

use crate::camera::{Camera, CameraController};
use crate::constants::RADIUS;
use crate::coords::Coordinates;
use crate::easing::Easing;
use crate::error::GlobeError;
use crate::glow::{Geometry, GlowFactory, GlowParams, ShellGlowFactory};
use crate::interaction::{reduce, HoverAction, HoverSink, HoverState, HoverTransition};
use crate::markers::{Marker, MarkerField, MarkerRenderObject};
use crate::options::{GlobeOptions, MarkerOptions};
use crate::picking::{Interactable, InteractionLayer, PointerHit, RayPicker, Viewport};
use crate::render_loop::{FrameSource, FrameTime, RenderLoop};
use crate::scene::{
    AssetLoader, GlobeSurface, Lights, Renderer, SceneView, TextureSlot, TextureState,
};
use crate::tween::ScaleTweens;

/// Input or command delivered while the globe was busy.
#[derive(Clone, Debug)]
pub enum GlobeEvent {
    PointerMove { x: f32, y: f32 },
    PointerDown { x: f32, y: f32 },
    PointerUp,
    PointerLeave,
    Wheel { delta_y: f32 },
    Resize { width: u32, height: u32 },
    SetMarkers(Rc<[Marker]>),
    SetMarkerOptions(MarkerOptions),
    Focus(Option<Coordinates>),
    LookAt(Coordinates),
}

#[derive(Clone, Default)]
pub struct EventQueue {
    inner: Rc<RefCell<VecDeque<GlobeEvent>>>,
}

impl EventQueue {
    pub fn push(&self, event: GlobeEvent) {
        self.inner.borrow_mut().push_back(event);
    }

    pub fn drain(&self) -> Vec<GlobeEvent> {
        self.inner.borrow_mut().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct PointerState {
    last: Option<Vec2>,
    dragging: bool,
}

pub struct Globe<R: Renderer> {
    options: GlobeOptions,
    radius: f32,
    renderer: R,
    loader: Box<dyn AssetLoader>,
    camera: CameraController,
    markers: MarkerField,
    hover: HoverState,
    sink: HoverSink,
    tweens: ScaleTweens,
    picker: Box<dyn InteractionLayer>,
    surface: GlobeSurface,
    texture_slot: TextureSlot,
    texture_loaded: Option<Box<dyn FnMut()>>,
    texture_loaded_fired: bool,
    asset_error: Option<Box<dyn FnMut(&GlobeError)>>,
    viewport: Viewport,
    pointer: PointerState,
    events: EventQueue,
}

impl<R: Renderer> Globe<R> {
    /// Validate `options`, place the camera and start loading the globe
    /// texture through `loader`.
    pub fn new<L>(options: GlobeOptions, mut renderer: R, loader: L) -> Result<Self, GlobeError>
    where
        L: AssetLoader + 'static,
    {
        options.validate()?;
        let radius = RADIUS;
        let (width, height) = options.size.unwrap_or((1, 1));
        let viewport = Viewport::new(width, height);

        let mut camera = CameraController::new(
            &options.camera,
            options.focus.clone(),
            radius,
            viewport.aspect(),
        );
        camera.look_at(options.look_at);

        let sink = HoverSink::default();
        let markers = MarkerField::new(radius, options.markers.clone(), sink.clone());
        let surface = build_surface(&options, radius, &ShellGlowFactory);

        renderer.set_clear_color(options.clear_color);
        renderer.set_size(width, height);

        let mut globe = Self {
            radius,
            renderer,
            loader: Box::new(loader),
            camera,
            markers,
            hover: HoverState::default(),
            sink,
            tweens: ScaleTweens::new(),
            picker: Box::new(RayPicker::new(radius)),
            surface,
            texture_slot: TextureSlot::new(),
            texture_loaded: None,
            texture_loaded_fired: false,
            asset_error: None,
            viewport,
            pointer: PointerState::default(),
            events: EventQueue::default(),
            options,
        };
        globe.request_texture();
        Ok(globe)
    }

    fn request_texture(&mut self) {
        let url = self.options.globe.texture.clone();
        log::info!("[asset] loading globe texture {}", url);
        self.loader.load(&url, self.texture_slot.clone());
    }

    pub fn with_interaction_layer(mut self, layer: Box<dyn InteractionLayer>) -> Self {
        self.picker = layer;
        self
    }

    /// Replace glow construction for the globe shell and every marker.
    pub fn set_glow_factory(&mut self, factory: Rc<dyn GlowFactory>) {
        self.surface = build_surface(&self.options, self.radius, factory.as_ref());
        self.markers.set_glow_factory(factory);
    }

    pub fn options(&self) -> &GlobeOptions {
        &self.options
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn hover_state(&self) -> &HoverState {
        &self.hover
    }

    pub fn markers(&self) -> &[MarkerRenderObject] {
        self.markers.objects()
    }

    pub fn marker_field(&self) -> &MarkerField {
        &self.markers
    }

    pub fn camera(&self) -> &Camera {
        self.camera.camera()
    }

    pub fn camera_controller(&self) -> &CameraController {
        &self.camera
    }

    pub fn scale_tweens(&self) -> &ScaleTweens {
        &self.tweens
    }

    pub fn texture_state(&self) -> &TextureState {
        &self.surface.texture
    }

    pub fn surface(&self) -> &GlobeSurface {
        &self.surface
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Queue for events that arrive while the globe is borrowed.
    pub fn event_queue(&self) -> EventQueue {
        self.events.clone()
    }

    /// Stage a marker rebuild; applied at the start of the next tick.
    pub fn set_markers(&mut self, markers: Rc<[Marker]>) -> bool {
        self.markers.set_markers(markers)
    }

    pub fn set_marker_options(&mut self, options: MarkerOptions) -> Result<(), GlobeError> {
        options.validate()?;
        self.markers.set_options(options.clone());
        self.options.markers = options;
        Ok(())
    }

    /// Focus on `coordinates` with the configured focus options, or return to
    /// the default orbit when `None`.
    pub fn focus(&mut self, coordinates: Option<Coordinates>) -> Result<(), GlobeError> {
        match coordinates {
            Some(c) => self.camera.focus_default(c),
            None => {
                self.camera.clear_focus();
                Ok(())
            }
        }
    }

    pub fn focus_with(
        &mut self,
        coordinates: Coordinates,
        distance: f32,
        duration_ms: f64,
        easing: Easing,
    ) -> Result<(), GlobeError> {
        self.camera.focus(coordinates, distance, duration_ms, easing)
    }

    pub fn clear_focus(&mut self) {
        self.camera.clear_focus();
    }

    pub fn look_at(&mut self, coordinates: Coordinates) {
        self.camera.look_at(coordinates);
    }

    /// Pointer moved to `(x, y)` in physical pixels. Rotates while dragging,
    /// otherwise hit-tests markers and updates hover state.
    pub fn pointer_move(&mut self, x: f32, y: f32) {
        let p = Vec2::new(x, y);
        let last = self.pointer.last.replace(p);
        if self.pointer.dragging {
            if let Some(last) = last {
                let d = p - last;
                self.pointer_drag(d.x, d.y);
            }
            return;
        }
        self.pick(p);
    }

    pub fn pointer_drag(&mut self, dx: f32, dy: f32) {
        self.camera.rotate(dx, dy, self.viewport.height as f32);
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) {
        self.pointer.dragging = true;
        self.pointer.last = Some(Vec2::new(x, y));
    }

    pub fn pointer_up(&mut self) {
        self.pointer.dragging = false;
    }

    pub fn pointer_leave(&mut self) {
        self.pointer = PointerState::default();
        self.sink.push(HoverAction::ClearActiveMarker);
        self.apply_hover_actions();
    }

    pub fn wheel(&mut self, delta_y: f32) {
        self.camera.zoom(delta_y);
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        let viewport = Viewport::new(width.max(1), height.max(1));
        if viewport == self.viewport {
            return;
        }
        self.viewport = viewport;
        self.camera.set_aspect(viewport.aspect());
        self.renderer.set_size(viewport.width, viewport.height);
    }

    /// Called once, on the first tick after the texture is ready.
    pub fn on_texture_loaded(&mut self, callback: impl FnMut() + 'static) {
        self.texture_loaded = Some(Box::new(callback));
    }

    pub fn on_asset_error(&mut self, callback: impl FnMut(&GlobeError) + 'static) {
        self.asset_error = Some(Box::new(callback));
    }

    pub fn handle_event(&mut self, event: GlobeEvent) {
        match event {
            GlobeEvent::PointerMove { x, y } => self.pointer_move(x, y),
            GlobeEvent::PointerDown { x, y } => self.pointer_down(x, y),
            GlobeEvent::PointerUp => self.pointer_up(),
            GlobeEvent::PointerLeave => self.pointer_leave(),
            GlobeEvent::Wheel { delta_y } => self.wheel(delta_y),
            GlobeEvent::Resize { width, height } => self.set_size(width, height),
            GlobeEvent::SetMarkers(markers) => {
                self.set_markers(markers);
            }
            GlobeEvent::SetMarkerOptions(options) => {
                if let Err(e) = self.set_marker_options(options) {
                    log::warn!("[markers] {}", e);
                }
            }
            GlobeEvent::Focus(target) => {
                if let Err(e) = self.focus(target) {
                    log::warn!("[focus] {}", e);
                }
            }
            GlobeEvent::LookAt(c) => self.look_at(c),
        }
    }

    fn pick(&mut self, pointer: Vec2) {
        let objects: Vec<&dyn Interactable> = self
            .markers
            .objects()
            .iter()
            .map(|o| o as &dyn Interactable)
            .collect();
        let hit = self
            .picker
            .pointer_move(pointer, self.viewport, self.camera.camera(), &objects);
        match hit {
            PointerHit::Object(i) => match objects.get(i) {
                Some(object) => object.pointer_over(),
                None => self.sink.push(HoverAction::ClearActiveMarker),
            },
            PointerHit::Nothing => self.sink.push(HoverAction::ClearActiveMarker),
        }
        self.apply_hover_actions();
    }

    fn apply_hover_actions(&mut self) {
        for action in self.sink.drain() {
            let next = reduce(&self.hover, action);
            let transition = HoverTransition::between(&self.hover, &next);
            self.hover = next;
            if !transition.is_empty() {
                self.start_hover_tweens(transition);
            }
        }
    }

    fn start_hover_tweens(&mut self, transition: HoverTransition) {
        let active_scale = self.options.markers.active_scale;
        let duration = self.options.markers.animation_duration_ms;
        let targets = [
            (transition.scale_down, 1.0),
            (transition.scale_up, active_scale),
        ];
        for (id, to) in targets {
            let Some(id) = id else { continue };
            let Some(object) = self.markers.get(id) else {
                continue;
            };
            log::debug!("[hover] {:?} {} -> {}", id, object.scale, to);
            self.tweens
                .start(id, object.scale, to, duration, Easing::CUBIC_IN_OUT);
        }
    }

    /// Queued events, staged markers, completed loads.
    fn apply_deferred(&mut self) {
        for event in self.events.drain() {
            self.handle_event(event);
        }

        if let Some(commit) = self.markers.commit() {
            // hover and tweens refer to objects of the old set
            self.sink.drain();
            self.hover = HoverState::default();
            self.tweens.retain_generation(commit.generation);
            log::info!(
                "[markers] generation {} -> {} ({} objects)",
                commit.previous_generation,
                commit.generation,
                self.markers.objects().len()
            );
        }

        if let Some(result) = self.texture_slot.take() {
            match result {
                Ok(data) => {
                    log::info!("[asset] globe texture ready ({}x{})", data.width, data.height);
                    self.surface.texture = TextureState::Ready(Rc::new(data));
                }
                Err(e) => {
                    log::error!("[asset] {}", e);
                    self.surface.texture = TextureState::Failed(e.to_string());
                    if let Some(callback) = self.asset_error.as_mut() {
                        callback(&e);
                    }
                }
            }
        }

        if !self.texture_loaded_fired && matches!(self.surface.texture, TextureState::Ready(_)) {
            if let Some(callback) = self.texture_loaded.as_mut() {
                self.texture_loaded_fired = true;
                callback();
            }
        }
    }

    fn advance(&mut self, dt_ms: f64) {
        for (id, scale) in self.tweens.advance(dt_ms) {
            self.markers.set_scale(id, scale);
        }
        self.camera.update(dt_ms);
    }

    /// One frame: deferred work, render, tweens, camera.
    ///
    /// A render error is returned after the rest of the frame has run.
    pub fn tick(&mut self, time: FrameTime) -> Result<(), GlobeError> {
        self.apply_deferred();

        let camera = self.camera.camera();
        let view = SceneView {
            globe: &self.surface,
            markers: self.markers.objects(),
            lights: Lights::follow_camera(&self.options.lights, camera, self.radius),
            clear_color: self.options.clear_color,
        };
        let rendered = self.renderer.render(&view, camera);

        self.advance(time.dt_ms);
        rendered
    }
}

fn build_surface(options: &GlobeOptions, radius: f32, factory: &dyn GlowFactory) -> GlobeSurface {
    let geometry = Geometry::Sphere {
        radius,
        segments: options.globe.segments,
    };
    let glow = options.globe.enable_glow.then(|| {
        factory.create_glow(
            &geometry,
            GlowParams {
                color: options.globe.glow_color,
                coefficient: options.globe.glow_coefficient,
                power: options.globe.glow_power,
                size: radius * options.globe.glow_radius_scale,
                backside: true,
            },
        )
    });
    GlobeSurface {
        radius,
        segments: options.globe.segments,
        texture: TextureState::Pending,
        glow,
    }
}

/// Deliver `event` now if the globe is free, otherwise queue it for the next
/// tick.
pub fn dispatch_event<R: Renderer>(
    globe: &Rc<RefCell<Globe<R>>>,
    queue: &EventQueue,
    event: GlobeEvent,
) {
    match globe.try_borrow_mut() {
        Ok(mut g) => g.handle_event(event),
        Err(_) => queue.push(event),
    }
}

/// Drive `globe` from `source` until the returned loop is dropped.
pub fn run_globe<R: Renderer + 'static>(
    globe: Rc<RefCell<Globe<R>>>,
    source: Rc<dyn FrameSource>,
) -> RenderLoop {
    RenderLoop::start(source, move |time| match globe.try_borrow_mut() {
        Ok(mut g) => g.tick(time),
        Err(_) => {
            log::warn!("[loop] globe busy, frame {} skipped", time.index);
            Ok(())
        }
    })
}
