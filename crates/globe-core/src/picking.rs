//! Pointer hit-testing against scene objects.

use std::rc::Rc;

use glam::{Vec2, Vec3, Vec4};

use crate::camera::Camera;
use crate::markers::{Marker, MarkerObjectId};

/// Pointer-over callback registered on an [`Interactable`].
pub type HoverHandler = Rc<dyn Fn(&Marker, MarkerObjectId)>;

/// Capability shared by every pickable render object, default or custom.
pub trait Interactable {
    /// World-space bounding sphere used for hit-testing.
    fn hit_sphere(&self) -> (Vec3, f32);
    fn on_pointer_over(&mut self, handler: HoverHandler);
    /// Invoke every registered pointer-over handler.
    fn pointer_over(&self);
}

/// Drawable size in physical pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerHit {
    /// Index into the object slice passed to the picker.
    Object(usize),
    Nothing,
}

pub trait InteractionLayer {
    fn pointer_move(
        &mut self,
        pointer: Vec2,
        viewport: Viewport,
        camera: &Camera,
        objects: &[&dyn Interactable],
    ) -> PointerHit;
}

#[inline]
pub fn ray_sphere(ray_origin: Vec3, ray_dir: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let oc = ray_origin - center;
    let b = oc.dot(ray_dir);
    let c = oc.dot(oc) - radius * radius;
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let t = -b - disc.sqrt();
    (t >= 0.0).then_some(t)
}

/// World-space ray through the pixel `pointer` (origin top-left).
///
/// Returns `(ray_origin, ray_direction)`.
pub fn screen_to_world_ray(camera: &Camera, pointer: Vec2, viewport: Viewport) -> (Vec3, Vec3) {
    let width = viewport.width.max(1) as f32;
    let height = viewport.height.max(1) as f32;
    let ndc_x = (2.0 * pointer.x / width) - 1.0;
    let ndc_y = 1.0 - (2.0 * pointer.y / height);
    let inv = (camera.projection_matrix() * camera.view_matrix()).inverse();
    let p_far = inv * Vec4::new(ndc_x, ndc_y, 1.0, 1.0);
    let p1: Vec3 = p_far.truncate() / p_far.w;
    let ro = camera.eye;
    let rd = (p1 - ro).normalize_or_zero();
    (ro, rd)
}

/// Ray/sphere picking. The nearest hit wins and the globe body occludes
/// anything behind it.
#[derive(Clone, Copy, Debug)]
pub struct RayPicker {
    pub globe_radius: f32,
}

impl RayPicker {
    pub fn new(globe_radius: f32) -> Self {
        Self { globe_radius }
    }
}

impl InteractionLayer for RayPicker {
    fn pointer_move(
        &mut self,
        pointer: Vec2,
        viewport: Viewport,
        camera: &Camera,
        objects: &[&dyn Interactable],
    ) -> PointerHit {
        let (ro, rd) = screen_to_world_ray(camera, pointer, viewport);
        if rd == Vec3::ZERO {
            return PointerHit::Nothing;
        }
        let occluder = ray_sphere(ro, rd, Vec3::ZERO, self.globe_radius).unwrap_or(f32::MAX);

        let mut best: Option<(usize, f32)> = None;
        for (i, object) in objects.iter().enumerate() {
            let (center, radius) = object.hit_sphere();
            if let Some(t) = ray_sphere(ro, rd, center, radius) {
                if t <= occluder && best.map_or(true, |(_, bt)| t < bt) {
                    best = Some((i, t));
                }
            }
        }
        match best {
            Some((i, _)) => PointerHit::Object(i),
            None => PointerHit::Nothing,
        }
    }
}
