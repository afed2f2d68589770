//! Marker data and the render objects built from it.
//!
//! A marker batch is replaced wholesale: a new batch (or new options) stages a
//! freshly built [`MarkerSet`], and [`MarkerField::commit`] swaps it in at the
//! start of the next frame. Render objects are addressed by a generational
//! [`MarkerObjectId`] so ids from a discarded set never resolve.

use std::fmt;
use std::rc::Rc;

use glam::{Quat, Vec3};
use smallvec::SmallVec;

use crate::color::Color;
use crate::constants::{HOVER_SCALE_IDLE, MARKER_DEFAULT_COLOR, MARKER_SEGMENTS};
use crate::coords::{project, Coordinates, Position};
use crate::error::GlobeError;
use crate::glow::{Geometry, GlowFactory, GlowParams, GlowShell, ShellGlowFactory};
use crate::interaction::{HoverAction, HoverSink};
use crate::options::MarkerOptions;
use crate::picking::{HoverHandler, Interactable};

/// One data point supplied by the host.
#[derive(Clone, Debug, PartialEq)]
pub struct Marker {
    pub coordinates: Coordinates,
    pub value: f64,
    pub color: Option<Color>,
}

impl Marker {
    pub fn new(coordinates: Coordinates, value: f64) -> Self {
        Self {
            coordinates,
            value,
            color: None,
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    /// Build from loosely typed host fields. Missing coordinates fail
    /// validation; a missing value is kept as NaN and skipped at build time;
    /// an unrecognised color falls back to the default.
    pub fn from_parts(
        lat: Option<f64>,
        lon: Option<f64>,
        value: Option<f64>,
        color: Option<&str>,
    ) -> Result<Self, GlobeError> {
        let coordinates = Coordinates::new(lat.unwrap_or(f64::NAN), lon.unwrap_or(f64::NAN))?;
        let marker = Self::new(coordinates, value.unwrap_or(f64::NAN));
        Ok(match color.and_then(Color::parse) {
            Some(color) => marker.with_color(color),
            None => marker,
        })
    }
}

/// Keep the markers that parsed and log the rest, so one malformed entry
/// never drops a whole batch.
pub fn keep_valid_markers(
    entries: impl IntoIterator<Item = Result<Marker, GlobeError>>,
) -> Vec<Marker> {
    entries
        .into_iter()
        .enumerate()
        .filter_map(|(i, entry)| match entry {
            Ok(marker) => Some(marker),
            Err(e) => {
                log::warn!("[markers] skipping entry {}: {}", i, e);
                None
            }
        })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerObjectId {
    generation: u32,
    slot: u32,
}

impl MarkerObjectId {
    pub fn new(generation: u32, slot: u32) -> Self {
        Self { generation, slot }
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn slot(&self) -> usize {
        self.slot as usize
    }
}

/// What gets drawn for one marker.
#[derive(Clone, Debug, PartialEq)]
pub struct MarkerMesh {
    pub geometry: Geometry,
    pub color: Color,
    pub glow: Option<GlowShell>,
}

/// Linear value -> size mapping over one marker batch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearScale {
    domain: (f64, f64),
    range: (f32, f32),
}

impl LinearScale {
    pub fn new(domain: (f64, f64), range: (f32, f32)) -> Self {
        Self { domain, range }
    }

    /// Domain spans the finite values; an empty batch collapses to `(0, 0)`.
    pub fn from_values(values: impl IntoIterator<Item = f64>, range: (f32, f32)) -> Self {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for v in values.into_iter().filter(|v| v.is_finite()) {
            lo = lo.min(v);
            hi = hi.max(v);
        }
        if lo > hi {
            lo = 0.0;
            hi = 0.0;
        }
        Self::new((lo, hi), range)
    }

    /// A collapsed domain maps every value to the midpoint of the range.
    pub fn scale(&self, value: f64) -> f32 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        let span = d1 - d0;
        if span == 0.0 || !span.is_finite() {
            return 0.5 * (r0 + r1);
        }
        let t = ((value - d0) / span) as f32;
        r0 + (r1 - r0) * t
    }
}

/// Visual representation of one marker. Owned by [`MarkerField`].
pub struct MarkerRenderObject {
    pub id: MarkerObjectId,
    /// Index of the source marker in its batch.
    pub marker_index: usize,
    pub marker: Marker,
    pub position: Position,
    /// Rotation taking local +Z to the outward surface normal.
    pub orientation: Quat,
    pub size: f32,
    /// Current hover scale, 1.0 when idle.
    pub scale: f32,
    pub mesh: MarkerMesh,
    handlers: SmallVec<[HoverHandler; 1]>,
}

impl MarkerRenderObject {
    /// Outward facing direction for flat geometry (local +Z).
    pub fn normal(&self) -> Vec3 {
        self.orientation * Vec3::Z
    }
}

impl fmt::Debug for MarkerRenderObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarkerRenderObject")
            .field("id", &self.id)
            .field("marker_index", &self.marker_index)
            .field("position", &self.position)
            .field("size", &self.size)
            .field("scale", &self.scale)
            .field("mesh", &self.mesh)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl Interactable for MarkerRenderObject {
    fn hit_sphere(&self) -> (Vec3, f32) {
        (self.position, self.mesh.geometry.bounding_radius() * self.scale)
    }

    fn on_pointer_over(&mut self, handler: HoverHandler) {
        self.handlers.push(handler);
    }

    fn pointer_over(&self) {
        for handler in &self.handlers {
            handler(&self.marker, self.id);
        }
    }
}

/// One generation of marker render objects.
#[derive(Debug, Default)]
pub struct MarkerSet {
    pub generation: u32,
    pub objects: Vec<MarkerRenderObject>,
    /// Markers dropped because their value was not finite.
    pub skipped: usize,
}

impl MarkerSet {
    pub fn get(&self, id: MarkerObjectId) -> Option<&MarkerRenderObject> {
        if id.generation != self.generation {
            return None;
        }
        self.objects.get(id.slot())
    }

    pub fn get_mut(&mut self, id: MarkerObjectId) -> Option<&mut MarkerRenderObject> {
        if id.generation != self.generation {
            return None;
        }
        self.objects.get_mut(id.slot())
    }
}

#[inline]
fn outward_orientation(position: Position) -> Quat {
    let normal = position.normalize_or_zero();
    if normal == Vec3::ZERO {
        Quat::IDENTITY
    } else {
        Quat::from_rotation_arc(Vec3::Z, normal)
    }
}

fn default_mesh(
    color: Color,
    size: f32,
    options: &MarkerOptions,
    glow_factory: &dyn GlowFactory,
) -> MarkerMesh {
    let geometry = Geometry::Sphere {
        radius: size,
        segments: MARKER_SEGMENTS,
    };
    let glow = options.enable_glow.then(|| {
        glow_factory.create_glow(
            &geometry,
            GlowParams {
                color,
                coefficient: options.glow_coefficient,
                power: options.glow_power,
                size: size * options.glow_radius_scale,
                backside: false,
            },
        )
    });
    MarkerMesh {
        geometry,
        color,
        glow,
    }
}

/// Build a complete marker set for `markers` on a globe of `radius`.
///
/// Each object is wired to report pointer-over to `sink`. Markers with a
/// non-finite value are skipped; the rest of the batch is still built.
pub fn build_marker_set(
    markers: &[Marker],
    options: &MarkerOptions,
    radius: f32,
    glow_factory: &dyn GlowFactory,
    generation: u32,
    sink: &HoverSink,
) -> MarkerSet {
    let (lo, hi) = options.radius_scale_range;
    let sizes = LinearScale::from_values(
        markers.iter().map(|m| m.value),
        (radius * lo, radius * hi),
    );

    let mut objects = Vec::with_capacity(markers.len());
    let mut skipped = 0usize;
    for (index, marker) in markers.iter().enumerate() {
        if !marker.value.is_finite() {
            log::warn!(
                "[markers] skipping marker {} at ({:.3},{:.3}): value {} is not finite",
                index,
                marker.coordinates.lat(),
                marker.coordinates.lon(),
                marker.value
            );
            skipped += 1;
            continue;
        }

        let color = marker.color.unwrap_or(MARKER_DEFAULT_COLOR);
        let size = sizes.scale(marker.value);
        let mesh = match &options.renderer {
            Some(render) => render(marker),
            None => default_mesh(color, size, options, glow_factory),
        };

        let height_offset = match options.offset_radius_scale {
            Some(scale) => radius * scale,
            None => size * (1.0 + options.glow_radius_scale) / 2.0,
        };
        let position = project(marker.coordinates, radius + height_offset);

        let id = MarkerObjectId::new(generation, objects.len() as u32);
        let mut object = MarkerRenderObject {
            id,
            marker_index: index,
            marker: marker.clone(),
            position,
            orientation: outward_orientation(position),
            size,
            scale: HOVER_SCALE_IDLE,
            mesh,
            handlers: SmallVec::new(),
        };
        let sink = sink.clone();
        object.on_pointer_over(Rc::new(move |marker: &Marker, id: MarkerObjectId| {
            sink.push(HoverAction::SetActiveMarker {
                marker: marker.clone(),
                object: id,
            });
        }));
        objects.push(object);
    }

    MarkerSet {
        generation,
        objects,
        skipped,
    }
}

/// Result of swapping a staged set in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarkerCommit {
    pub previous_generation: u32,
    pub generation: u32,
}

/// Owns the live marker render set and stages replacements.
pub struct MarkerField {
    radius: f32,
    options: MarkerOptions,
    glow_factory: Rc<dyn GlowFactory>,
    sink: HoverSink,
    source: Rc<[Marker]>,
    current: MarkerSet,
    staged: Option<MarkerSet>,
    next_generation: u32,
}

impl MarkerField {
    pub fn new(radius: f32, options: MarkerOptions, sink: HoverSink) -> Self {
        Self {
            radius,
            options,
            glow_factory: Rc::new(ShellGlowFactory),
            sink,
            source: Rc::from(Vec::new()),
            current: MarkerSet::default(),
            staged: None,
            next_generation: 1,
        }
    }

    pub fn with_glow_factory(mut self, factory: Rc<dyn GlowFactory>) -> Self {
        self.glow_factory = factory;
        self
    }

    pub fn options(&self) -> &MarkerOptions {
        &self.options
    }

    pub fn markers(&self) -> &Rc<[Marker]> {
        &self.source
    }

    /// Stage a rebuild if `markers` is a different batch than the current one.
    /// Returns `false` when the same batch is passed again.
    pub fn set_markers(&mut self, markers: Rc<[Marker]>) -> bool {
        if Rc::ptr_eq(&self.source, &markers) {
            return false;
        }
        self.source = markers;
        self.stage();
        true
    }

    pub fn set_options(&mut self, options: MarkerOptions) {
        self.options = options;
        self.stage();
    }

    pub fn set_glow_factory(&mut self, factory: Rc<dyn GlowFactory>) {
        self.glow_factory = factory;
        self.stage();
    }

    fn stage(&mut self) {
        let generation = self.next_generation;
        self.next_generation = self.next_generation.wrapping_add(1).max(1);
        let set = build_marker_set(
            &self.source,
            &self.options,
            self.radius,
            self.glow_factory.as_ref(),
            generation,
            &self.sink,
        );
        log::info!(
            "[markers] staged generation {} with {} objects ({} skipped)",
            generation,
            set.objects.len(),
            set.skipped
        );
        self.staged = Some(set);
    }

    pub fn has_staged(&self) -> bool {
        self.staged.is_some()
    }

    /// Swap the staged set in. Call between frames only.
    pub fn commit(&mut self) -> Option<MarkerCommit> {
        let set = self.staged.take()?;
        let previous = std::mem::replace(&mut self.current, set);
        Some(MarkerCommit {
            previous_generation: previous.generation,
            generation: self.current.generation,
        })
    }

    pub fn generation(&self) -> u32 {
        self.current.generation
    }

    pub fn objects(&self) -> &[MarkerRenderObject] {
        &self.current.objects
    }

    pub fn get(&self, id: MarkerObjectId) -> Option<&MarkerRenderObject> {
        self.current.get(id)
    }

    pub fn set_scale(&mut self, id: MarkerObjectId, scale: f32) -> bool {
        match self.current.get_mut(id) {
            Some(object) => {
                object.scale = scale;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        build_marker_set, keep_valid_markers, LinearScale, Marker, MarkerField, MarkerMesh,
        MarkerSet,
    };
    use crate::color::Color;
    use crate::coords::Coordinates;
    use crate::error::GlobeError;
    use crate::glow::{Geometry, ShellGlowFactory};
    use crate::interaction::{HoverAction, HoverSink};
    use crate::options::MarkerOptions;
    use crate::picking::Interactable;
    use glam::Vec3;
    use std::rc::Rc;

    fn marker(lat: f64, lon: f64, value: f64) -> Marker {
        Marker::new(Coordinates::new(lat, lon).unwrap(), value)
    }

    fn build(markers: &[Marker], options: &MarkerOptions, radius: f32) -> MarkerSet {
        build_marker_set(markers, options, radius, &ShellGlowFactory, 1, &HoverSink::default())
    }

    fn assert_close(a: f32, b: f32, eps: f32) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn linear_scale_maps_domain_onto_range() {
        let s = LinearScale::from_values([10.0, 50.0, 100.0], (10.0, 30.0));
        assert_close(s.scale(10.0), 10.0, 1e-5);
        assert_close(s.scale(100.0), 30.0, 1e-5);
        assert_close(s.scale(50.0), 10.0 + 20.0 * 40.0 / 90.0, 1e-4);
    }

    #[test]
    fn collapsed_domain_maps_to_midpoint() {
        let s = LinearScale::from_values([5.0, 5.0, 5.0], (10.0, 30.0));
        assert_eq!(s.scale(5.0), 20.0);
        let empty = LinearScale::from_values(std::iter::empty(), (1.0, 3.0));
        assert_eq!(empty.scale(7.0), 2.0);
    }

    #[test]
    fn sizes_follow_configured_range() {
        let radius = 100.0;
        let options = MarkerOptions {
            radius_scale_range: (0.1, 0.3),
            ..MarkerOptions::default()
        };
        let markers = [
            marker(0.0, 0.0, 10.0),
            marker(10.0, 10.0, 50.0),
            marker(20.0, 20.0, 100.0),
        ];
        let set = build(&markers, &options, radius);
        assert_eq!(set.objects.len(), 3);
        assert_close(set.objects[0].size, 10.0, 1e-4);
        assert_close(set.objects[2].size, 30.0, 1e-4);
        assert!(set.objects[1].size > 10.0 && set.objects[1].size < 30.0);
    }

    #[test]
    fn default_color_glow_and_derived_offset() {
        let radius = 100.0;
        let options = MarkerOptions::default();
        let set = build(&[marker(0.0, 0.0, 1.0)], &options, radius);
        let object = &set.objects[0];
        assert_eq!(object.mesh.color, Color::GOLD);

        let size = object.size;
        let glow = object.mesh.glow.expect("glow enabled by default");
        assert_close(glow.outer_radius - glow.inner_radius, size * options.glow_radius_scale, 1e-5);

        let expected_offset = size * (1.0 + options.glow_radius_scale) / 2.0;
        assert_close(object.position.length(), radius + expected_offset, 1e-3);
    }

    #[test]
    fn explicit_offset_wins_and_orientation_points_outward() {
        let options = MarkerOptions {
            offset_radius_scale: Some(0.1),
            enable_glow: false,
            ..MarkerOptions::default()
        };
        let set = build(&[marker(45.0, 30.0, 3.0).with_color(Color::WHITE)], &options, 200.0);
        let object = &set.objects[0];
        assert_close(object.position.length(), 220.0, 1e-3);
        assert!(object.mesh.glow.is_none());
        assert_eq!(object.mesh.color, Color::WHITE);

        assert!(object.normal().dot(object.position.normalize()) > 0.999);
        assert!((object.normal().length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn disc_normals_point_away_from_the_center() {
        let options = MarkerOptions {
            renderer: Some(Rc::new(|_: &Marker| MarkerMesh {
                geometry: Geometry::Disc { radius: 2.0 },
                color: Color::WHITE,
                glow: None,
            })),
            ..MarkerOptions::default()
        };
        let markers = [marker(90.0, 0.0, 1.0), marker(-45.0, 170.0, 1.0), marker(0.0, 0.0, 1.0)];
        let set = build(&markers, &options, 100.0);
        for object in &set.objects {
            let outward = object.position.normalize();
            assert!(object.normal().dot(outward) > 0.999, "{:?}", object.normal());
        }
        assert!((set.objects[2].normal() - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn custom_renderer_replaces_every_mesh() {
        let options = MarkerOptions {
            renderer: Some(Rc::new(|m: &Marker| MarkerMesh {
                geometry: Geometry::Disc { radius: m.value as f32 },
                color: Color::BLACK,
                glow: None,
            })),
            ..MarkerOptions::default()
        };
        let markers = [marker(0.0, 0.0, 2.0), marker(1.0, 1.0, 4.0)];
        let set = build(&markers, &options, 100.0);
        for (object, source) in set.objects.iter().zip(markers.iter()) {
            assert_eq!(object.mesh.geometry, Geometry::Disc { radius: source.value as f32 });
            assert_eq!(object.mesh.color, Color::BLACK);
        }
    }

    #[test]
    fn malformed_marker_is_skipped() {
        let markers = [
            marker(0.0, 0.0, 1.0),
            marker(5.0, 5.0, f64::NAN),
            marker(9.0, 9.0, 3.0),
        ];
        let options = MarkerOptions::default();
        let sink = HoverSink::default();
        let set = build_marker_set(&markers, &options, 100.0, &ShellGlowFactory, 4, &sink);
        assert_eq!(set.objects.len(), 2);
        assert_eq!(set.skipped, 1);
        assert_eq!(set.objects[1].marker_index, 2);
        assert_eq!(set.objects[1].id.slot(), 1);
        assert!(set.objects.iter().all(|o| o.size.is_finite()));
    }

    #[test]
    fn host_fields_build_markers_and_bad_entries_are_dropped() {
        let m = Marker::from_parts(Some(10.0), Some(20.0), Some(3.0), Some("#ff0000")).unwrap();
        assert_eq!((m.coordinates.lat(), m.coordinates.lon()), (10.0, 20.0));
        assert_eq!(m.value, 3.0);
        assert_eq!(m.color, Some(Color::from_hex(0xff0000)));

        let plain = Marker::from_parts(Some(0.0), Some(0.0), None, Some("nope")).unwrap();
        assert!(plain.value.is_nan());
        assert_eq!(plain.color, None);
        assert!(matches!(
            Marker::from_parts(None, Some(0.0), Some(1.0), None),
            Err(GlobeError::InvalidCoordinates { .. })
        ));

        let entries = vec![
            Marker::from_parts(Some(0.0), Some(0.0), Some(1.0), None),
            Marker::from_parts(None, None, Some(2.0), None),
            Marker::from_parts(Some(5.0), Some(200.0), Some(3.0), None),
            Marker::from_parts(Some(5.0), Some(5.0), Some(4.0), None),
        ];
        let kept = keep_valid_markers(entries);
        assert_eq!(kept.iter().map(|m| m.value).collect::<Vec<_>>(), [1.0, 4.0]);

        let set = build(&kept, &MarkerOptions::default(), 100.0);
        assert_eq!(set.objects.len(), 2);
    }

    #[test]
    fn pointer_over_reports_marker_and_object() {
        let sink = HoverSink::default();
        let markers = [marker(0.0, 0.0, 1.0)];
        let options = MarkerOptions::default();
        let set = build_marker_set(&markers, &options, 100.0, &ShellGlowFactory, 7, &sink);
        set.objects[0].pointer_over();
        let actions = sink.drain();
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            HoverAction::SetActiveMarker { marker, object } => {
                assert_eq!(marker.value, 1.0);
                assert_eq!(*object, set.objects[0].id);
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn rebuild_is_staged_until_commit() {
        let mut field = MarkerField::new(100.0, MarkerOptions::default(), HoverSink::default());
        let batch: Rc<[Marker]> = Rc::from(vec![marker(0.0, 0.0, 1.0)]);
        assert!(field.set_markers(batch.clone()));
        assert!(field.objects().is_empty());
        assert!(!field.set_markers(batch.clone()));

        let commit = field.commit().expect("staged set");
        assert_eq!(commit.previous_generation, 0);
        assert_eq!(field.objects().len(), 1);
        assert!(field.commit().is_none());

        let old_id = field.objects()[0].id;
        field.set_options(MarkerOptions {
            enable_glow: false,
            ..MarkerOptions::default()
        });
        field.commit();
        assert!(field.get(old_id).is_none());
        assert!(field.objects()[0].mesh.glow.is_none());
    }
}
