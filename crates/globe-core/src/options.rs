//! Option structs recognised by the globe, with the defaults used when the
//! host leaves a field out.

use std::f32::consts::PI;
use std::fmt;
use std::rc::Rc;

use crate::color::Color;
use crate::constants::{CAMERA_FOV_DEGREES, DEFAULT_LOOK_AT, GLOBE_SEGMENTS, HOVER_ANIMATION_MS};
use crate::coords::Coordinates;
use crate::easing::Easing;
use crate::error::GlobeError;
use crate::markers::{Marker, MarkerMesh};

/// Hook that replaces default marker mesh construction for a whole batch.
pub type MarkerRenderer = Rc<dyn Fn(&Marker) -> MarkerMesh>;

/// A loosely typed option value handed over by a host, such as a field of a
/// JS options object.
#[derive(Clone, Debug, PartialEq)]
pub enum OptionValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Numbers(Vec<f64>),
}

impl OptionValue {
    fn number(&self, name: &'static str) -> Result<f64, GlobeError> {
        match self {
            OptionValue::Number(v) if v.is_finite() => Ok(*v),
            _ => Err(GlobeError::option(name, "expected a finite number")),
        }
    }

    fn float(&self, name: &'static str) -> Result<f32, GlobeError> {
        self.number(name).map(|v| v as f32)
    }

    fn count(&self, name: &'static str) -> Result<u32, GlobeError> {
        let v = self.number(name)?;
        if v < 0.0 || v > u32::MAX as f64 || v.fract() != 0.0 {
            return Err(GlobeError::option(name, "expected a whole number"));
        }
        Ok(v as u32)
    }

    fn flag(&self, name: &'static str) -> Result<bool, GlobeError> {
        match self {
            OptionValue::Bool(b) => Ok(*b),
            _ => Err(GlobeError::option(name, "expected a boolean")),
        }
    }

    fn text(&self, name: &'static str) -> Result<&str, GlobeError> {
        match self {
            OptionValue::Text(s) => Ok(s),
            _ => Err(GlobeError::option(name, "expected a string")),
        }
    }

    fn numbers<const N: usize>(&self, name: &'static str) -> Result<[f64; N], GlobeError> {
        match self {
            OptionValue::Numbers(v) if v.iter().all(|x| x.is_finite()) => v
                .as_slice()
                .try_into()
                .map_err(|_| GlobeError::option(name, format!("expected {} numbers", N))),
            _ => Err(GlobeError::option(name, format!("expected {} numbers", N))),
        }
    }

    fn color(&self, name: &'static str) -> Result<Color, GlobeError> {
        match self {
            OptionValue::Number(v) if *v >= 0.0 && *v <= 0xffffff as f64 => {
                Ok(Color::from_hex(*v as u32))
            }
            OptionValue::Text(s) => {
                Color::parse(s).ok_or_else(|| GlobeError::option(name, "unrecognised color"))
            }
            _ => Err(GlobeError::option(name, "expected a color")),
        }
    }

    /// `"Cubic.Out"`, `"Cubic Out"` or `"Cubic,Out"`.
    fn easing(&self, name: &'static str) -> Result<Easing, GlobeError> {
        let text = self.text(name)?;
        let mut parts = text
            .split(|c: char| c == '.' || c == ',' || c.is_whitespace())
            .filter(|p| !p.is_empty());
        let parsed = match (parts.next(), parts.next(), parts.next()) {
            (Some(curve), Some(mode), None) => Easing::from_names(curve, mode),
            (Some("Linear"), None, None) => Some(Easing::LINEAR),
            _ => None,
        };
        parsed.ok_or_else(|| GlobeError::option(name, format!("unknown easing `{}`", text)))
    }
}

/// `autoRotateSpeed` and `auto_rotate_speed` name the same field.
fn snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[derive(Clone, Debug, PartialEq)]
pub struct CameraOptions {
    pub auto_rotate_speed: f32,
    pub distance_radius_scale: f32,
    pub enable_auto_rotate: bool,
    pub enable_rotate: bool,
    pub enable_zoom: bool,
    pub max_distance_radius_scale: f32,
    pub min_distance_radius_scale: f32,
    pub max_polar_angle: f32,
    pub min_polar_angle: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub damping_factor: f32,
    pub fov_degrees: f32,
}

impl Default for CameraOptions {
    fn default() -> Self {
        Self {
            auto_rotate_speed: 0.1,
            distance_radius_scale: 3.0,
            enable_auto_rotate: true,
            enable_rotate: true,
            enable_zoom: true,
            max_distance_radius_scale: 4.0,
            min_distance_radius_scale: 1.1,
            max_polar_angle: PI,
            min_polar_angle: 0.0,
            rotate_speed: 0.2,
            zoom_speed: 1.0,
            damping_factor: 0.1,
            fov_degrees: CAMERA_FOV_DEGREES,
        }
    }
}

impl CameraOptions {
    pub fn validate(&self) -> Result<(), GlobeError> {
        if !(self.min_distance_radius_scale > 0.0) {
            return Err(GlobeError::option(
                "min_distance_radius_scale",
                "must be positive",
            ));
        }
        if self.max_distance_radius_scale < self.min_distance_radius_scale {
            return Err(GlobeError::option(
                "max_distance_radius_scale",
                "must not be below min_distance_radius_scale",
            ));
        }
        if !(self.distance_radius_scale > 0.0) {
            return Err(GlobeError::option("distance_radius_scale", "must be positive"));
        }
        if self.min_polar_angle < 0.0
            || self.max_polar_angle > PI
            || self.min_polar_angle > self.max_polar_angle
        {
            return Err(GlobeError::option(
                "polar_angle",
                "expected 0 <= min_polar_angle <= max_polar_angle <= PI",
            ));
        }
        if !(0.0..=1.0).contains(&self.damping_factor) {
            return Err(GlobeError::option("damping_factor", "must be within [0, 1]"));
        }
        if !(self.fov_degrees > 0.0 && self.fov_degrees < 180.0) {
            return Err(GlobeError::option("fov_degrees", "must be within (0, 180)"));
        }
        Ok(())
    }

    /// Overwrite one field by name. Returns `Ok(false)` for an unknown key.
    pub fn set(&mut self, key: &str, value: &OptionValue) -> Result<bool, GlobeError> {
        match snake_case(key).as_str() {
            "auto_rotate_speed" => self.auto_rotate_speed = value.float("auto_rotate_speed")?,
            "distance_radius_scale" => {
                self.distance_radius_scale = value.float("distance_radius_scale")?
            }
            "enable_auto_rotate" => self.enable_auto_rotate = value.flag("enable_auto_rotate")?,
            "enable_rotate" => self.enable_rotate = value.flag("enable_rotate")?,
            "enable_zoom" => self.enable_zoom = value.flag("enable_zoom")?,
            "max_distance_radius_scale" => {
                self.max_distance_radius_scale = value.float("max_distance_radius_scale")?
            }
            "min_distance_radius_scale" => {
                self.min_distance_radius_scale = value.float("min_distance_radius_scale")?
            }
            "max_polar_angle" => self.max_polar_angle = value.float("max_polar_angle")?,
            "min_polar_angle" => self.min_polar_angle = value.float("min_polar_angle")?,
            "rotate_speed" => self.rotate_speed = value.float("rotate_speed")?,
            "zoom_speed" => self.zoom_speed = value.float("zoom_speed")?,
            "damping_factor" => self.damping_factor = value.float("damping_factor")?,
            "fov_degrees" | "fov" => self.fov_degrees = value.float("fov_degrees")?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FocusOptions {
    pub animation_duration_ms: f64,
    pub distance_radius_scale: f32,
    pub easing: Easing,
    /// Animate back to the default orbit when focus is cleared.
    pub enable_defocus: bool,
}

impl Default for FocusOptions {
    fn default() -> Self {
        Self {
            animation_duration_ms: 1000.0,
            distance_radius_scale: 1.5,
            easing: Easing::CUBIC_OUT,
            enable_defocus: true,
        }
    }
}

impl FocusOptions {
    pub fn validate(&self) -> Result<(), GlobeError> {
        if !(self.animation_duration_ms >= 0.0) {
            return Err(GlobeError::option(
                "animation_duration_ms",
                "must be zero or positive",
            ));
        }
        if !(self.distance_radius_scale > 0.0) {
            return Err(GlobeError::option("distance_radius_scale", "must be positive"));
        }
        Ok(())
    }

    /// Overwrite one field by name. Returns `Ok(false)` for an unknown key.
    pub fn set(&mut self, key: &str, value: &OptionValue) -> Result<bool, GlobeError> {
        match snake_case(key).as_str() {
            "animation_duration" | "animation_duration_ms" => {
                self.animation_duration_ms = value.number("animation_duration_ms")?
            }
            "distance_radius_scale" => {
                self.distance_radius_scale = value.float("distance_radius_scale")?
            }
            "easing" | "easing_function" => self.easing = value.easing("easing")?,
            "enable_defocus" => self.enable_defocus = value.flag("enable_defocus")?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GlobeTextureOptions {
    pub texture: String,
    pub segments: u32,
    pub enable_glow: bool,
    pub glow_color: Color,
    pub glow_coefficient: f32,
    pub glow_power: f32,
    pub glow_radius_scale: f32,
}

impl Default for GlobeTextureOptions {
    fn default() -> Self {
        Self {
            texture: "globe.jpg".to_string(),
            segments: GLOBE_SEGMENTS,
            enable_glow: true,
            glow_color: Color::from_hex(0xd1d1d1),
            glow_coefficient: 0.1,
            glow_power: 3.0,
            glow_radius_scale: 0.2,
        }
    }
}

impl GlobeTextureOptions {
    /// Overwrite one field by name. Returns `Ok(false)` for an unknown key.
    pub fn set(&mut self, key: &str, value: &OptionValue) -> Result<bool, GlobeError> {
        match snake_case(key).as_str() {
            "texture" => self.texture = value.text("texture")?.to_string(),
            "segments" => self.segments = value.count("segments")?,
            "enable_glow" => self.enable_glow = value.flag("enable_glow")?,
            "glow_color" => self.glow_color = value.color("glow_color")?,
            "glow_coefficient" => self.glow_coefficient = value.float("glow_coefficient")?,
            "glow_power" => self.glow_power = value.float("glow_power")?,
            "glow_radius_scale" => self.glow_radius_scale = value.float("glow_radius_scale")?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

#[derive(Clone)]
pub struct MarkerOptions {
    pub active_scale: f32,
    pub animation_duration_ms: f64,
    pub enable_glow: bool,
    pub glow_coefficient: f32,
    pub glow_power: f32,
    pub glow_radius_scale: f32,
    /// Marker radius range as fractions of the globe radius.
    pub radius_scale_range: (f32, f32),
    /// Fixed height above the surface as a fraction of the globe radius.
    /// When absent the height is derived from marker size and glow scale.
    pub offset_radius_scale: Option<f32>,
    pub renderer: Option<MarkerRenderer>,
}

impl Default for MarkerOptions {
    fn default() -> Self {
        Self {
            active_scale: 1.3,
            animation_duration_ms: HOVER_ANIMATION_MS,
            enable_glow: true,
            glow_coefficient: 0.0,
            glow_power: 3.0,
            glow_radius_scale: 2.0,
            radius_scale_range: (0.005, 0.02),
            offset_radius_scale: None,
            renderer: None,
        }
    }
}

impl fmt::Debug for MarkerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarkerOptions")
            .field("active_scale", &self.active_scale)
            .field("animation_duration_ms", &self.animation_duration_ms)
            .field("enable_glow", &self.enable_glow)
            .field("glow_coefficient", &self.glow_coefficient)
            .field("glow_power", &self.glow_power)
            .field("glow_radius_scale", &self.glow_radius_scale)
            .field("radius_scale_range", &self.radius_scale_range)
            .field("offset_radius_scale", &self.offset_radius_scale)
            .field("renderer", &self.renderer.as_ref().map(|_| "custom"))
            .finish()
    }
}

impl MarkerOptions {
    pub fn validate(&self) -> Result<(), GlobeError> {
        let (lo, hi) = self.radius_scale_range;
        if !(lo >= 0.0 && hi >= lo && hi.is_finite()) {
            return Err(GlobeError::option(
                "radius_scale_range",
                "expected 0 <= min <= max",
            ));
        }
        if !(self.active_scale > 0.0) {
            return Err(GlobeError::option("active_scale", "must be positive"));
        }
        if !(self.animation_duration_ms >= 0.0) {
            return Err(GlobeError::option(
                "animation_duration_ms",
                "must be zero or positive",
            ));
        }
        if matches!(self.offset_radius_scale, Some(s) if !s.is_finite()) {
            return Err(GlobeError::option("offset_radius_scale", "must be finite"));
        }
        Ok(())
    }

    /// Overwrite one field by name. Returns `Ok(false)` for an unknown key.
    /// `renderer` is code, not data, and is never set this way.
    pub fn set(&mut self, key: &str, value: &OptionValue) -> Result<bool, GlobeError> {
        match snake_case(key).as_str() {
            "active_scale" => self.active_scale = value.float("active_scale")?,
            "animation_duration" | "animation_duration_ms" => {
                self.animation_duration_ms = value.number("animation_duration_ms")?
            }
            "enable_glow" => self.enable_glow = value.flag("enable_glow")?,
            "glow_coefficient" => self.glow_coefficient = value.float("glow_coefficient")?,
            "glow_power" => self.glow_power = value.float("glow_power")?,
            "glow_radius_scale" => self.glow_radius_scale = value.float("glow_radius_scale")?,
            "radius_scale_range" => {
                let [lo, hi] = value.numbers::<2>("radius_scale_range")?;
                self.radius_scale_range = (lo as f32, hi as f32);
            }
            "offset_radius_scale" => {
                self.offset_radius_scale = Some(value.float("offset_radius_scale")?)
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightOptions {
    pub ambient_light_color: Color,
    pub ambient_light_intensity: f32,
    pub point_light_color: Color,
    pub point_light_intensity: f32,
    /// Point light offset from the camera, in globe radii along the camera's
    /// right, up and backward axes.
    pub point_light_position_radius_scales: [f32; 3],
}

impl Default for LightOptions {
    fn default() -> Self {
        Self {
            ambient_light_color: Color::WHITE,
            ambient_light_intensity: 0.8,
            point_light_color: Color::WHITE,
            point_light_intensity: 1.0,
            point_light_position_radius_scales: [-2.0, 1.0, -1.0],
        }
    }
}

impl LightOptions {
    /// Overwrite one field by name. Returns `Ok(false)` for an unknown key.
    pub fn set(&mut self, key: &str, value: &OptionValue) -> Result<bool, GlobeError> {
        match snake_case(key).as_str() {
            "ambient_light_color" => self.ambient_light_color = value.color("ambient_light_color")?,
            "ambient_light_intensity" => {
                self.ambient_light_intensity = value.float("ambient_light_intensity")?
            }
            "point_light_color" => self.point_light_color = value.color("point_light_color")?,
            "point_light_intensity" => {
                self.point_light_intensity = value.float("point_light_intensity")?
            }
            "point_light_position_radius_scales" => {
                let scales = value.numbers::<3>("point_light_position_radius_scales")?;
                self.point_light_position_radius_scales = scales.map(|v| v as f32);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

/// Everything the globe recognises, merged with defaults.
#[derive(Clone, Debug)]
pub struct GlobeOptions {
    pub camera: CameraOptions,
    pub focus: FocusOptions,
    pub globe: GlobeTextureOptions,
    pub lights: LightOptions,
    pub markers: MarkerOptions,
    pub look_at: Coordinates,
    /// Fixed canvas size. Disables responsive resizing in the frontends.
    pub size: Option<(u32, u32)>,
    pub clear_color: Color,
}

impl Default for GlobeOptions {
    fn default() -> Self {
        let [lat, lon] = DEFAULT_LOOK_AT;
        Self {
            camera: CameraOptions::default(),
            focus: FocusOptions::default(),
            globe: GlobeTextureOptions::default(),
            lights: LightOptions::default(),
            markers: MarkerOptions::default(),
            look_at: Coordinates::from_const(lat, lon),
            size: None,
            clear_color: Color::WHITE,
        }
    }
}

impl GlobeOptions {
    pub fn validate(&self) -> Result<(), GlobeError> {
        self.camera.validate()?;
        self.focus.validate()?;
        self.markers.validate()?;
        if self.globe.segments < 3 {
            return Err(GlobeError::option("segments", "must be at least 3"));
        }
        if let Some((w, h)) = self.size {
            if w == 0 || h == 0 {
                return Err(GlobeError::option("size", "width and height must be non-zero"));
            }
        }
        Ok(())
    }

    /// Overwrite one field by dotted path: `"lookAt"`, `"clearColor"` and
    /// `"size"` at the top level, `"<section>.<field>"` for the `camera`,
    /// `focus`, `globe`, `lights` and `markers` sections.
    ///
    /// Returns `Ok(false)` for an unknown path. Nothing is validated across
    /// fields; call [`GlobeOptions::validate`] once every field is in.
    pub fn set(&mut self, path: &str, value: &OptionValue) -> Result<bool, GlobeError> {
        if let Some((section, key)) = path.split_once('.') {
            return match section {
                "camera" => self.camera.set(key, value),
                "focus" => self.focus.set(key, value),
                "globe" => self.globe.set(key, value),
                "lights" => self.lights.set(key, value),
                "markers" => self.markers.set(key, value),
                _ => Ok(false),
            };
        }
        match snake_case(path).as_str() {
            "look_at" => {
                let [lat, lon] = value.numbers::<2>("look_at")?;
                self.look_at = Coordinates::new(lat, lon)?;
            }
            "clear_color" | "background_color" => {
                self.clear_color = value.color("clear_color")?
            }
            "size" => {
                let [w, h] = value.numbers::<2>("size")?;
                if w < 0.0 || h < 0.0 || w > u32::MAX as f64 || h > u32::MAX as f64 {
                    return Err(GlobeError::option("size", "width and height out of range"));
                }
                self.size = Some((w as u32, h as u32));
            }
            "texture" => self.globe.texture = value.text("texture")?.to_string(),
            _ => return Ok(false),
        }
        Ok(true)
    }
}
