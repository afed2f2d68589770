use crate::color::Color;

/// Shape of a drawable, in its local frame (local +Z is its outward normal).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Geometry {
    Sphere { radius: f32, segments: u32 },
    /// Flat glyph facing local +Z.
    Disc { radius: f32 },
}

impl Geometry {
    /// Radius of the bounding sphere, used for hit-testing and glow sizing.
    pub fn bounding_radius(&self) -> f32 {
        match *self {
            Geometry::Sphere { radius, .. } | Geometry::Disc { radius } => radius,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlowParams {
    pub color: Color,
    pub coefficient: f32,
    pub power: f32,
    /// Extra radius added around the source geometry.
    pub size: f32,
    /// Render the inner side only (a halo around the silhouette).
    pub backside: bool,
}

/// Translucent shell drawn around a geometry. Purely decorative.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlowShell {
    pub inner_radius: f32,
    pub outer_radius: f32,
    pub color: Color,
    pub coefficient: f32,
    pub power: f32,
    pub backside: bool,
}

pub trait GlowFactory {
    fn create_glow(&self, geometry: &Geometry, params: GlowParams) -> GlowShell;
}

/// Grows the bounding sphere of the geometry by `params.size`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ShellGlowFactory;

impl GlowFactory for ShellGlowFactory {
    fn create_glow(&self, geometry: &Geometry, params: GlowParams) -> GlowShell {
        let inner = geometry.bounding_radius();
        GlowShell {
            inner_radius: inner,
            outer_radius: inner + params.size.max(0.0),
            color: params.color,
            coefficient: params.coefficient,
            power: params.power,
            backside: params.backside,
        }
    }
}
