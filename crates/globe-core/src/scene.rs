//! What the engine hands to the platform: a per-frame scene view, and the
//! renderer and asset loader traits the frontends implement.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use glam::Vec3;

use crate::camera::Camera;
use crate::color::Color;
use crate::error::GlobeError;
use crate::glow::GlowShell;
use crate::markers::MarkerRenderObject;
use crate::options::LightOptions;

/// Decoded RGBA8 image.
#[derive(Clone, PartialEq, Eq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl fmt::Debug for TextureData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureData")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgba.len())
            .finish()
    }
}

impl TextureData {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, GlobeError> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || rgba.len() != expected {
            return Err(GlobeError::Render(format!(
                "texture {}x{} expects {} bytes, got {}",
                width,
                height,
                expected,
                rgba.len()
            )));
        }
        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    pub fn fits(&self, max_dimension: u32) -> bool {
        self.width <= max_dimension && self.height <= max_dimension
    }

    /// A box-filtered copy whose sides fit within `max_dimension`, keeping the
    /// aspect ratio. `None` when the texture already fits.
    pub fn fit_within(&self, max_dimension: u32) -> Option<TextureData> {
        let max_dimension = max_dimension.max(1);
        if self.fits(max_dimension) {
            return None;
        }
        let (w, h) = (self.width as u64, self.height as u64);
        let longest = w.max(h);
        let limit = max_dimension as u64;
        let out_w = (w * limit / longest).clamp(1, limit);
        let out_h = (h * limit / longest).clamp(1, limit);

        let mut rgba = Vec::with_capacity((out_w * out_h * 4) as usize);
        for oy in 0..out_h {
            let y0 = oy * h / out_h;
            let y1 = ((oy + 1) * h / out_h).max(y0 + 1);
            for ox in 0..out_w {
                let x0 = ox * w / out_w;
                let x1 = ((ox + 1) * w / out_w).max(x0 + 1);
                let mut sum = [0u64; 4];
                for y in y0..y1 {
                    let row = (y * w) as usize * 4;
                    for x in x0..x1 {
                        let i = row + x as usize * 4;
                        for (acc, &c) in sum.iter_mut().zip(&self.rgba[i..i + 4]) {
                            *acc += c as u64;
                        }
                    }
                }
                let n = (y1 - y0) * (x1 - x0);
                rgba.extend(sum.iter().map(|&acc| ((acc + n / 2) / n) as u8));
            }
        }
        Some(TextureData {
            width: out_w as u32,
            height: out_h as u32,
            rgba,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum TextureState {
    #[default]
    Pending,
    Ready(Rc<TextureData>),
    Failed(String),
}

#[derive(Clone, Debug)]
pub struct GlobeSurface {
    pub radius: f32,
    pub segments: u32,
    pub texture: TextureState,
    pub glow: Option<GlowShell>,
}

/// Lights resolved for the current camera.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lights {
    pub ambient: Color,
    pub point: Color,
    pub point_position: Vec3,
}

impl Lights {
    /// Place the point light relative to the camera, in globe radii along the
    /// camera's right, up and backward axes.
    pub fn follow_camera(options: &LightOptions, camera: &Camera, radius: f32) -> Self {
        let [sr, su, sb] = options.point_light_position_radius_scales;
        let back = -camera.forward();
        let offset = camera.right() * sr + camera.up_axis() * su + back * sb;
        Self {
            ambient: options
                .ambient_light_color
                .scaled(options.ambient_light_intensity),
            point: options
                .point_light_color
                .scaled(options.point_light_intensity),
            point_position: camera.eye + offset * radius,
        }
    }
}

/// Borrowed snapshot of everything drawn in one frame.
#[derive(Clone, Copy, Debug)]
pub struct SceneView<'a> {
    pub globe: &'a GlobeSurface,
    pub markers: &'a [MarkerRenderObject],
    pub lights: Lights,
    pub clear_color: Color,
}

pub trait Renderer {
    fn render(&mut self, scene: &SceneView<'_>, camera: &Camera) -> Result<(), GlobeError>;
    fn set_size(&mut self, width: u32, height: u32);
    fn set_clear_color(&mut self, color: Color);
}

/// One-shot mailbox a loader completes when an asset arrives.
#[derive(Clone, Default)]
pub struct TextureSlot {
    inner: Rc<RefCell<Option<Result<TextureData, GlobeError>>>>,
}

impl TextureSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the outcome. A slot that already holds a result keeps it.
    pub fn complete(&self, result: Result<TextureData, GlobeError>) {
        let mut inner = self.inner.borrow_mut();
        if inner.is_none() {
            *inner = Some(result);
        }
    }

    pub fn take(&self) -> Option<Result<TextureData, GlobeError>> {
        self.inner.borrow_mut().take()
    }
}

pub trait AssetLoader {
    fn load(&mut self, url: &str, slot: TextureSlot);
}

/// Completes every request immediately with a 1x1 white texel.
#[derive(Clone, Copy, Debug, Default)]
pub struct BlankLoader;

impl AssetLoader for BlankLoader {
    fn load(&mut self, _url: &str, slot: TextureSlot) {
        slot.complete(Ok(TextureData {
            width: 1,
            height: 1,
            rgba: vec![255; 4],
        }));
    }
}
