#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use globe_core::render_loop::FrameCallback;
use globe_core::{
    AssetLoader, Camera, Color, FrameSource, FrameToken, GlobeError, Renderer, SceneView,
    TextureData, TextureSlot,
};

/// What one `render` call saw.
#[derive(Clone, Debug)]
pub struct Frame {
    pub eye: glam::Vec3,
    pub view_projection: glam::Mat4,
    pub light_position: glam::Vec3,
    pub marker_scales: Vec<f32>,
    pub marker_count: usize,
    pub textured: bool,
}

#[derive(Default)]
pub struct RecordingRenderer {
    pub frames: Vec<Frame>,
    pub sizes: Vec<(u32, u32)>,
    pub clear_color: Option<Color>,
    pub fail_next: bool,
}

impl Renderer for RecordingRenderer {
    fn render(&mut self, scene: &SceneView<'_>, camera: &Camera) -> Result<(), GlobeError> {
        self.frames.push(Frame {
            eye: camera.eye,
            view_projection: camera.view_projection(),
            light_position: scene.lights.point_position,
            marker_scales: scene.markers.iter().map(|m| m.scale).collect(),
            marker_count: scene.markers.len(),
            textured: matches!(scene.globe.texture, globe_core::TextureState::Ready(_)),
        });
        if std::mem::take(&mut self.fail_next) {
            return Err(GlobeError::Render("device lost".into()));
        }
        Ok(())
    }

    fn set_size(&mut self, width: u32, height: u32) {
        self.sizes.push((width, height));
    }

    fn set_clear_color(&mut self, color: Color) {
        self.clear_color = Some(color);
    }
}

/// Completes loads synchronously, or fails them when `fail` is set.
#[derive(Clone, Default)]
pub struct InstantLoader {
    pub fail: bool,
    pub requested: Rc<RefCell<Vec<String>>>,
}

impl AssetLoader for InstantLoader {
    fn load(&mut self, url: &str, slot: TextureSlot) {
        self.requested.borrow_mut().push(url.to_string());
        if self.fail {
            slot.complete(Err(GlobeError::AssetLoad {
                url: url.to_string(),
                reason: "not found".into(),
            }));
        } else {
            slot.complete(TextureData::new(2, 1, vec![255; 8]));
        }
    }
}

/// Frame source that records requests and cancellations; `fire` runs the
/// pending callback.
#[derive(Default)]
pub struct ManualFrameSource {
    next: Cell<u64>,
    pending: RefCell<Option<(FrameToken, FrameCallback)>>,
    pub cancelled: RefCell<Vec<FrameToken>>,
    pub requests: Cell<u32>,
}

impl ManualFrameSource {
    pub fn fire(&self, now_ms: f64) -> bool {
        let next = self.pending.borrow_mut().take();
        match next {
            Some((_, callback)) => {
                callback(now_ms);
                true
            }
            None => false,
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.borrow().is_some()
    }
}

impl FrameSource for ManualFrameSource {
    fn request_frame(&self, callback: FrameCallback) -> FrameToken {
        let token = FrameToken(self.next.get());
        self.next.set(token.0 + 1);
        self.requests.set(self.requests.get() + 1);
        *self.pending.borrow_mut() = Some((token, callback));
        token
    }

    fn cancel_frame(&self, token: FrameToken) {
        self.cancelled.borrow_mut().push(token);
        let mut pending = self.pending.borrow_mut();
        if pending.as_ref().is_some_and(|(t, _)| *t == token) {
            *pending = None;
        }
    }
}

pub fn assert_close(a: f32, b: f32, eps: f32) {
    let diff = (a - b).abs();
    assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
}
