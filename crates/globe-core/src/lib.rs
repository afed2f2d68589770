pub mod camera;
pub mod color;
pub mod constants;
pub mod coords;
pub mod easing;
pub mod error;
pub mod globe;
pub mod glow;
pub mod interaction;
pub mod markers;
pub mod options;
pub mod orbit;
pub mod picking;
pub mod render_loop;
pub mod scene;
pub mod tween;

#[cfg(feature = "gpu")]
pub mod gpu;
#[cfg(feature = "gpu")]
pub static SCENE_WGSL: &str = include_str!("../shaders/scene.wgsl");

pub use camera::{Camera, CameraController, CameraMode, FocusState};
pub use color::Color;
pub use coords::{project, unproject, Coordinates, Position};
pub use easing::{Curve, EaseMode, Easing};
pub use error::GlobeError;
pub use globe::{dispatch_event, run_globe, EventQueue, Globe, GlobeEvent};
pub use glow::{Geometry, GlowFactory, GlowParams, GlowShell, ShellGlowFactory};
pub use interaction::{reduce, HoverAction, HoverSink, HoverState, HoverTransition};
pub use markers::{
    keep_valid_markers, LinearScale, Marker, MarkerField, MarkerMesh, MarkerObjectId,
    MarkerRenderObject,
};
pub use options::{
    CameraOptions, FocusOptions, GlobeOptions, GlobeTextureOptions, LightOptions, MarkerOptions,
    MarkerRenderer, OptionValue,
};
pub use picking::{Interactable, InteractionLayer, PointerHit, RayPicker, Viewport};
pub use render_loop::{FrameSource, FrameTime, FrameToken, PumpFrameSource, RenderLoop};
pub use scene::{
    AssetLoader, BlankLoader, GlobeSurface, Lights, Renderer, SceneView, TextureData, TextureSlot,
    TextureState,
};
pub use tween::{ScaleTweens, Tween};
