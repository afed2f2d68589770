use crate::color::Color;

// Shared scene tuning constants used by both web and native frontends.

// Globe geometry
pub const RADIUS: f32 = 300.0; // world-space globe radius
pub const GLOBE_SEGMENTS: u32 = 50;
pub const MARKER_SEGMENTS: u32 = 10;

// Markers
pub const MARKER_DEFAULT_COLOR: Color = Color::GOLD;

// Hover animation
pub const HOVER_SCALE_IDLE: f32 = 1.0;
pub const HOVER_ANIMATION_MS: f64 = 200.0;

// Camera projection
pub const CAMERA_FOV_DEGREES: f32 = 45.0;
pub const CAMERA_NEAR: f32 = 1.0;
pub const CAMERA_FAR: f32 = RADIUS * 100.0;

// Orbit control
pub const FRAME_MS: f64 = 1000.0 / 60.0; // nominal frame used to normalise damping
pub const POLAR_EPSILON: f32 = 1e-4; // keeps the orbit off the poles
pub const ZOOM_STEP: f32 = 0.95; // dolly factor per wheel notch at zoom_speed 1
pub const WHEEL_NOTCH: f32 = 100.0; // wheel delta units per notch

// Initial look-at (Singapore)
pub const DEFAULT_LOOK_AT: [f64; 2] = [1.3521, 103.8198];
