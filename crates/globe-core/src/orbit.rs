//! Damped orbit around a target point in spherical coordinates.
//!
//! `theta` is the azimuth measured from `+Z` towards `+X` and `phi` the polar
//! angle from `+Y`. Rotate and dolly input accumulate as deltas that decay
//! over successive updates, normalised to a 60 Hz frame so the feel does not
//! depend on the display rate.

use std::f32::consts::{PI, TAU};

use glam::Vec3;

use crate::constants::{FRAME_MS, POLAR_EPSILON, WHEEL_NOTCH, ZOOM_STEP};
use crate::options::CameraOptions;

#[derive(Clone, Debug)]
pub struct OrbitControls {
    pub target: Vec3,
    theta: f32,
    phi: f32,
    radius: f32,

    delta_theta: f32,
    delta_phi: f32,
    /// Pending dolly factor, 1.0 when idle.
    scale: f32,

    min_distance: f32,
    max_distance: f32,
    min_polar_angle: f32,
    max_polar_angle: f32,
    rotate_speed: f32,
    zoom_speed: f32,
    damping_factor: f32,
    enable_rotate: bool,
    enable_zoom: bool,
    auto_rotate: bool,
    auto_rotate_speed: f32,
    auto_rotate_paused: bool,
}

impl OrbitControls {
    pub fn new(options: &CameraOptions, globe_radius: f32) -> Self {
        Self {
            target: Vec3::ZERO,
            theta: 0.0,
            phi: PI / 2.0,
            radius: globe_radius * options.distance_radius_scale,
            delta_theta: 0.0,
            delta_phi: 0.0,
            scale: 1.0,
            min_distance: globe_radius * options.min_distance_radius_scale,
            max_distance: globe_radius * options.max_distance_radius_scale,
            min_polar_angle: options.min_polar_angle,
            max_polar_angle: options.max_polar_angle,
            rotate_speed: options.rotate_speed,
            zoom_speed: options.zoom_speed,
            damping_factor: options.damping_factor,
            enable_rotate: options.enable_rotate,
            enable_zoom: options.enable_zoom,
            auto_rotate: options.enable_auto_rotate,
            auto_rotate_speed: options.auto_rotate_speed,
            auto_rotate_paused: false,
        }
    }

    pub fn distance(&self) -> f32 {
        self.radius
    }

    pub fn distance_bounds(&self) -> (f32, f32) {
        (self.min_distance, self.max_distance)
    }

    pub fn polar_angle(&self) -> f32 {
        self.phi
    }

    pub fn azimuth(&self) -> f32 {
        self.theta
    }

    pub fn set_auto_rotate_paused(&mut self, paused: bool) {
        self.auto_rotate_paused = paused;
    }

    pub fn auto_rotate_active(&self) -> bool {
        self.auto_rotate && !self.auto_rotate_paused
    }

    /// Queue a drag of `(dx, dy)` pixels on a viewport `height` pixels tall.
    pub fn rotate(&mut self, dx: f32, dy: f32, height: f32) {
        if !self.enable_rotate {
            return;
        }
        let h = height.max(1.0);
        self.delta_theta -= TAU * dx / h * self.rotate_speed;
        self.delta_phi -= TAU * dy / h * self.rotate_speed;
    }

    /// Queue a wheel delta. Negative values move the camera closer.
    pub fn zoom(&mut self, delta_y: f32) {
        if !self.enable_zoom || delta_y == 0.0 || !delta_y.is_finite() {
            return;
        }
        let notches = (delta_y.abs() / WHEEL_NOTCH).max(1.0);
        let step = ZOOM_STEP.powf(self.zoom_speed * notches);
        if delta_y < 0.0 {
            self.scale *= step;
        } else {
            self.scale /= step;
        }
    }

    /// Drop pending input without moving.
    pub fn stop(&mut self) {
        self.delta_theta = 0.0;
        self.delta_phi = 0.0;
        self.scale = 1.0;
    }

    pub fn is_settled(&self) -> bool {
        self.delta_theta.abs() < 1e-6
            && self.delta_phi.abs() < 1e-6
            && (self.scale - 1.0).abs() < 1e-6
    }

    /// Re-derive spherical state from an externally placed camera.
    pub fn sync_from_position(&mut self, position: Vec3) {
        let offset = position - self.target;
        let r = offset.length();
        self.stop();
        if r <= f32::EPSILON {
            return;
        }
        self.radius = r;
        self.theta = offset.x.atan2(offset.z);
        self.phi = (offset.y / r)
            .clamp(-1.0, 1.0)
            .acos()
            .clamp(POLAR_EPSILON, PI - POLAR_EPSILON);
    }

    /// Advance damping by `dt_ms` and return the new camera position.
    pub fn update(&mut self, dt_ms: f64) -> Vec3 {
        let frames = (dt_ms / FRAME_MS).max(0.0) as f32;

        if self.auto_rotate_active() {
            self.theta -= TAU / 60.0 / 60.0 * self.auto_rotate_speed * frames;
        }

        let applied = if self.damping_factor <= 0.0 {
            1.0
        } else {
            1.0 - (1.0 - self.damping_factor).powf(frames)
        };
        let d_theta = self.delta_theta * applied;
        let d_phi = self.delta_phi * applied;
        self.delta_theta -= d_theta;
        self.delta_phi -= d_phi;
        self.theta = (self.theta + d_theta).rem_euclid(TAU);
        self.phi += d_phi;

        let lo = self.min_polar_angle.max(POLAR_EPSILON);
        let hi = self.max_polar_angle.min(PI - POLAR_EPSILON);
        self.phi = self.phi.clamp(lo, hi.max(lo));

        if (self.scale - 1.0).abs() > f32::EPSILON {
            let step = self.scale.powf(applied);
            self.scale /= step;
            self.radius = (self.radius * step).clamp(self.min_distance, self.max_distance);
        }
        if self.is_settled() {
            self.stop();
        }

        self.position()
    }

    pub fn position(&self) -> Vec3 {
        let sin_phi = self.phi.sin();
        self.target
            + Vec3::new(
                self.radius * sin_phi * self.theta.sin(),
                self.radius * self.phi.cos(),
                self.radius * sin_phi * self.theta.cos(),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::OrbitControls;
    use crate::options::CameraOptions;
    use glam::Vec3;

    const R: f32 = 100.0;

    fn still() -> OrbitControls {
        let options = CameraOptions {
            enable_auto_rotate: false,
            ..CameraOptions::default()
        };
        OrbitControls::new(&options, R)
    }

    #[test]
    fn sync_then_position_round_trips() {
        let mut orbit = still();
        let p = Vec3::new(120.0, 80.0, -150.0);
        orbit.sync_from_position(p);
        assert!((orbit.position() - p).length() < 1e-3);
        assert!((orbit.update(16.0) - p).length() < 1e-3);
    }

    #[test]
    fn zoom_is_clamped_to_distance_bounds() {
        let mut orbit = still();
        let (min, max) = orbit.distance_bounds();
        assert!((min - 110.0).abs() < 1e-3 && (max - 400.0).abs() < 1e-3);
        orbit.sync_from_position(Vec3::new(0.0, 0.0, 300.0));
        for _ in 0..200 {
            orbit.zoom(-100.0);
            orbit.update(16.0);
        }
        assert!((orbit.distance() - min).abs() < 1e-2);
        for _ in 0..400 {
            orbit.zoom(100.0);
            orbit.update(16.0);
        }
        assert!((orbit.distance() - max).abs() < 1e-2);
    }

    #[test]
    fn sync_over_a_pole_stays_off_the_axis() {
        let mut orbit = still();
        orbit.sync_from_position(Vec3::new(0.0, 450.0, 0.0));
        assert!(orbit.polar_angle() > 0.0);
        assert!((orbit.distance() - 450.0).abs() < 1e-3);
        let p = orbit.update(16.0);
        assert!(p.is_finite());
        assert!(p.x.hypot(p.z) > 0.0);

        orbit.sync_from_position(Vec3::new(0.0, -450.0, 0.0));
        assert!(orbit.polar_angle() < std::f32::consts::PI);
        assert!(orbit.update(16.0).is_finite());
    }

    #[test]
    fn rotation_decays_and_respects_poles() {
        let mut orbit = still();
        orbit.sync_from_position(Vec3::new(0.0, 0.0, 300.0));
        orbit.rotate(0.0, 5000.0, 600.0);
        for _ in 0..600 {
            orbit.update(16.0);
        }
        assert!(orbit.is_settled());
        assert!(orbit.polar_angle() > 0.0);
        assert!((orbit.distance() - 300.0).abs() < 1e-2);
    }

    #[test]
    fn auto_rotate_turns_and_can_pause() {
        let mut orbit = OrbitControls::new(&CameraOptions::default(), R);
        orbit.sync_from_position(Vec3::new(0.0, 0.0, 300.0));
        let before = orbit.azimuth();
        orbit.update(1000.0);
        assert!(orbit.azimuth() != before);

        orbit.set_auto_rotate_paused(true);
        let paused_at = orbit.azimuth();
        orbit.update(1000.0);
        assert_eq!(orbit.azimuth(), paused_at);
    }

    #[test]
    fn disabled_input_is_ignored() {
        let options = CameraOptions {
            enable_auto_rotate: false,
            enable_rotate: false,
            enable_zoom: false,
            ..CameraOptions::default()
        };
        let mut orbit = OrbitControls::new(&options, R);
        orbit.rotate(100.0, 100.0, 500.0);
        orbit.zoom(-300.0);
        assert!(orbit.is_settled());
    }
}
