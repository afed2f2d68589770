//! Camera state and the focus/orbit state machine that moves it.

use glam::{Mat4, Vec3};

use crate::constants::{CAMERA_FAR, CAMERA_NEAR};
use crate::coords::{project, Coordinates};
use crate::easing::Easing;
use crate::error::GlobeError;
use crate::options::{CameraOptions, FocusOptions};
use crate::orbit::OrbitControls;
use crate::tween::Tween;

/// Simple right-handed camera description with perspective projection.
#[derive(Clone, Debug)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub aspect: f32,
    pub fovy_radians: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl Camera {
    pub fn looking_at_origin(eye: Vec3, aspect: f32, fovy_radians: f32) -> Self {
        Self {
            eye,
            target: Vec3::ZERO,
            up: Vec3::Y,
            aspect,
            fovy_radians,
            znear: CAMERA_NEAR,
            zfar: CAMERA_FAR,
        }
    }

    /// Compute the clip-space projection matrix.
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fovy_radians, self.aspect, self.znear, self.zfar)
    }
    /// Compute the view matrix that transforms world to view space.
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.view_up())
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    pub fn forward(&self) -> Vec3 {
        (self.target - self.eye).normalize_or_zero()
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(self.view_up()).normalize_or_zero()
    }

    /// `up`, or an axis orthogonal to it when looking straight along it
    /// (a camera parked over a pole).
    fn view_up(&self) -> Vec3 {
        let up = self.up.try_normalize().unwrap_or(Vec3::Y);
        if self.forward().cross(up).length_squared() > 1e-10 {
            up
        } else {
            up.any_orthonormal_vector()
        }
    }

    /// Camera-space up, orthogonal to `forward` and `right`.
    pub fn up_axis(&self) -> Vec3 {
        self.right().cross(self.forward())
    }
}

/// An in-flight camera move towards a focus point, or back to the default
/// orbit when `target` is `None`.
#[derive(Clone, Debug)]
pub struct FocusState {
    target: Option<Coordinates>,
    distance: f32,
    tween: Tween<Vec3>,
}

impl FocusState {
    pub fn target(&self) -> Option<Coordinates> {
        self.target
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn destination(&self) -> Vec3 {
        self.tween.to()
    }

    pub fn progress(&self) -> f32 {
        self.tween.progress()
    }
}

#[derive(Clone, Debug)]
pub enum CameraMode {
    Free,
    Focusing(FocusState),
}

pub struct CameraController {
    camera: Camera,
    orbit: OrbitControls,
    mode: CameraMode,
    default_distance: f32,
    focus_options: FocusOptions,
    globe_radius: f32,
    /// Camera direction before the first focus, restored by `clear_focus`.
    pre_focus: Option<Vec3>,
    focused: Option<Coordinates>,
}

impl CameraController {
    pub fn new(
        camera_options: &CameraOptions,
        focus_options: FocusOptions,
        globe_radius: f32,
        aspect: f32,
    ) -> Self {
        let default_distance = globe_radius * camera_options.distance_radius_scale;
        let camera = Camera::looking_at_origin(
            Vec3::new(0.0, 0.0, default_distance),
            aspect,
            camera_options.fov_degrees.to_radians(),
        );
        let mut orbit = OrbitControls::new(camera_options, globe_radius);
        orbit.sync_from_position(camera.eye);
        Self {
            camera,
            orbit,
            mode: CameraMode::Free,
            default_distance,
            focus_options,
            globe_radius,
            pre_focus: None,
            focused: None,
        }
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn mode(&self) -> &CameraMode {
        &self.mode
    }

    pub fn is_focusing(&self) -> bool {
        matches!(self.mode, CameraMode::Focusing(_))
    }

    /// Coordinates of the focus currently applied (or being animated to).
    pub fn focused(&self) -> Option<Coordinates> {
        self.focused
    }

    pub fn orbit(&self) -> &OrbitControls {
        &self.orbit
    }

    pub fn default_distance(&self) -> f32 {
        self.default_distance
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.camera.aspect = aspect;
        }
    }

    /// Place the camera above `coordinates` at the default distance.
    pub fn look_at(&mut self, coordinates: Coordinates) {
        let eye = project(coordinates, self.default_distance);
        self.camera.eye = eye;
        self.orbit.sync_from_position(eye);
        self.orbit.set_auto_rotate_paused(false);
        self.mode = CameraMode::Free;
        self.pre_focus = None;
        self.focused = None;
    }

    /// Focus with the configured distance, duration and easing.
    pub fn focus_default(&mut self, coordinates: Coordinates) -> Result<(), GlobeError> {
        let distance = self.globe_radius * self.focus_options.distance_radius_scale;
        let duration = self.focus_options.animation_duration_ms;
        let easing = self.focus_options.easing;
        self.focus(coordinates, distance, duration, easing)
    }

    pub fn focus(
        &mut self,
        coordinates: Coordinates,
        distance: f32,
        duration_ms: f64,
        easing: Easing,
    ) -> Result<(), GlobeError> {
        if !(distance.is_finite() && distance > 0.0) {
            return Err(GlobeError::InvalidFocusDistance(distance as f64));
        }
        let destination = project(coordinates, distance);
        if self.pre_focus.is_none() {
            self.pre_focus = Some(self.camera.eye);
        }
        self.focused = Some(coordinates);
        self.orbit.set_auto_rotate_paused(true);
        log::info!(
            "[focus] ({:.4},{:.4}) at distance {:.1} over {}ms",
            coordinates.lat(),
            coordinates.lon(),
            distance,
            duration_ms
        );
        self.transition(Some(coordinates), distance, destination, duration_ms, easing);
        Ok(())
    }

    /// Return to the default orbit distance along the pre-focus direction.
    /// Does nothing when no focus was ever applied.
    pub fn clear_focus(&mut self) {
        let Some(before) = self.pre_focus.take() else {
            return;
        };
        self.focused = None;
        let dir = before
            .try_normalize()
            .or_else(|| self.camera.eye.try_normalize())
            .unwrap_or(Vec3::Z);
        let destination = dir * self.default_distance;
        let duration_ms = if self.focus_options.enable_defocus {
            self.focus_options.animation_duration_ms
        } else {
            0.0
        };
        log::info!("[focus] cleared, returning to default orbit");
        let easing = self.focus_options.easing;
        self.transition(None, self.default_distance, destination, duration_ms, easing);
    }

    fn transition(
        &mut self,
        target: Option<Coordinates>,
        distance: f32,
        destination: Vec3,
        duration_ms: f64,
        easing: Easing,
    ) {
        self.orbit.stop();
        if duration_ms <= 0.0 {
            self.park(target.is_none(), destination);
            return;
        }
        let tween = Tween::new(self.camera.eye, destination, duration_ms, easing);
        self.mode = CameraMode::Focusing(FocusState {
            target,
            distance,
            tween,
        });
    }

    fn park(&mut self, defocused: bool, eye: Vec3) {
        self.camera.eye = eye;
        self.orbit.sync_from_position(eye);
        if defocused {
            self.orbit.set_auto_rotate_paused(false);
        }
        self.mode = CameraMode::Free;
    }

    /// Queue an orbit drag. Ignored while a focus animation runs.
    pub fn rotate(&mut self, dx: f32, dy: f32, viewport_height: f32) -> bool {
        if self.is_focusing() {
            log::debug!("[focus] rotate ignored while animating");
            return false;
        }
        self.orbit.rotate(dx, dy, viewport_height);
        true
    }

    /// Queue a dolly. Ignored while a focus animation runs.
    pub fn zoom(&mut self, delta_y: f32) -> bool {
        if self.is_focusing() {
            log::debug!("[focus] zoom ignored while animating");
            return false;
        }
        self.orbit.zoom(delta_y);
        true
    }

    /// Advance the focus animation, or the orbit when no animation runs.
    pub fn update(&mut self, dt_ms: f64) {
        let finished = match &mut self.mode {
            CameraMode::Focusing(state) => {
                self.camera.eye = state.tween.advance(dt_ms);
                state
                    .tween
                    .is_finished()
                    .then(|| (state.target.is_none(), state.tween.to()))
            }
            CameraMode::Free => {
                self.camera.eye = self.orbit.update(dt_ms);
                None
            }
        };
        if let Some((defocused, eye)) = finished {
            log::debug!("[focus] settled at {:?}", eye);
            self.park(defocused, eye);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Camera, CameraController};
    use crate::coords::{project, Coordinates};
    use crate::easing::Easing;
    use crate::error::GlobeError;
    use crate::options::{CameraOptions, FocusOptions};
    use glam::Vec3;

    const R: f32 = 100.0;

    fn controller() -> CameraController {
        let camera = CameraOptions {
            enable_auto_rotate: false,
            ..CameraOptions::default()
        };
        CameraController::new(&camera, FocusOptions::default(), R, 1.0)
    }

    fn c(lat: f64, lon: f64) -> Coordinates {
        Coordinates::new(lat, lon).unwrap()
    }

    #[test]
    fn basis_is_orthonormal() {
        let cam = Camera::looking_at_origin(Vec3::new(3.0, 4.0, 5.0), 1.5, 0.8);
        assert!((cam.forward().length() - 1.0).abs() < 1e-5);
        assert!(cam.forward().dot(cam.right()).abs() < 1e-5);
        assert!(cam.forward().dot(cam.up_axis()).abs() < 1e-5);
        assert!(cam.up_axis().y > 0.0);
    }

    #[test]
    fn look_at_places_camera_at_default_distance() {
        let mut ctl = controller();
        ctl.look_at(c(0.0, 0.0));
        assert!((ctl.camera().eye - Vec3::new(300.0, 0.0, 0.0)).length() < 1e-3);
        ctl.update(16.0);
        assert!((ctl.camera().eye - Vec3::new(300.0, 0.0, 0.0)).length() < 1e-2);
    }

    #[test]
    fn zero_duration_focus_lands_exactly() {
        let mut ctl = controller();
        let target = c(10.0, 20.0);
        ctl.focus(target, 2.0 * R, 0.0, Easing::LINEAR).unwrap();
        assert!(!ctl.is_focusing());
        assert_eq!(ctl.camera().eye, project(target, 2.0 * R));
    }

    #[test]
    fn rejects_bad_distance() {
        let mut ctl = controller();
        assert_eq!(
            ctl.focus(c(0.0, 0.0), 0.0, 100.0, Easing::LINEAR),
            Err(GlobeError::InvalidFocusDistance(0.0))
        );
        assert!(ctl.focus(c(0.0, 0.0), f32::NAN, 100.0, Easing::LINEAR).is_err());
        assert!(!ctl.is_focusing());
    }

    #[test]
    fn animated_focus_blocks_orbit_then_parks() {
        let mut ctl = controller();
        ctl.look_at(c(0.0, 0.0));
        let target = c(0.0, 90.0);
        ctl.focus(target, 150.0, 1000.0, Easing::LINEAR).unwrap();
        assert!(ctl.is_focusing());
        assert!(!ctl.rotate(50.0, 0.0, 500.0));
        assert!(!ctl.zoom(-100.0));

        ctl.update(500.0);
        let mid = ctl.camera().eye;
        assert!((mid - Vec3::new(150.0, 0.0, -75.0)).length() < 1e-2);

        ctl.update(600.0);
        assert!(!ctl.is_focusing());
        assert!((ctl.camera().eye - project(target, 150.0)).length() < 1e-3);
        assert!((ctl.orbit().distance() - 150.0).abs() < 1e-3);
        assert!(ctl.rotate(1.0, 0.0, 500.0));
    }

    #[test]
    fn refocus_starts_from_interrupted_position() {
        let mut ctl = controller();
        ctl.look_at(c(0.0, 0.0));
        ctl.focus(c(0.0, 90.0), 150.0, 1000.0, Easing::LINEAR).unwrap();
        ctl.update(250.0);
        let interrupted = ctl.camera().eye;

        ctl.focus(c(45.0, 0.0), 200.0, 1000.0, Easing::LINEAR).unwrap();
        ctl.update(0.0);
        assert!((ctl.camera().eye - interrupted).length() < 1e-4);
    }

    #[test]
    fn clear_focus_returns_along_prior_direction() {
        let mut ctl = controller();
        ctl.clear_focus();
        assert!(!ctl.is_focusing());

        ctl.look_at(c(0.0, 0.0));
        ctl.focus(c(30.0, 60.0), 150.0, 0.0, Easing::LINEAR).unwrap();
        ctl.clear_focus();
        assert!(ctl.focused().is_none());
        ctl.update(2000.0);
        assert!(!ctl.is_focusing());
        assert!((ctl.camera().eye - Vec3::new(300.0, 0.0, 0.0)).length() < 1e-2);
    }

    #[test]
    fn pole_focus_keeps_a_finite_view() {
        for lat in [90.0, -90.0] {
            let mut ctl = controller();
            let target = c(lat, 0.0);
            ctl.focus(target, 450.0, 0.0, Easing::LINEAR).unwrap();
            let cam = ctl.camera();
            assert_eq!(cam.eye, project(target, 450.0));
            assert!(cam.view_projection().is_finite());
            assert!((cam.right().length() - 1.0).abs() < 1e-5);
            assert!(cam.forward().dot(cam.up_axis()).abs() < 1e-5);

            ctl.update(16.0);
            assert!(ctl.camera().eye.is_finite());
            assert!(ctl.camera().view_projection().is_finite());
        }
    }
}
