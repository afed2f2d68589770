mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use common::{assert_close, InstantLoader, ManualFrameSource, RecordingRenderer};
use globe_core::constants::RADIUS;
use globe_core::{
    dispatch_event, project, run_globe, BlankLoader, CameraOptions, Color, Coordinates, Easing,
    FrameSource, FrameTime, Globe, GlobeError, GlobeEvent, GlobeOptions, Marker, MarkerOptions,
    TextureState,
};

fn options() -> GlobeOptions {
    GlobeOptions {
        camera: CameraOptions {
            enable_auto_rotate: false,
            ..CameraOptions::default()
        },
        look_at: Coordinates::new(0.0, 0.0).unwrap(),
        size: Some((800, 800)),
        ..GlobeOptions::default()
    }
}

fn globe() -> Globe<RecordingRenderer> {
    Globe::new(options(), RecordingRenderer::default(), InstantLoader::default()).unwrap()
}

fn frame(index: u64, dt_ms: f64) -> FrameTime {
    FrameTime::new(index, index as f64 * 16.0, dt_ms)
}

fn equator_marker() -> Rc<[Marker]> {
    Rc::from(vec![Marker::new(Coordinates::new(0.0, 0.0).unwrap(), 42.0)])
}

#[test]
fn single_marker_sits_above_its_coordinates() {
    let mut g = globe();
    g.set_markers(equator_marker());
    assert!(g.markers().is_empty());
    g.tick(frame(0, 0.0)).unwrap();

    let markers = g.markers();
    assert_eq!(markers.len(), 1);
    let m = &markers[0];
    let opts = MarkerOptions::default();
    let size = RADIUS * (opts.radius_scale_range.0 + opts.radius_scale_range.1) / 2.0;
    assert_close(m.size, size, 1e-4);
    let offset = size * (1.0 + opts.glow_radius_scale) / 2.0;
    assert_close(m.position.x, RADIUS + offset, 1e-2);
    assert_close(m.position.y, 0.0, 1e-3);
    assert_close(m.position.z, 0.0, 1e-3);
    assert_eq!(m.mesh.color, Color::GOLD);
}

#[test]
fn hover_scales_up_then_back_down() {
    let mut g = globe();
    g.set_markers(equator_marker());
    g.tick(frame(0, 0.0)).unwrap();
    let id = g.markers()[0].id;

    g.pointer_move(400.0, 400.0);
    assert_eq!(g.hover_state().active_marker_object(), Some(id));
    assert_eq!(g.hover_state().active_marker().map(|m| m.value), Some(42.0));
    assert_eq!(g.scale_tweens().len(), 1);

    // a repeated hover on the same object starts nothing new
    g.tick(frame(1, 100.0)).unwrap();
    let mid = g.markers()[0].scale;
    assert!(mid > 1.0 && mid < 1.3);
    g.pointer_move(400.0, 400.0);
    assert_eq!(g.scale_tweens().get(id).map(|t| t.tween.from()), Some(1.0));

    g.tick(frame(2, 200.0)).unwrap();
    assert_close(g.markers()[0].scale, 1.3, 1e-6);
    assert!(g.scale_tweens().is_empty());

    g.pointer_move(5.0, 5.0);
    assert!(g.hover_state().active_marker().is_none());
    assert!(g.hover_state().active_marker_object().is_none());
    g.tick(frame(3, 250.0)).unwrap();
    assert_close(g.markers()[0].scale, 1.0, 1e-6);
}

#[test]
fn rebuild_clears_hover_and_stale_tweens() {
    let mut g = globe();
    g.set_markers(equator_marker());
    g.tick(frame(0, 0.0)).unwrap();
    g.pointer_move(400.0, 400.0);
    assert!(g.hover_state().is_active());

    let before = g.marker_field().generation();
    g.set_markers(equator_marker());
    assert!(g.marker_field().has_staged());
    g.tick(frame(1, 16.0)).unwrap();
    assert_eq!(g.marker_field().generation(), before + 1);
    assert!(!g.hover_state().is_active());
    assert!(g.scale_tweens().is_empty());
    assert_eq!(g.markers()[0].scale, 1.0);
}

#[test]
fn degenerate_batch_gets_midpoint_sizes() {
    let mut g = globe();
    let c = Coordinates::new(10.0, 10.0).unwrap();
    g.set_markers(Rc::from(vec![Marker::new(c, 7.0), Marker::new(c, 7.0)]));
    g.tick(frame(0, 0.0)).unwrap();
    let (lo, hi) = MarkerOptions::default().radius_scale_range;
    for m in g.markers() {
        assert_close(m.size, RADIUS * (lo + hi) / 2.0, 1e-4);
        assert!(m.size.is_finite());
    }
}

#[test]
fn scaling_spans_configured_range() {
    let mut g = globe();
    g.set_marker_options(MarkerOptions {
        radius_scale_range: (0.1, 0.3),
        ..MarkerOptions::default()
    })
    .unwrap();
    let markers: Vec<Marker> = [10.0, 50.0, 100.0]
        .iter()
        .enumerate()
        .map(|(i, v)| Marker::new(Coordinates::new(0.0, i as f64 * 30.0).unwrap(), *v))
        .collect();
    g.set_markers(Rc::from(markers));
    g.tick(frame(0, 0.0)).unwrap();
    let sizes: Vec<f32> = g.markers().iter().map(|m| m.size).collect();
    assert_close(sizes[0], 0.1 * RADIUS, 1e-3);
    assert_close(sizes[2], 0.3 * RADIUS, 1e-3);
    assert!(sizes[1] > sizes[0] && sizes[1] < sizes[2]);
}

#[test]
fn focus_and_refocus_through_the_globe() {
    let mut g = globe();
    let target = Coordinates::new(20.0, 40.0).unwrap();
    g.focus_with(target, 2.0 * RADIUS, 0.0, Easing::LINEAR).unwrap();
    assert_eq!(g.camera().eye, project(target, 2.0 * RADIUS));

    assert_eq!(
        g.focus_with(target, -1.0, 100.0, Easing::LINEAR),
        Err(GlobeError::InvalidFocusDistance(-1.0))
    );

    g.focus(Some(Coordinates::new(-10.0, 100.0).unwrap())).unwrap();
    g.tick(frame(0, 300.0)).unwrap();
    let interrupted = g.camera().eye;
    assert!(g.camera_controller().is_focusing());

    g.wheel(-500.0);
    g.pointer_down(0.0, 0.0);
    g.pointer_move(200.0, 50.0);
    g.pointer_up();

    g.focus(Some(Coordinates::new(50.0, -30.0).unwrap())).unwrap();
    g.tick(frame(1, 0.0)).unwrap();
    assert!((g.camera().eye - interrupted).length() < 1e-3);

    g.tick(frame(2, 5000.0)).unwrap();
    assert!(!g.camera_controller().is_focusing());
    let expected = project(Coordinates::new(50.0, -30.0).unwrap(), 1.5 * RADIUS);
    assert!((g.camera().eye - expected).length() < 1e-2);

    g.focus(None).unwrap();
    g.tick(frame(3, 5000.0)).unwrap();
    assert_close(g.camera().eye.length(), 3.0 * RADIUS, 1e-2);
}

#[test]
fn focusing_a_pole_renders_finite_frames() {
    let mut g = globe();
    g.set_markers(equator_marker());
    let pole = Coordinates::new(90.0, 0.0).unwrap();
    g.focus_with(pole, 450.0, 0.0, Easing::LINEAR).unwrap();
    assert_eq!(g.camera().eye, project(pole, 450.0));
    assert!(g.camera().view_projection().is_finite());

    g.tick(frame(0, 16.0)).unwrap();
    g.pointer_move(400.0, 400.0);
    g.tick(frame(1, 16.0)).unwrap();
    for f in &g.renderer().frames {
        assert!(f.eye.is_finite());
        assert!(f.view_projection.is_finite());
        assert!(f.light_position.is_finite());
    }
    assert!(!g.hover_state().is_active());
}

#[test]
fn texture_hook_fires_once_and_errors_surface() {
    let mut g = globe();
    let fired = Rc::new(Cell::new(0));
    let f = fired.clone();
    g.on_texture_loaded(move || f.set(f.get() + 1));
    assert_eq!(g.texture_state(), &TextureState::Pending);
    for i in 0..3 {
        g.tick(frame(i, 16.0)).unwrap();
    }
    assert_eq!(fired.get(), 1);
    assert!(g.renderer().frames.iter().all(|f| f.textured));
    assert_eq!(g.surface().radius, RADIUS);
    assert!(g.surface().glow.is_some());

    let loader = InstantLoader {
        fail: true,
        ..InstantLoader::default()
    };
    let mut g = Globe::new(options(), RecordingRenderer::default(), loader.clone()).unwrap();
    let errors = Rc::new(RefCell::new(Vec::new()));
    let e = errors.clone();
    g.on_asset_error(move |err| e.borrow_mut().push(err.clone()));
    g.tick(frame(0, 0.0)).unwrap();
    assert_eq!(errors.borrow().len(), 1);
    assert!(matches!(g.texture_state(), TextureState::Failed(_)));
    assert_eq!(loader.requested.borrow().as_slice(), ["globe.jpg"]);
}

#[test]
fn blank_loader_completes_on_first_tick() {
    let mut g = Globe::new(options(), RecordingRenderer::default(), BlankLoader).unwrap();
    g.tick(frame(0, 0.0)).unwrap();
    match g.texture_state() {
        TextureState::Ready(data) => assert_eq!((data.width, data.height), (1, 1)),
        other => panic!("unexpected texture state {:?}", other),
    }
    assert_eq!(g.renderer().clear_color, Some(Color::WHITE));
    assert_eq!(g.renderer().sizes, vec![(800, 800)]);
}

#[test]
fn invalid_options_are_rejected_up_front() {
    let mut bad = options();
    bad.focus.distance_radius_scale = 0.0;
    let result = Globe::new(bad, RecordingRenderer::default(), InstantLoader::default());
    assert!(matches!(result, Err(GlobeError::InvalidOption { .. })));
}

#[test]
fn render_error_does_not_skip_updates() {
    let mut g = globe();
    g.focus_with(Coordinates::new(0.0, 90.0).unwrap(), 450.0, 1000.0, Easing::LINEAR)
        .unwrap();
    g.renderer_mut().fail_next = true;
    assert!(g.tick(frame(0, 500.0)).is_err());
    assert!(g.camera_controller().orbit().distance() > 0.0);
    let eye = g.camera().eye;
    assert!((eye - project(Coordinates::new(0.0, 0.0).unwrap(), 900.0)).length() > 1.0);
}

#[test]
fn loop_drives_globe_and_stops_on_cancel() {
    let g = Rc::new(RefCell::new(globe()));
    let source = Rc::new(ManualFrameSource::default());
    let render_loop = run_globe(g.clone(), source.clone() as Rc<dyn FrameSource>);

    assert!(source.fire(0.0));
    assert!(source.fire(16.0));
    assert_eq!(g.borrow().renderer().frames.len(), 2);

    render_loop.cancel();
    render_loop.cancel();
    assert_eq!(source.cancelled.borrow().len(), 1);
    assert!(!source.has_pending());
    assert!(!source.fire(32.0));
    assert_eq!(g.borrow().renderer().frames.len(), 2);
}

#[test]
fn events_queue_while_globe_is_busy() {
    let g = Rc::new(RefCell::new(globe()));
    let queue = g.borrow().event_queue();
    {
        let _busy = g.borrow_mut();
        dispatch_event(&g, &queue, GlobeEvent::SetMarkers(equator_marker()));
        dispatch_event(&g, &queue, GlobeEvent::Resize { width: 400, height: 200 });
        let no_glow = MarkerOptions {
            enable_glow: false,
            ..MarkerOptions::default()
        };
        dispatch_event(&g, &queue, GlobeEvent::SetMarkerOptions(no_glow));
    }
    assert_eq!(queue.len(), 3);
    g.borrow_mut().tick(frame(0, 0.0)).unwrap();
    assert!(queue.is_empty());
    let g = g.borrow();
    assert_eq!(g.markers().len(), 1);
    assert!(g.markers()[0].mesh.glow.is_none());
    assert!(!g.options().markers.enable_glow);
    assert_eq!(g.viewport().width, 400);
    assert_close(g.camera().aspect, 2.0, 1e-6);
    assert_eq!(g.renderer().frames[0].marker_count, 1);
}
