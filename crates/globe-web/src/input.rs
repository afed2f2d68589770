use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec2;
use globe_core::{dispatch_event, EventQueue, Globe, GlobeEvent, Renderer};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys as web;

use crate::dom;

#[inline]
pub fn pointer_canvas_px(ev: &web::MouseEvent, canvas: &web::HtmlCanvasElement) -> Vec2 {
    let rect = canvas.get_bounding_client_rect();
    let x_css = ev.client_x() as f32 - rect.left() as f32;
    let y_css = ev.client_y() as f32 - rect.top() as f32;
    let w = (rect.width() as f32).max(1.0);
    let h = (rect.height() as f32).max(1.0);
    let sx = (x_css / w) * canvas.width() as f32;
    let sy = (y_css / h) * canvas.height() as f32;
    Vec2::new(sx, sy)
}

/// DOM listeners owned by one globe. Dropping removes them.
#[derive(Default)]
pub struct Listeners {
    entries: Vec<(web::EventTarget, &'static str, Closure<dyn FnMut(web::Event)>)>,
}

impl Listeners {
    pub fn add(
        &mut self,
        target: &web::EventTarget,
        kind: &'static str,
        handler: impl FnMut(web::Event) + 'static,
    ) {
        let closure = Closure::wrap(Box::new(handler) as Box<dyn FnMut(web::Event)>);
        let callback: &js_sys::Function = closure.as_ref().unchecked_ref();
        if let Err(e) = target.add_event_listener_with_callback(kind, callback) {
            log::warn!("[input] could not listen for {}: {:?}", kind, e);
            return;
        }
        self.entries.push((target.clone(), kind, closure));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Drop for Listeners {
    fn drop(&mut self) {
        for (target, kind, closure) in self.entries.drain(..) {
            let callback: &js_sys::Function = closure.as_ref().unchecked_ref();
            let _ = target.remove_event_listener_with_callback(kind, callback);
        }
    }
}

/// Route canvas pointer and wheel input, plus window resizes when
/// `responsive`, into the globe.
pub fn wire_input<R: Renderer + 'static>(
    canvas: &web::HtmlCanvasElement,
    globe: &Rc<RefCell<Globe<R>>>,
    queue: &EventQueue,
    responsive: bool,
) -> Listeners {
    let mut listeners = Listeners::default();
    let canvas_target: &web::EventTarget = canvas.as_ref();

    // pointermove
    {
        let (g, q, c) = (globe.clone(), queue.clone(), canvas.clone());
        listeners.add(canvas_target, "pointermove", move |ev| {
            if let Some(ev) = ev.dyn_ref::<web::MouseEvent>() {
                let p = pointer_canvas_px(ev, &c);
                dispatch_event(&g, &q, GlobeEvent::PointerMove { x: p.x, y: p.y });
            }
        });
    }

    // pointerdown
    {
        let (g, q, c) = (globe.clone(), queue.clone(), canvas.clone());
        listeners.add(canvas_target, "pointerdown", move |ev| {
            if let Some(ev) = ev.dyn_ref::<web::PointerEvent>() {
                let p = pointer_canvas_px(ev, &c);
                let _ = c.set_pointer_capture(ev.pointer_id());
                dispatch_event(&g, &q, GlobeEvent::PointerDown { x: p.x, y: p.y });
                ev.prevent_default();
            }
        });
    }

    // pointerup
    {
        let (g, q, c) = (globe.clone(), queue.clone(), canvas.clone());
        listeners.add(canvas_target, "pointerup", move |ev| {
            if let Some(ev) = ev.dyn_ref::<web::PointerEvent>() {
                let _ = c.release_pointer_capture(ev.pointer_id());
            }
            dispatch_event(&g, &q, GlobeEvent::PointerUp);
        });
    }

    // pointerleave
    {
        let (g, q) = (globe.clone(), queue.clone());
        listeners.add(canvas_target, "pointerleave", move |_| {
            dispatch_event(&g, &q, GlobeEvent::PointerLeave);
        });
    }

    // wheel
    {
        let (g, q) = (globe.clone(), queue.clone());
        listeners.add(canvas_target, "wheel", move |ev| {
            if let Some(ev) = ev.dyn_ref::<web::WheelEvent>() {
                ev.prevent_default();
                let delta_y = ev.delta_y() as f32;
                dispatch_event(&g, &q, GlobeEvent::Wheel { delta_y });
            }
        });
    }

    if responsive {
        if let Some(window) = web::window() {
            let (g, q, c) = (globe.clone(), queue.clone(), canvas.clone());
            listeners.add(window.as_ref(), "resize", move |_| {
                let (width, height) = dom::sync_canvas_backing_size(&c);
                dispatch_event(&g, &q, GlobeEvent::Resize { width, height });
            });
        }
    }

    log::info!("[input] {} listeners attached", listeners.len());
    listeners
}
