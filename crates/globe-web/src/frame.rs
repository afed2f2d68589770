use std::cell::RefCell;
use std::rc::Rc;

use globe_core::render_loop::FrameCallback;
use globe_core::{FrameSource, FrameToken};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys as web;

const NO_REQUEST: FrameToken = FrameToken(u64::MAX);

type Pending = Rc<RefCell<Option<(FrameToken, FrameCallback)>>>;

/// `requestAnimationFrame` as a frame source. Tokens are the browser's
/// request ids.
///
/// One JS closure is created up front and handed to every request; the
/// pending callback lives on the Rust side, so a cancelled request leaves
/// nothing behind.
pub struct RafFrameSource {
    window: web::Window,
    pending: Pending,
    tick: Closure<dyn FnMut(f64)>,
}

impl RafFrameSource {
    pub fn new(window: web::Window) -> Self {
        let pending: Pending = Rc::new(RefCell::new(None));
        let p = pending.clone();
        let tick = Closure::wrap(Box::new(move |timestamp: f64| {
            // released before the call: the callback requests the next frame
            let next = p.borrow_mut().take();
            if let Some((_, callback)) = next {
                callback(timestamp);
            }
        }) as Box<dyn FnMut(f64)>);
        Self {
            window,
            pending,
            tick,
        }
    }
}

impl FrameSource for RafFrameSource {
    fn request_frame(&self, callback: FrameCallback) -> FrameToken {
        match self
            .window
            .request_animation_frame(self.tick.as_ref().unchecked_ref())
        {
            Ok(id) => {
                let token = FrameToken(id as u32 as u64);
                *self.pending.borrow_mut() = Some((token, callback));
                token
            }
            Err(e) => {
                log::error!("[loop] requestAnimationFrame failed: {:?}", e);
                NO_REQUEST
            }
        }
    }

    fn cancel_frame(&self, token: FrameToken) {
        if token == NO_REQUEST {
            return;
        }
        {
            let mut pending = self.pending.borrow_mut();
            if pending.as_ref().is_some_and(|(t, _)| *t == token) {
                *pending = None;
            }
        }
        if let Err(e) = self.window.cancel_animation_frame(token.0 as u32 as i32) {
            log::warn!("[loop] cancelAnimationFrame failed: {:?}", e);
        }
    }
}

impl Drop for RafFrameSource {
    fn drop(&mut self) {
        // the closure is freed with us; the browser must not call it afterwards
        let outstanding = self.pending.borrow_mut().take();
        if let Some((token, _)) = outstanding {
            self.cancel_frame(token);
        }
    }
}
