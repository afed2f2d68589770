#![cfg(target_arch = "wasm32")]
mod dom;
mod frame;
mod input;
mod loader;

use std::cell::RefCell;
use std::rc::Rc;

use globe_core::gpu::GpuRenderer;
use globe_core::{
    dispatch_event, keep_valid_markers, run_globe, Coordinates, EventQueue, Globe, GlobeError,
    GlobeEvent, GlobeOptions, Marker, OptionValue, RenderLoop,
};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys as web;

use frame::RafFrameSource;
use input::Listeners;
use loader::ImageLoader;

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Info).ok();
    log::info!("globe-web starting");
    Ok(())
}

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn busy() -> JsValue {
    JsValue::from_str("globe is busy")
}

/// A globe mounted on a canvas element.
#[wasm_bindgen]
pub struct WebGlobe {
    globe: Rc<RefCell<Globe<GpuRenderer>>>,
    queue: EventQueue,
    render_loop: Option<RenderLoop>,
    listeners: Option<Listeners>,
}

#[wasm_bindgen]
impl WebGlobe {
    /// Mount on `#canvas_id`.
    ///
    /// `options` mirrors `GlobeOptions` with camelCase fields, for example
    /// `{ globe: { texture }, camera: { enableZoom }, focus: { easing:
    /// ["Cubic", "Out"] }, markers: { radiusScaleRange }, lookAt: [lat, lon],
    /// clearColor, size: [w, h] }`. Omitted fields keep their defaults. With
    /// `size` the canvas keeps that size; otherwise it follows its CSS box and
    /// the window.
    pub async fn create(canvas_id: String, options: JsValue) -> Result<WebGlobe, JsValue> {
        let mut parsed = GlobeOptions::default();
        apply_fields(&options, "", &mut |path: &str, value: &OptionValue| {
            parsed.set(path, value)
        })?;
        Self::init(&canvas_id, parsed).await.map_err(|e| {
            log::error!("init error: {:?}", e);
            js_err(e)
        })
    }

    /// Replace the markers with an array of
    /// `{ coordinates: [lat, lon], value, color? }`. Malformed entries are
    /// logged and skipped.
    pub fn set_markers(&self, markers: JsValue) -> Result<(), JsValue> {
        if !js_sys::Array::is_array(&markers) {
            return Err(JsValue::from_str("markers must be an array"));
        }
        let entries = js_sys::Array::from(&markers);
        let parsed = keep_valid_markers(entries.iter().map(|item| parse_marker(&item)));
        log::info!("[markers] {} of {} received", parsed.len(), entries.length());
        self.dispatch(GlobeEvent::SetMarkers(Rc::from(parsed)));
        Ok(())
    }

    /// Merge `{ activeScale, glowPower, radiusScaleRange, ... }` over the
    /// current marker options and rebuild the markers with the result.
    pub fn set_marker_options(&self, options: JsValue) -> Result<(), JsValue> {
        let mut markers = self
            .globe
            .try_borrow()
            .map_err(|_| busy())?
            .options()
            .markers
            .clone();
        apply_fields(&options, "", &mut |key: &str, value: &OptionValue| {
            markers.set(key, value)
        })?;
        markers.validate().map_err(js_err)?;
        self.dispatch(GlobeEvent::SetMarkerOptions(markers));
        Ok(())
    }

    pub fn focus(&self, lat: f64, lon: f64) -> Result<(), JsValue> {
        let c = Coordinates::new(lat, lon).map_err(js_err)?;
        self.dispatch(GlobeEvent::Focus(Some(c)));
        Ok(())
    }

    pub fn clear_focus(&self) {
        self.dispatch(GlobeEvent::Focus(None));
    }

    pub fn look_at(&self, lat: f64, lon: f64) -> Result<(), JsValue> {
        let c = Coordinates::new(lat, lon).map_err(js_err)?;
        self.dispatch(GlobeEvent::LookAt(c));
        Ok(())
    }

    pub fn on_texture_loaded(&self, callback: js_sys::Function) -> Result<(), JsValue> {
        let mut globe = self.globe.try_borrow_mut().map_err(|_| busy())?;
        globe.on_texture_loaded(move || {
            if let Err(e) = callback.call0(&JsValue::NULL) {
                log::warn!("[asset] texture callback threw: {:?}", e);
            }
        });
        Ok(())
    }

    /// `callback(message)` runs when the globe texture fails to load. The
    /// globe keeps rendering untextured.
    pub fn on_asset_error(&self, callback: js_sys::Function) -> Result<(), JsValue> {
        let mut globe = self.globe.try_borrow_mut().map_err(|_| busy())?;
        globe.on_asset_error(move |e: &GlobeError| {
            let message = JsValue::from_str(&e.to_string());
            if let Err(err) = callback.call1(&JsValue::NULL, &message) {
                log::warn!("[asset] error callback threw: {:?}", err);
            }
        });
        Ok(())
    }

    /// Stop the frame loop and detach input listeners.
    pub fn dispose(&mut self) {
        if let Some(render_loop) = self.render_loop.take() {
            render_loop.cancel();
        }
        self.listeners = None;
        log::info!("[globe] disposed");
    }
}

impl WebGlobe {
    async fn init(canvas_id: &str, mut options: GlobeOptions) -> anyhow::Result<WebGlobe> {
        options.validate()?;
        let size = options.size;
        let window = web::window().ok_or_else(|| anyhow::anyhow!("no window"))?;
        let canvas = dom::canvas_by_id(canvas_id)?;
        let (width, height) = match size {
            Some((w, h)) => {
                dom::set_canvas_size(&canvas, w, h);
                (w, h)
            }
            None => dom::sync_canvas_backing_size(&canvas),
        };

        let instance = wgpu::Instance::default();
        let surface = instance.create_surface(wgpu::SurfaceTarget::Canvas(canvas.clone()))?;
        let renderer = GpuRenderer::new(&instance, surface, width, height).await?;

        options.size = Some((width, height));
        let globe = Globe::new(options, renderer, ImageLoader)?;
        let globe = Rc::new(RefCell::new(globe));
        let queue = globe.borrow().event_queue();

        let listeners = input::wire_input(&canvas, &globe, &queue, size.is_none());
        let source = Rc::new(RafFrameSource::new(window));
        let render_loop = run_globe(globe.clone(), source);
        log::info!("[globe] mounted on #{} ({}x{})", canvas_id, width, height);

        Ok(WebGlobe {
            globe,
            queue,
            render_loop: Some(render_loop),
            listeners: Some(listeners),
        })
    }

    fn dispatch(&self, event: GlobeEvent) {
        dispatch_event(&self.globe, &self.queue, event);
    }
}

/// Missing or mistyped fields come through as `None` and fail validation in
/// `Marker::from_parts`.
fn parse_marker(item: &JsValue) -> Result<Marker, GlobeError> {
    let get = |key: &str| {
        js_sys::Reflect::get(item, &JsValue::from_str(key)).unwrap_or(JsValue::UNDEFINED)
    };
    let (lat, lon) = match get("coordinates").dyn_ref::<js_sys::Array>() {
        Some(c) => (c.get(0).as_f64(), c.get(1).as_f64()),
        None => (None, None),
    };
    let color = get("color").as_string();
    Marker::from_parts(lat, lon, get("value").as_f64(), color.as_deref())
}

fn is_plain_object(value: &JsValue) -> bool {
    value.is_object() && !js_sys::Array::is_array(value)
}

/// Scalars and arrays become option values; functions, `null` and
/// `undefined` are left out.
fn option_value(value: &JsValue) -> Option<OptionValue> {
    if let Some(b) = value.as_bool() {
        return Some(OptionValue::Bool(b));
    }
    if let Some(n) = value.as_f64() {
        return Some(OptionValue::Number(n));
    }
    if let Some(s) = value.as_string() {
        return Some(OptionValue::Text(s));
    }
    if !js_sys::Array::is_array(value) {
        return None;
    }
    let items = js_sys::Array::from(value);
    if let Some(numbers) = items.iter().map(|v| v.as_f64()).collect::<Option<Vec<_>>>() {
        return Some(OptionValue::Numbers(numbers));
    }
    // ["Cubic", "Out"]
    let words = items
        .iter()
        .map(|v| v.as_string())
        .collect::<Option<Vec<_>>>()?;
    Some(OptionValue::Text(words.join(".")))
}

/// Walk a plain JS object, handing every leaf to `set` under its dotted
/// path. Unknown paths are logged and ignored.
fn apply_fields(
    value: &JsValue,
    prefix: &str,
    set: &mut dyn FnMut(&str, &OptionValue) -> Result<bool, GlobeError>,
) -> Result<(), JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(());
    }
    if !is_plain_object(value) {
        return Err(JsValue::from_str("options must be an object"));
    }
    let keys = js_sys::Object::keys(value.unchecked_ref::<js_sys::Object>());
    for key in keys.iter().filter_map(|k| k.as_string()) {
        let field = js_sys::Reflect::get(value, &JsValue::from_str(&key))?;
        let path = if prefix.is_empty() {
            key
        } else {
            format!("{}.{}", prefix, key)
        };
        if is_plain_object(&field) {
            apply_fields(&field, &path, set)?;
            continue;
        }
        let Some(option) = option_value(&field) else {
            continue;
        };
        if !set(&path, &option).map_err(js_err)? {
            log::warn!("[options] ignoring unknown option `{}`", path);
        }
    }
    Ok(())
}
