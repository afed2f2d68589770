use globe_core::{AssetLoader, GlobeError, TextureData, TextureSlot};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys as web;

/// Loads images through `HtmlImageElement` and reads their pixels back with
/// a scratch 2D canvas.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageLoader;

impl AssetLoader for ImageLoader {
    fn load(&mut self, url: &str, slot: TextureSlot) {
        let image = match web::HtmlImageElement::new() {
            Ok(i) => i,
            Err(e) => {
                slot.complete(Err(asset_error(url, format!("{:?}", e))));
                return;
            }
        };
        image.set_cross_origin(Some("anonymous"));

        let onload = {
            let (image, slot, url) = (image.clone(), slot.clone(), url.to_string());
            Closure::once_into_js(move || {
                let result = read_pixels(&image).map_err(|reason| asset_error(&url, reason));
                slot.complete(result);
            })
        };
        let onerror = {
            let (slot, url) = (slot, url.to_string());
            Closure::once_into_js(move || {
                slot.complete(Err(asset_error(&url, "image failed to load".to_string())));
            })
        };
        image.set_onload(Some(onload.unchecked_ref()));
        image.set_onerror(Some(onerror.unchecked_ref()));
        image.set_src(url);
    }
}

fn asset_error(url: &str, reason: String) -> GlobeError {
    GlobeError::AssetLoad {
        url: url.to_string(),
        reason,
    }
}

fn read_pixels(image: &web::HtmlImageElement) -> Result<TextureData, String> {
    let (width, height) = (image.natural_width(), image.natural_height());
    let document = crate::dom::window_document().ok_or("no document")?;
    let canvas = document
        .create_element("canvas")
        .map_err(|e| format!("{:?}", e))?
        .dyn_into::<web::HtmlCanvasElement>()
        .map_err(|e| format!("{:?}", e))?;
    canvas.set_width(width);
    canvas.set_height(height);
    let ctx = canvas
        .get_context("2d")
        .map_err(|e| format!("{:?}", e))?
        .ok_or("2d context unavailable")?
        .dyn_into::<web::CanvasRenderingContext2d>()
        .map_err(|e| format!("{:?}", e))?;
    ctx.draw_image_with_html_image_element(image, 0.0, 0.0)
        .map_err(|e| format!("{:?}", e))?;
    let data = ctx
        .get_image_data(0.0, 0.0, width as f64, height as f64)
        .map_err(|e| format!("{:?}", e))?;
    TextureData::new(width, height, data.data().0).map_err(|e| e.to_string())
}
