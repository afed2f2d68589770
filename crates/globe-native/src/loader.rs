use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use globe_core::{AssetLoader, GlobeError, TextureData, TextureSlot};

type LoadResult = Result<TextureData, GlobeError>;

/// Decodes image files on a worker thread. Results reach their slot when the
/// event loop calls [`FileLoader::poll`].
#[derive(Clone, Default)]
pub struct FileLoader {
    in_flight: Rc<RefCell<Vec<(String, Receiver<LoadResult>, TextureSlot)>>>,
}

impl FileLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand finished decodes to their slots.
    pub fn poll(&self) {
        self.in_flight.borrow_mut().retain(|(url, rx, slot)| match rx.try_recv() {
            Ok(result) => {
                slot.complete(result);
                false
            }
            Err(TryRecvError::Empty) => true,
            Err(TryRecvError::Disconnected) => {
                slot.complete(Err(GlobeError::AssetLoad {
                    url: url.clone(),
                    reason: "decoder thread exited".into(),
                }));
                false
            }
        });
    }
}

impl AssetLoader for FileLoader {
    fn load(&mut self, url: &str, slot: TextureSlot) {
        let (tx, rx) = mpsc::channel();
        let path = url.to_string();
        let spawned = thread::Builder::new()
            .name("texture-decode".into())
            .spawn(move || {
                let _ = tx.send(decode(&path));
            });
        match spawned {
            Ok(_) => self
                .in_flight
                .borrow_mut()
                .push((url.to_string(), rx, slot)),
            Err(e) => slot.complete(Err(GlobeError::AssetLoad {
                url: url.to_string(),
                reason: e.to_string(),
            })),
        }
    }
}

fn decode(path: &str) -> LoadResult {
    let started = std::time::Instant::now();
    let img = image::open(Path::new(path)).map_err(|e| GlobeError::AssetLoad {
        url: path.to_string(),
        reason: e.to_string(),
    })?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    log::debug!("[asset] decoded {} in {:?}", path, started.elapsed());
    TextureData::new(width, height, rgba.into_raw())
}
