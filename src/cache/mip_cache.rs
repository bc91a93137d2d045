/// In-memory cache of decoded thumbnails
///
/// Lookups never block the frame: a missing bitmap is queued for a loader
/// task on a dedicated tokio runtime and reported as not ready. Loads run
/// one at a time on the blocking pool. Bitmaps handed out to
/// a frame are leased and stay resident until released; eviction only
/// considers unleased entries, least recently used first.
use iced::widget::image::Handle;
use image::RgbaImage;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;

use super::thumbnail::{level_for, ThumbnailGenerator, MIP_LEVELS};
use crate::error::Result;
use crate::lighttable::collab::{Mip, MipLookup, ThumbnailCache};
use crate::state::data::ImageId;
use crate::state::library::Library;

/// Produces the bitmap of one image at one mip level; runs on the blocking pool
pub type MipLoader = Box<dyn FnMut(ImageId, u32) -> Result<RgbaImage> + Send>;

type Key = (ImageId, u32);

struct Entry {
    mip: Mip<Handle>,
    leases: usize,
    last_used: u64,
}

#[derive(Default)]
struct Shared {
    entries: HashMap<Key, Entry>,
    pending: HashSet<Key>,
    failed: HashSet<Key>,
    clock: u64,
}

impl Shared {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn lease(&mut self, key: Key) -> Option<Mip<Handle>> {
        let now = self.tick();
        let entry = self.entries.get_mut(&key)?;
        entry.leases += 1;
        entry.last_used = now;
        Some(entry.mip.clone())
    }

    /// Drop least recently used unleased entries until `capacity` is met
    fn evict(&mut self, capacity: usize) {
        while self.entries.len() > capacity {
            let victim = self
                .entries
                .iter()
                .filter(|(_, e)| e.leases == 0)
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| *k);
            match victim {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

pub struct MipCache {
    shared: Arc<Mutex<Shared>>,
    requests: mpsc::UnboundedSender<Key>,
    fresh: Arc<AtomicBool>,
    runtime: Option<Runtime>,
}

impl MipCache {
    /// Start the loader. At most `capacity` unleased bitmaps are kept.
    pub fn new(capacity: usize, loader: MipLoader) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("thumbnail-loader")
            .build()?;
        let shared = Arc::new(Mutex::new(Shared::default()));
        let fresh = Arc::new(AtomicBool::new(false));
        let (requests, mut queue) = mpsc::unbounded_channel::<Key>();
        let loader = Arc::new(Mutex::new(loader));

        let worker_shared = Arc::clone(&shared);
        let worker_fresh = Arc::clone(&fresh);
        runtime.spawn(async move {
            while let Some((id, edge)) = queue.recv().await {
                let loader = Arc::clone(&loader);
                let result = tokio::task::spawn_blocking(move || {
                    let mut guard = loader.lock();
                    let load = &mut *guard;
                    load(id, edge)
                })
                .await;

                let mut shared = worker_shared.lock();
                shared.pending.remove(&(id, edge));
                match result {
                    Ok(Ok(image)) => {
                        let (width, height) = image.dimensions();
                        let mip = Mip {
                            bitmap: Handle::from_rgba(width, height, image.into_raw()),
                            width,
                            height,
                        };
                        let last_used = shared.tick();
                        shared.entries.insert(
                            (id, edge),
                            Entry {
                                mip,
                                leases: 0,
                                last_used,
                            },
                        );
                        shared.evict(capacity);
                        worker_fresh.store(true, Ordering::Release);
                    }
                    Ok(Err(e)) => {
                        log::warn!("⚠️ Thumbnail {} at {}px failed: {}", id, edge, e);
                        shared.failed.insert((id, edge));
                    }
                    Err(e) => {
                        log::error!("❌ Thumbnail task for {} aborted: {}", id, e);
                        shared.failed.insert((id, edge));
                    }
                }
            }
            log::debug!("Thumbnail loader stopped");
        });

        Ok(Self {
            shared,
            requests,
            fresh,
            runtime: Some(runtime),
        })
    }

    /// Whether bitmaps arrived since the last call
    pub fn take_fresh(&self) -> bool {
        self.fresh.swap(false, Ordering::AcqRel)
    }

    pub fn len(&self) -> usize {
        self.shared.lock().entries.len()
    }

    /// Number of bitmaps currently leased to a frame
    pub fn leased(&self) -> usize {
        self.shared
            .lock()
            .entries
            .values()
            .filter(|e| e.leases > 0)
            .count()
    }

    /// Forget failed loads so they are attempted again, e.g. after an import
    pub fn retry_failed(&self) {
        self.shared.lock().failed.clear();
    }
}

impl Drop for MipCache {
    fn drop(&mut self) {
        // the UI may drop the cache from inside iced's own runtime
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl ThumbnailCache for MipCache {
    type Bitmap = Handle;

    fn get(&self, id: ImageId, target_width: u32, target_height: u32) -> MipLookup<Handle> {
        let edge = level_for(target_width, target_height);
        let mut shared = self.shared.lock();
        if let Some(mip) = shared.lease((id, edge)) {
            return MipLookup::Ready(mip);
        }

        let key = (id, edge);
        if !shared.pending.contains(&key) && !shared.failed.contains(&key) {
            if self.requests.send(key).is_ok() {
                shared.pending.insert(key);
            } else {
                log::error!("Thumbnail loader is gone, {} stays blank", id);
            }
        }

        // another level of the same image stands in until the right one loads
        MIP_LEVELS
            .iter()
            .rev()
            .filter(|&&other| other != edge)
            .find_map(|&other| shared.lease((id, other)))
            .map_or(MipLookup::NotReady, MipLookup::Ready)
    }

    fn release(&self, id: ImageId, mip: &Mip<Handle>) {
        let mut shared = self.shared.lock();
        let leased = shared.entries.iter_mut().find(|((entry_id, _), e)| {
            *entry_id == id && e.leases > 0 && e.mip.bitmap.id() == mip.bitmap.id()
        });
        if let Some((_, entry)) = leased {
            entry.leases -= 1;
        }
    }
}

/// Loader that looks images up in the catalog at `db_path` and reads or
/// generates their thumbnails with `generator`
pub fn catalog_loader(db_path: &Path, generator: ThumbnailGenerator) -> Result<MipLoader> {
    let library = Library::open(db_path)?;
    Ok(Box::new(move |id, edge| {
        let source = library.image_path(id)?;
        let thumbnail = generator.load_or_generate(id, &source, edge)?;
        if thumbnail.generated {
            library.update_thumbnail(id, &thumbnail.path.to_string_lossy())?;
        }
        Ok(thumbnail.image)
    }))
}
