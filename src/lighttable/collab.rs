/// Interfaces of everything the light table depends on but does not own:
/// the image enumeration and selection persistence of the catalog, the
/// thumbnail cache and the toolkit's redraw queue.
use std::collections::HashSet;

use crate::error::Result;
use crate::state::data::{ImageId, ImageRef, RollId};

/// Filename-ordered image enumeration of a film roll
pub trait ImageEnumerator {
    /// Up to `limit` images of `roll` starting at position `offset`.
    /// Returning fewer than `limit` images is not an error.
    fn enumerate(&self, roll: RollId, offset: u64, limit: usize) -> Result<Vec<ImageRef>>;
}

/// Persistent selection set
pub trait SelectionStore {
    /// Insert `id` if absent, remove it otherwise. A failed toggle leaves
    /// the set unchanged.
    fn toggle(&self, id: ImageId) -> Result<()>;
    fn clear_all(&self) -> Result<()>;
    fn contains(&self, id: ImageId) -> Result<bool>;
    fn all(&self) -> Result<HashSet<ImageId>>;
}

/// A decoded bitmap handed out by a `ThumbnailCache`
#[derive(Debug, Clone, PartialEq)]
pub struct Mip<B> {
    pub bitmap: B,
    /// Exact pixel width of the bitmap
    pub width: u32,
    /// Exact pixel height of the bitmap
    pub height: u32,
}

/// Outcome of a thumbnail lookup
#[derive(Debug, Clone, PartialEq)]
pub enum MipLookup<B> {
    Ready(Mip<B>),
    /// Not decoded yet; ask again next frame
    NotReady,
}

/// Cache of scaled bitmaps. `get` must never block.
pub trait ThumbnailCache {
    type Bitmap;

    /// Bitmap best matching a `target_width` x `target_height` box.
    /// Every `Ready` result must be handed back through `release`.
    fn get(&self, id: ImageId, target_width: u32, target_height: u32) -> MipLookup<Self::Bitmap>;

    fn release(&self, id: ImageId, mip: &Mip<Self::Bitmap>);
}

/// Fire-and-forget redraw request
pub trait RedrawSink {
    fn request_redraw(&self);
}

/// A bitmap acquired from a cache, released when dropped
pub struct MipLease<'a, C: ThumbnailCache + ?Sized> {
    cache: &'a C,
    id: ImageId,
    mip: Mip<C::Bitmap>,
}

impl<'a, C: ThumbnailCache + ?Sized> MipLease<'a, C> {
    /// Looks up a bitmap, returning `None` while it is not ready
    pub fn acquire(cache: &'a C, id: ImageId, target_width: u32, target_height: u32) -> Option<Self> {
        match cache.get(id, target_width, target_height) {
            MipLookup::Ready(mip) => Some(Self { cache, id, mip }),
            MipLookup::NotReady => None,
        }
    }

    pub fn mip(&self) -> &Mip<C::Bitmap> {
        &self.mip
    }
}

impl<C: ThumbnailCache + ?Sized> Drop for MipLease<'_, C> {
    fn drop(&mut self) {
        self.cache.release(self.id, &self.mip);
    }
}
