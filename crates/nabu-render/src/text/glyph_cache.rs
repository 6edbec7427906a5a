use std::collections::HashMap;

use crate::atlas::{SurfaceId, TextureId, UvRect};

/// Cache key. Sizes are quantized to 0.25 px so nearly-equal sizes share
/// one rasterization.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct GlyphKey {
    pub codepoint: char,
    size_q: u32,
}

impl GlyphKey {
    pub fn new(codepoint: char, size: f32) -> Self {
        let size_q = if size.is_finite() { (size.max(0.0) * 4.0).round() as u32 } else { 0 };
        Self { codepoint, size_q }
    }

    /// Quantized pixel size.
    #[inline]
    pub fn size(self) -> f32 {
        self.size_q as f32 / 4.0
    }
}

/// Rasterized glyph metrics and its atlas placement.
///
/// Glyphs without a bitmap (whitespace, failed rasterizations) have no
/// texture and only advance the pen.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Glyph {
    pub codepoint: char,
    pub size: f32,
    pub advance: f32,
    pub bearing_x: f32,
    pub bearing_y: f32,
    pub width: u32,
    pub height: u32,
    pub texture: Option<TextureId>,
    pub surface: Option<SurfaceId>,
    pub uv: UvRect,
    pub last_used_frame: u64,
}

impl Glyph {
    /// Advance-only glyph with no bitmap.
    pub fn blank(key: GlyphKey, advance: f32, frame: u64) -> Self {
        Self {
            codepoint: key.codepoint,
            size: key.size(),
            advance,
            bearing_x: 0.0,
            bearing_y: 0.0,
            width: 0,
            height: 0,
            texture: None,
            surface: None,
            uv: UvRect::default(),
            last_used_frame: frame,
        }
    }

    #[inline]
    pub fn has_bitmap(&self) -> bool {
        self.texture.is_some()
    }
}

/// One arena cell. Vacant cells keep their position so indices stay valid.
#[derive(Debug, Clone)]
struct Slot {
    cached: Option<(GlyphKey, Glyph)>,
    /// Neighbour used more recently.
    newer: Option<u32>,
    /// Neighbour used less recently.
    older: Option<u32>,
}

impl Slot {
    const VACANT: Slot = Slot { cached: None, newer: None, older: None };
}

/// Bounded glyph map with LRU ordering.
///
/// Glyphs live in a slot arena threaded by a recency list, `newest` to
/// `oldest`. Evicted slots are recycled. The cache never holds more than
/// `capacity` entries and never evicts an entry stamped with the current
/// frame.
#[derive(Debug)]
pub struct GlyphCache {
    capacity: usize,
    map: HashMap<GlyphKey, u32>,
    slots: Vec<Slot>,
    vacant: Vec<u32>,
    newest: Option<u32>,
    oldest: Option<u32>,
}

impl GlyphCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            map: HashMap::new(),
            slots: Vec::new(),
            vacant: Vec::new(),
            newest: None,
            oldest: None,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.map.len() >= self.capacity
    }

    /// Number of cached glyphs that own an atlas texture.
    pub fn textured_len(&self) -> usize {
        self.iter().filter(|g| g.has_bitmap()).count()
    }

    /// Cached glyphs in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Glyph> {
        self.slots.iter().filter_map(|s| s.cached.as_ref()).map(|(_, g)| g)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Glyph> {
        self.slots.iter_mut().filter_map(|s| s.cached.as_mut()).map(|(_, g)| g)
    }

    /// Looks up `key`, marking it most recently used in `frame`.
    pub fn get(&mut self, key: GlyphKey, frame: u64) -> Option<Glyph> {
        let idx = *self.map.get(&key)?;
        if self.newest != Some(idx) {
            self.unlink(idx);
            self.link_newest(idx);
        }
        let (_, glyph) = self.slots[idx as usize].cached.as_mut()?;
        glyph.last_used_frame = frame;
        Some(*glyph)
    }

    /// Looks up `key` without touching the LRU order.
    pub fn peek(&self, key: GlyphKey) -> Option<&Glyph> {
        let idx = *self.map.get(&key)?;
        self.slots[idx as usize].cached.as_ref().map(|(_, g)| g)
    }

    /// Inserts as the most recent entry. Returns `false` (and drops nothing)
    /// if the cache is full or `key` is already present; call
    /// [`evict_lru`](Self::evict_lru) first.
    pub fn insert(&mut self, key: GlyphKey, glyph: Glyph) -> bool {
        if self.is_full() || self.map.contains_key(&key) {
            return false;
        }
        let idx = self.claim_slot();
        self.slots[idx as usize].cached = Some((key, glyph));
        self.map.insert(key, idx);
        self.link_newest(idx);
        true
    }

    /// Removes the least recently used entry and returns its glyph.
    ///
    /// Returns `None` if the cache is empty or the oldest entry was used in
    /// `frame`. Since the list is ordered by use, a pinned oldest entry
    /// means every entry is pinned.
    pub fn evict_lru(&mut self, frame: u64) -> Option<Glyph> {
        let idx = self.oldest?;
        let (_, glyph) = self.slots[idx as usize].cached.as_ref()?;
        if glyph.last_used_frame == frame {
            return None;
        }
        self.unlink(idx);
        let (key, glyph) = self.slots[idx as usize].cached.take()?;
        self.map.remove(&key);
        self.vacant.push(idx);
        Some(glyph)
    }

    /// Empties the cache, returning every glyph.
    pub fn drain(&mut self) -> Vec<Glyph> {
        let glyphs = self.slots.drain(..).filter_map(|s| s.cached).map(|(_, g)| g).collect();
        self.map.clear();
        self.vacant.clear();
        self.newest = None;
        self.oldest = None;
        glyphs
    }

    fn claim_slot(&mut self) -> u32 {
        self.vacant.pop().unwrap_or_else(|| {
            self.slots.push(Slot::VACANT);
            (self.slots.len() - 1) as u32
        })
    }

    /// Detaches `idx` from the recency list, patching its neighbours and the ends.
    fn unlink(&mut self, idx: u32) {
        let Slot { newer, older, .. } = self.slots[idx as usize];
        match newer {
            Some(n) => self.slots[n as usize].older = older,
            None => self.newest = older,
        }
        match older {
            Some(o) => self.slots[o as usize].newer = newer,
            None => self.oldest = newer,
        }
        let slot = &mut self.slots[idx as usize];
        slot.newer = None;
        slot.older = None;
    }

    fn link_newest(&mut self, idx: u32) {
        let prev = self.newest.replace(idx);
        let slot = &mut self.slots[idx as usize];
        slot.newer = None;
        slot.older = prev;
        match prev {
            Some(p) => self.slots[p as usize].newer = Some(idx),
            None => self.oldest = Some(idx),
        }
    }

    /// Keys from most to least recently used.
    #[cfg(test)]
    fn lru_order(&self) -> Vec<GlyphKey> {
        std::iter::successors(self.newest, |&i| self.slots[i as usize].older)
            .filter_map(|i| self.slots[i as usize].cached.map(|(k, _)| k))
            .collect()
    }
}
