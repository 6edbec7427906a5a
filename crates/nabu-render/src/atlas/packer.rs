use super::TextureId;

/// Texel-space rectangle inside an atlas surface.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct AtlasRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl AtlasRect {
    #[inline]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    #[inline]
    pub fn area(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    #[inline]
    pub fn right(self) -> u32 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(self) -> u32 {
        self.y + self.height
    }

    /// True if the two rectangles share at least one texel.
    #[inline]
    pub fn overlaps(self, other: AtlasRect) -> bool {
        self.x < other.right() && other.x < self.right() && self.y < other.bottom() && other.y < self.bottom()
    }
}

/// Index of a node in a [`PackTree`] arena.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct NodeHandle(u32);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum NodeKind {
    /// `released` marks space that was occupied before and is now empty.
    Free { released: bool },
    Occupied(TextureId),
    Internal { left: NodeHandle, right: NodeHandle },
}

#[derive(Debug, Clone)]
struct Node {
    rect: AtlasRect,
    kind: NodeKind,
}

/// Binary-tree rectangle packer over one fixed-size surface.
///
/// Nodes live in a flat arena; the root is always index 0. An internal node's
/// two children partition its rectangle exactly. Occupied leaves are never
/// handed out again until [`free`](Self::free) is called for them, and freed
/// leaves are not merged back; compaction only happens through a full
/// rebuild.
#[derive(Debug, Clone)]
pub struct PackTree {
    nodes: Vec<Node>,
}

impl PackTree {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            nodes: vec![Node {
                rect: AtlasRect::new(0, 0, width, height),
                kind: NodeKind::Free { released: false },
            }],
        }
    }

    /// Rectangle covered by the whole tree.
    #[inline]
    pub fn bounds(&self) -> AtlasRect {
        self.nodes[0].rect
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Finds the first free leaf that admits `width` x `height` and carves an
    /// exactly-sized leaf out of it for `owner`.
    ///
    /// A non-exact fit splits the leaf along the axis with the larger leftover
    /// margin (vertical cut on ties). Returns `None` if no leaf is big enough.
    pub fn pack(&mut self, width: u32, height: u32, owner: TextureId) -> Option<(NodeHandle, AtlasRect)> {
        if width == 0 || height == 0 {
            return None;
        }
        let idx = self.insert(0, width, height, owner)?;
        Some((NodeHandle(idx), self.nodes[idx as usize].rect))
    }

    /// Marks an occupied leaf free again. Returns its rectangle, or `None` if
    /// the handle does not name an occupied leaf.
    pub fn free(&mut self, handle: NodeHandle) -> Option<AtlasRect> {
        let node = self.nodes.get_mut(handle.0 as usize)?;
        match node.kind {
            NodeKind::Occupied(_) => {
                node.kind = NodeKind::Free { released: true };
                Some(node.rect)
            }
            _ => None,
        }
    }

    /// Area of free leaves that were occupied at some point. Packing into
    /// such a leaf takes the used part out of this total again.
    pub fn released_area(&self) -> u64 {
        self.nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Free { released: true })
            .map(|n| n.rect.area())
            .sum()
    }

    /// Owner and rectangle of every occupied leaf.
    pub fn occupied(&self) -> impl Iterator<Item = (TextureId, AtlasRect)> + '_ {
        self.nodes.iter().filter_map(|n| match n.kind {
            NodeKind::Occupied(id) => Some((id, n.rect)),
            _ => None,
        })
    }

    fn insert(&mut self, idx: u32, width: u32, height: u32, owner: TextureId) -> Option<u32> {
        let Node { rect, kind } = self.nodes[idx as usize].clone();
        match kind {
            NodeKind::Occupied(_) => None,
            NodeKind::Internal { left, right } => self
                .insert(left.0, width, height, owner)
                .or_else(|| self.insert(right.0, width, height, owner)),
            NodeKind::Free { released } => {
                if width > rect.width || height > rect.height {
                    return None;
                }

                let dw = rect.width - width;
                let dh = rect.height - height;
                if dw == 0 && dh == 0 {
                    self.nodes[idx as usize].kind = NodeKind::Occupied(owner);
                    return Some(idx);
                }

                let (first, second) = if dw >= dh {
                    (
                        AtlasRect::new(rect.x, rect.y, width, rect.height),
                        AtlasRect::new(rect.x + width, rect.y, dw, rect.height),
                    )
                } else {
                    (
                        AtlasRect::new(rect.x, rect.y, rect.width, height),
                        AtlasRect::new(rect.x, rect.y + height, rect.width, dh),
                    )
                };

                let left = self.push_leaf(first, released);
                let right = self.push_leaf(second, released);
                self.nodes[idx as usize].kind = NodeKind::Internal { left, right };

                // The first child always admits the request; at most one more split follows.
                self.insert(left.0, width, height, owner)
            }
        }
    }

    fn push_leaf(&mut self, rect: AtlasRect, released: bool) -> NodeHandle {
        let handle = NodeHandle(self.nodes.len() as u32);
        self.nodes.push(Node { rect, kind: NodeKind::Free { released } });
        handle
    }
}
