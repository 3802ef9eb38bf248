//! Visual items mirroring the data model.
//!
//! Every item carries an explicit tag for what it renders (a block, or one
//! leg of a connector) instead of relying on runtime type recovery. Items are
//! addressed by [`ItemId`]; the scene owns them and the rendering layer only
//! ever holds ids, resolved through the scene at time of use.

use crate::geometry::{Line, Point, Size};
use crate::model::{BlockHandle, ConnectorHandle};

/// Stable identity of a visual item within one [`Scene`](super::Scene).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub(super) u64);

/// Which leg of a connector a segment item renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentSlot {
    /// The fixed stub line at the source socket.
    Start,
    /// The fixed stub line at the target socket.
    End,
    /// The interior segment at this index of the connector's segment list.
    /// Provisional while the item is being dragged.
    Interior(usize),
}

/// Visual item for one leg of a connector's polyline.
#[derive(Debug, Clone)]
pub struct SegmentItem {
    pub connector: ConnectorHandle,
    pub slot: SegmentSlot,
    /// Line in the item's own coordinates; add `pos` for scene coordinates.
    pub line: Line,
    /// Item origin in scene coordinates; moves (grid-quantized) while the
    /// item is dragged.
    pub pos: Point,
    /// Hover highlight, shared by all items of one connector.
    pub highlighted: bool,
}

impl SegmentItem {
    /// The rendered line in scene coordinates.
    pub fn scene_line(&self) -> Line {
        self.line.translated(self.pos)
    }
}

/// Visual item for a block.
#[derive(Debug, Clone)]
pub struct BlockItem {
    pub block: BlockHandle,
    /// Top-left corner in scene coordinates.
    pub pos: Point,
    pub size: Size,
}

/// A visual item owned by the scene.
#[derive(Debug, Clone)]
pub enum SceneItem {
    Block(BlockItem),
    Segment(SegmentItem),
}

impl SceneItem {
    pub fn as_block(&self) -> Option<&BlockItem> {
        match self {
            SceneItem::Block(b) => Some(b),
            SceneItem::Segment(_) => None,
        }
    }

    pub fn as_segment(&self) -> Option<&SegmentItem> {
        match self {
            SceneItem::Segment(s) => Some(s),
            SceneItem::Block(_) => None,
        }
    }
}
