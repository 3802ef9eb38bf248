//! Synchronization layer between the data model and its visual projection.
//!
//! [`Scene`] owns a [`Network`] plus one visual item per block and per
//! connector leg (the two stub lines and one item per interior segment). The
//! sync contract is incremental: after a model change, only the affected
//! connector's items are trimmed/extended/repositioned, and items whose
//! segment did not structurally change keep their identity — in particular
//! the item currently under the user's pointer.
//!
//! The scene also runs the connection-creation state machine and the
//! block→connectors index that keeps block moves from scanning every
//! connector.

mod connection;
mod items;

pub use connection::ConnectionState;
pub use items::{BlockItem, ItemId, SceneItem, SegmentItem, SegmentSlot};

use crate::geometry::{Grid, Line, Orientation, Point, Size};
use crate::model::{
    flat_name, Block, BlockHandle, Connector, ConnectorHandle, Network, NetworkError, Socket,
};
use crate::routing::{distribute_drag, merge_segments};
use std::collections::{BTreeMap, BTreeSet};

/// Bookkeeping for an in-progress segment drag: accumulates raw pointer
/// motion so sub-grid deltas are not lost to quantization.
#[derive(Debug, Clone)]
struct SegmentDrag {
    item: ItemId,
    raw_pos: Point,
}

/// Scene manager: data model plus identity-preserving visual item set.
pub struct Scene {
    network: Network,
    grid: Grid,
    items: BTreeMap<ItemId, SceneItem>,
    next_item_id: u64,
    block_items: BTreeMap<BlockHandle, ItemId>,
    /// Which connectors touch which block, so a block move only adjusts the
    /// connectors that reference it.
    block_connectors: BTreeMap<BlockHandle, BTreeSet<ConnectorHandle>>,
    connection: ConnectionState,
    segment_drag: Option<SegmentDrag>,
    helper_counter: u64,
}

impl Scene {
    pub fn new(grid: Grid) -> Self {
        Self {
            network: Network::new(),
            grid,
            items: BTreeMap::new(),
            next_item_id: 0,
            block_items: BTreeMap::new(),
            block_connectors: BTreeMap::new(),
            connection: ConnectionState::Idle,
            segment_drag: None,
            helper_counter: 0,
        }
    }

    pub fn with_network(network: Network, grid: Grid) -> Self {
        let mut scene = Self::new(grid);
        scene.set_network(network);
        scene
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn connection_state(&self) -> &ConnectionState {
        &self.connection
    }

    /// True while connection mode is armed or a connection is being dragged
    /// out; block and segment dragging is disabled in this state.
    pub fn is_connecting(&self) -> bool {
        !self.connection.is_idle()
    }

    // ── items ───────────────────────────────────────────────────────────

    pub fn items(&self) -> impl Iterator<Item = (ItemId, &SceneItem)> {
        self.items.iter().map(|(id, item)| (*id, item))
    }

    pub fn item(&self, id: ItemId) -> Option<&SceneItem> {
        self.items.get(&id)
    }

    pub fn block_item(&self, handle: BlockHandle) -> Option<ItemId> {
        self.block_items.get(&handle).copied()
    }

    fn segment_item(&self, id: ItemId) -> Option<&SegmentItem> {
        self.items.get(&id).and_then(SceneItem::as_segment)
    }

    fn segment_item_mut(&mut self, id: ItemId) -> Option<&mut SegmentItem> {
        match self.items.get_mut(&id) {
            Some(SceneItem::Segment(seg)) => Some(seg),
            _ => None,
        }
    }

    /// The stub item ids and the interior item ids (in segment order) of a
    /// connector.
    pub fn connector_items(&self, handle: ConnectorHandle) -> ConnectorItems {
        let mut found = ConnectorItems::default();
        let mut interior: Vec<(usize, ItemId)> = Vec::new();
        for (id, item) in &self.items {
            let SceneItem::Segment(seg) = item else {
                continue;
            };
            if seg.connector != handle {
                continue;
            }
            match seg.slot {
                SegmentSlot::Start => found.start = Some(*id),
                SegmentSlot::End => found.end = Some(*id),
                SegmentSlot::Interior(idx) => interior.push((idx, *id)),
            }
        }
        interior.sort_by_key(|(idx, _)| *idx);
        found.interior = interior.into_iter().map(|(_, id)| id).collect();
        found
    }

    fn insert_item(&mut self, item: SceneItem) -> ItemId {
        let id = ItemId(self.next_item_id);
        self.next_item_id += 1;
        self.items.insert(id, item);
        id
    }

    // ── network replace ─────────────────────────────────────────────────

    /// Replaces the whole network, tearing down every item and rebuilding
    /// the block→connectors index. A still-pending connection interaction is
    /// abandoned first, so no helper state survives the teardown.
    ///
    /// Must never be called from within a geometry-change notification; the
    /// caller would return into items this teardown destroyed.
    pub fn set_network(&mut self, network: Network) {
        self.cancel_connection();
        self.segment_drag = None;
        self.items.clear();
        self.block_items.clear();
        self.block_connectors.clear();
        self.network = network;

        for handle in self.network.blocks.handles() {
            self.create_block_item(handle);
        }
        for handle in self.network.connectors.handles() {
            self.index_connector(handle);
            self.create_connector_items(handle);
        }
    }

    // ── add / remove ────────────────────────────────────────────────────

    pub fn add_block(&mut self, block: Block) -> BlockHandle {
        let handle = self.network.add_block(block);
        self.create_block_item(handle);
        handle
    }

    /// Removes a block and every connector referencing it, along with all of
    /// their visual items.
    pub fn remove_block(&mut self, handle: BlockHandle) {
        let removed = self.network.remove_block(handle);
        for con in removed {
            self.remove_connector_items(con);
            self.unindex_connector(con);
        }
        if let Some(id) = self.block_items.remove(&handle) {
            self.items.remove(&id);
        }
        self.block_connectors.remove(&handle);
    }

    /// Validates, appends, routes and projects a new connector.
    pub fn add_connector(&mut self, connector: Connector) -> Result<ConnectorHandle, NetworkError> {
        let handle = self.network.add_connector(connector)?;
        // endpoints were just validated, adjustment cannot fail
        self.network.adjust_connector(handle, &self.grid)?;
        self.index_connector(handle);
        self.create_connector_items(handle);
        Ok(handle)
    }

    pub fn remove_connector(&mut self, handle: ConnectorHandle) {
        self.remove_connector_items(handle);
        self.unindex_connector(handle);
        self.network.remove_connector(handle);
    }

    fn create_block_item(&mut self, handle: BlockHandle) {
        let Some(block) = self.network.block(handle) else {
            return;
        };
        let item = BlockItem {
            block: handle,
            pos: block.pos,
            size: block.size,
        };
        let id = self.insert_item(SceneItem::Block(item));
        self.block_items.insert(handle, id);
    }

    fn remove_connector_items(&mut self, handle: ConnectorHandle) {
        self.items.retain(|_, item| {
            item.as_segment()
                .map(|seg| seg.connector != handle)
                .unwrap_or(true)
        });
    }

    // ── block→connectors index ──────────────────────────────────────────

    fn index_connector(&mut self, handle: ConnectorHandle) {
        let Some(connector) = self.network.connector(handle) else {
            return;
        };
        let endpoints = [connector.source.clone(), connector.target.clone()];
        for addr in endpoints {
            if let Ok((block, _, _)) = self.network.lookup(&addr) {
                self.block_connectors.entry(block).or_default().insert(handle);
            }
        }
    }

    fn unindex_connector(&mut self, handle: ConnectorHandle) {
        for cons in self.block_connectors.values_mut() {
            cons.remove(&handle);
        }
    }

    /// Connectors referencing the given block, per the index.
    pub fn connectors_of_block(&self, handle: BlockHandle) -> Vec<ConnectorHandle> {
        self.block_connectors
            .get(&handle)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    // ── event entry points ──────────────────────────────────────────────

    /// A block was dragged to a new position. The position is snapped to the
    /// grid, every connector referencing the block is re-routed, and the
    /// affected items are re-synced.
    pub fn on_block_moved(&mut self, handle: BlockHandle, new_pos: Point) {
        if self.is_connecting() {
            return;
        }
        let pos = self.grid.snap_point(new_pos);
        self.move_block_to(handle, pos);
    }

    fn move_block_to(&mut self, handle: BlockHandle, pos: Point) {
        let Some(block) = self.network.block_mut(handle) else {
            return;
        };
        block.pos = pos;
        if let Some(id) = self.block_items.get(&handle) {
            if let Some(SceneItem::Block(item)) = self.items.get_mut(id) {
                item.pos = pos;
            }
        }
        for con in self.connectors_of_block(handle) {
            // a stale endpoint mid-drag skips this connector's update; the
            // last good geometry stays visible
            if self.network.adjust_connector(con, &self.grid).is_ok() {
                self.sync_connector_items(con, None);
            }
        }
    }

    /// An interior segment item is being dragged by `raw_delta`. The motion
    /// is quantized to the grid, redistributed over the neighboring segments
    /// so both connector endpoints stay fixed, and the items re-synced with
    /// the dragged item's identity preserved.
    pub fn on_segment_dragged(&mut self, item: ItemId, raw_delta: Point) {
        if self.is_connecting() {
            return;
        }
        let Some(seg) = self.segment_item(item) else {
            return;
        };
        let (connector, index, item_pos) = match seg.slot {
            SegmentSlot::Interior(idx) => (seg.connector, idx, seg.pos),
            // the stub lines are not draggable
            SegmentSlot::Start | SegmentSlot::End => return,
        };

        let raw_pos = match &mut self.segment_drag {
            Some(drag) if drag.item == item => {
                drag.raw_pos += raw_delta;
                drag.raw_pos
            }
            _ => {
                let raw_pos = item_pos + raw_delta;
                self.segment_drag = Some(SegmentDrag { item, raw_pos });
                raw_pos
            }
        };
        let snapped = self.grid.snap_floor_point(raw_pos);
        let move_dist = snapped - item_pos;
        if self.grid.near_zero(move_dist.x) && self.grid.near_zero(move_dist.y) {
            return;
        }

        let grid = self.grid;
        let new_index = match self.network.connector_mut(connector) {
            Some(con) if index < con.segments.len() => {
                distribute_drag(&mut con.segments, index, move_dist.x, move_dist.y, &grid)
            }
            _ => return,
        };

        if let Some(seg) = self.segment_item_mut(item) {
            seg.pos = snapped;
            seg.slot = SegmentSlot::Interior(new_index);
        }
        self.sync_connector_items(connector, Some(item));
    }

    /// The user released a drag on this connector: run the merge cleanup and
    /// re-sync. Never called mid-drag.
    pub fn on_drag_released(&mut self, handle: ConnectorHandle) {
        self.segment_drag = None;
        let grid = self.grid;
        let Some(connector) = self.network.connector_mut(handle) else {
            return;
        };
        merge_segments(&mut connector.segments, &grid);
        self.sync_connector_items(handle, None);
    }

    /// Flips the hover highlight on every item of a connector.
    pub fn set_connector_highlighted(&mut self, handle: ConnectorHandle, highlighted: bool) {
        for item in self.items.values_mut() {
            if let SceneItem::Segment(seg) = item {
                if seg.connector == handle {
                    seg.highlighted = highlighted;
                }
            }
        }
    }

    // ── connection state machine ────────────────────────────────────────

    /// Arms connection mode: `Idle → Pending`.
    pub fn begin_connection_mode(&mut self) {
        if self.connection.is_idle() {
            self.connection = ConnectionState::Pending;
        }
    }

    /// An outlet socket was pressed while connection mode is armed:
    /// `Pending → Dragging`. Creates the transient helper block under the
    /// pointer and a synthetic connector from the outlet to it.
    ///
    /// An already-connected outlet is ignored; pressing an inlet is an
    /// error.
    pub fn on_outlet_pressed(&mut self, outlet: &str, pointer: Point) -> Result<(), NetworkError> {
        if self.connection != ConnectionState::Pending {
            return Ok(());
        }
        let source = {
            let (_, block, socket) = self.network.lookup(outlet)?;
            if socket.inlet {
                return Err(NetworkError::InvalidEndpointRole {
                    address: outlet.to_string(),
                    expected: "outlet",
                });
            }
            flat_name(&block.name, &socket.name)
        };
        if self.network.connectors().any(|(_, c)| c.source == source) {
            return Ok(());
        }

        let helper_name = self.next_helper_name();
        let mut helper_block = Block::new(helper_name.clone(), pointer.x, pointer.y);
        helper_block.size = Size::new(20.0, 20.0);
        helper_block.connection_helper = true;
        helper_block
            .sockets
            .push(Socket::new("in", Point::default(), Orientation::Horizontal, true));
        let helper = self.add_block(helper_block);

        let synthetic = Connector::new("pending", source.clone(), flat_name(&helper_name, "in"));
        let connector = match self.add_connector(synthetic) {
            Ok(handle) => handle,
            Err(e) => {
                self.remove_block(helper);
                return Err(e);
            }
        };

        self.connection = ConnectionState::Dragging {
            helper,
            connector,
            source,
        };
        Ok(())
    }

    /// Pointer motion while dragging out a connection: the helper block
    /// follows the pointer (unsnapped, so inlet snapping stays precise) and
    /// the synthetic connector is re-routed.
    pub fn on_pointer_moved(&mut self, pointer: Point) {
        if let ConnectionState::Dragging { helper, .. } = self.connection {
            self.move_block_to(helper, pointer);
        }
    }

    /// Pointer release ends the drag: if the helper sits within snapping
    /// tolerance of an eligible inlet, a new permanent connector is created
    /// (the synthetic one is never reused). Either way all helper state is
    /// discarded.
    pub fn on_pointer_released(&mut self) -> Option<ConnectorHandle> {
        let ConnectionState::Dragging { helper, source, .. } = self.connection.clone() else {
            return None;
        };
        let drop_pos = self.network.block(helper).map(|b| b.pos);
        let target = drop_pos.and_then(|pos| self.eligible_inlet_at(pos));

        // discard the helper block, its synthetic connector and their items
        self.remove_block(helper);
        self.connection = ConnectionState::Idle;

        let target = target?;
        match self.add_connector(Connector::new("new connector", source, target)) {
            Ok(handle) => Some(handle),
            Err(e) => {
                eprintln!("[blocknet] Warning: cannot finish connection: {}", e);
                None
            }
        }
    }

    /// Right-click (or any other abort): discards pending helper state and
    /// leaves connection mode.
    pub fn cancel_connection(&mut self) {
        if let ConnectionState::Dragging { helper, .. } = self.connection.clone() {
            self.remove_block(helper);
        }
        self.connection = ConnectionState::Idle;
    }

    /// The unconnected inlet socket within Manhattan snapping tolerance of
    /// `pos`, if any. Helper blocks are excluded from hit-testing.
    pub fn eligible_inlet_at(&self, pos: Point) -> Option<String> {
        for (_, block) in self.network.blocks() {
            if block.connection_helper {
                continue;
            }
            for socket in &block.sockets {
                if !socket.inlet {
                    continue;
                }
                let scene_pos = socket.pos + block.pos;
                if (scene_pos - pos).manhattan_length() < self.grid.snap_tolerance() {
                    let flat = flat_name(&block.name, &socket.name);
                    if !self.network.connected_inlet(&flat) {
                        return Some(flat);
                    }
                }
            }
        }
        None
    }

    /// The inlet the pending connection would snap to right now; drives
    /// hover feedback in the rendering layer.
    pub fn hovered_inlet(&self) -> Option<String> {
        let ConnectionState::Dragging { helper, .. } = &self.connection else {
            return None;
        };
        let pos = self.network.block(*helper)?.pos;
        self.eligible_inlet_at(pos)
    }

    fn next_helper_name(&mut self) -> String {
        loop {
            self.helper_counter += 1;
            let name = format!("helper-{}", self.helper_counter);
            if !self.network.has_block(name.as_str()) {
                return name;
            }
        }
    }

    // ── item synchronization ────────────────────────────────────────────

    /// Creates the full item set for a connector: two stub items plus one
    /// item per interior segment. On a lookup failure no items are created
    /// and the error is reported.
    fn create_connector_items(&mut self, handle: ConnectorHandle) {
        let Some(connector) = self.network.connector(handle) else {
            return;
        };
        let name = connector.name.clone();
        let source = connector.source.clone();
        let target = connector.target.clone();
        let segments = connector.segments.clone();

        let stub = |net: &Network, addr: &str, grid: &Grid| net.socket_stub_line(addr, grid);
        let (start_line, end_line) = match (
            stub(&self.network, &source, &self.grid),
            stub(&self.network, &target, &self.grid),
        ) {
            (Ok(s), Ok(e)) => (s, e),
            (Err(e), _) | (_, Err(e)) => {
                eprintln!(
                    "[blocknet] Warning: cannot create items for connector '{}': {}",
                    name, e
                );
                return;
            }
        };

        self.insert_item(SceneItem::Segment(SegmentItem {
            connector: handle,
            slot: SegmentSlot::Start,
            line: start_line,
            pos: Point::default(),
            highlighted: false,
        }));
        self.insert_item(SceneItem::Segment(SegmentItem {
            connector: handle,
            slot: SegmentSlot::End,
            line: end_line,
            pos: Point::default(),
            highlighted: false,
        }));

        let mut walk = start_line.p2;
        for (i, segment) in segments.iter().enumerate() {
            let next = walk + segment.delta();
            self.insert_item(SceneItem::Segment(SegmentItem {
                connector: handle,
                slot: SegmentSlot::Interior(i),
                line: Line::new(walk, next),
                pos: Point::default(),
                highlighted: false,
            }));
            walk = next;
        }
    }

    /// Reconciles the item set of a connector with its current segment list:
    /// excess interior items are trimmed from the tail, missing ones created
    /// (inheriting the highlight flag from a sibling), the currently-dragged
    /// item is spliced back at its provisional index, and every item's line
    /// is recomputed from the accumulated walk — translated into the item's
    /// own coordinate origin, so a dragged item's motion is not applied
    /// twice.
    ///
    /// A lookup failure (stale endpoint mid-drag) skips this frame's visual
    /// update; the last good geometry remains.
    fn sync_connector_items(&mut self, handle: ConnectorHandle, dragged: Option<ItemId>) {
        let mut start_item = None;
        let mut end_item = None;
        let mut indexed: Vec<(usize, ItemId)> = Vec::new();
        for (id, item) in &self.items {
            let SceneItem::Segment(seg) = item else {
                continue;
            };
            if seg.connector != handle {
                continue;
            }
            match seg.slot {
                SegmentSlot::Start => start_item = Some(*id),
                SegmentSlot::End => end_item = Some(*id),
                SegmentSlot::Interior(idx) => {
                    if Some(*id) != dragged {
                        indexed.push((idx, *id));
                    }
                }
            }
        }
        indexed.sort_by_key(|(idx, _)| *idx);
        let mut interior: Vec<ItemId> = indexed.into_iter().map(|(_, id)| id).collect();

        if start_item.is_none() && end_item.is_none() && interior.is_empty() && dragged.is_none() {
            self.create_connector_items(handle);
            return;
        }
        let (Some(start_item), Some(end_item)) = (start_item, end_item) else {
            return;
        };

        let Some(connector) = self.network.connector(handle) else {
            return;
        };
        let source = connector.source.clone();
        let target = connector.target.clone();
        let segments = connector.segments.clone();

        let Ok(start_line) = self.network.socket_stub_line(&source, &self.grid) else {
            return;
        };
        let Ok(end_line) = self.network.socket_stub_line(&target, &self.grid) else {
            return;
        };

        let needed = segments.len().saturating_sub(usize::from(dragged.is_some()));

        while interior.len() > needed {
            if let Some(id) = interior.pop() {
                self.items.remove(&id);
            }
        }

        let highlighted = dragged
            .or_else(|| interior.first().copied())
            .and_then(|id| self.segment_item(id))
            .map(|seg| seg.highlighted)
            .unwrap_or(false);

        while interior.len() < needed {
            let id = self.insert_item(SceneItem::Segment(SegmentItem {
                connector: handle,
                slot: SegmentSlot::Interior(interior.len()),
                line: Line::default(),
                pos: Point::default(),
                highlighted,
            }));
            interior.push(id);
        }

        if let Some(dragged_id) = dragged {
            if let Some(SegmentSlot::Interior(idx)) = self.segment_item(dragged_id).map(|s| s.slot)
            {
                interior.insert(idx.min(interior.len()), dragged_id);
            }
        }
        debug_assert_eq!(interior.len(), segments.len());

        if let Some(seg) = self.segment_item_mut(start_item) {
            seg.line = start_line.translated(-seg.pos);
        }
        if let Some(seg) = self.segment_item_mut(end_item) {
            seg.line = end_line.translated(-seg.pos);
        }

        let mut walk = start_line.p2;
        for (i, segment) in segments.iter().enumerate() {
            let next = walk + segment.delta();
            if let Some(id) = interior.get(i).copied() {
                if let Some(seg) = self.segment_item_mut(id) {
                    seg.slot = SegmentSlot::Interior(i);
                    seg.line = Line::new(walk, next).translated(-seg.pos);
                }
            }
            walk = next;
        }
    }
}

/// Item ids of one connector, as found in the scene.
#[derive(Debug, Clone, Default)]
pub struct ConnectorItems {
    pub start: Option<ItemId>,
    pub end: Option<ItemId>,
    /// Interior segment items in segment order.
    pub interior: Vec<ItemId>,
}
