//! Connector geometry maintenance.
//!
//! Three algorithms keep a connector's segment list consistent with block
//! positions:
//!
//! - [`adjust_segments`] re-spans the gap between the endpoint stub lines
//!   after a block moved, touching as few segments as possible;
//! - [`distribute_drag`] absorbs an interactive segment drag into the
//!   neighboring segments so both connector endpoints stay fixed;
//! - [`merge_segments`] is the drag-release cleanup that folds adjacent
//!   same-direction segments and drops near-zero ones, preventing
//!   segment-list growth across repeated drags.

use crate::geometry::{Direction, Grid, Line, Orientation, Point};
use crate::model::{Block, ConnectorHandle, Network, NetworkError, Segment, Socket};

impl Block {
    /// The stub line of a socket: from the socket's connection point (in
    /// scene coordinates) outward by the grid's stand-off distance, in the
    /// socket's facing direction. Connectors route between stub endpoints so
    /// they visually detach from the block edge.
    ///
    /// A socket on a connection-helper block gets a zero-length stub, so a
    /// connection that is still being dragged out renders as a single
    /// flexible line.
    pub fn socket_start_line(&self, socket: &Socket, grid: &Grid) -> Line {
        let start = socket.pos + self.pos;
        if self.connection_helper {
            return Line::new(start, start);
        }
        let stand_off = grid.stand_off();
        let end = match socket.direction() {
            Direction::Left => start + Point::new(-stand_off, 0.0),
            Direction::Right => start + Point::new(stand_off, 0.0),
            Direction::Top => start + Point::new(0.0, -stand_off),
            Direction::Bottom => start + Point::new(0.0, stand_off),
        };
        Line::new(start, end)
    }
}

impl Network {
    /// Stub line of the socket behind a flat address.
    pub fn socket_stub_line(&self, flat: &str, grid: &Grid) -> Result<Line, NetworkError> {
        let (_, block, socket) = self.lookup(flat)?;
        Ok(block.socket_start_line(socket, grid))
    }

    /// Recomputes a connector's segment offsets so the polyline exactly spans
    /// the gap between its two stub endpoints. Idempotent: with no geometry
    /// change the residual is zero and nothing is modified.
    pub fn adjust_connector(
        &mut self,
        handle: ConnectorHandle,
        grid: &Grid,
    ) -> Result<(), NetworkError> {
        let Some(connector) = self.connector(handle) else {
            return Ok(());
        };
        let start = self.socket_stub_line(&connector.source, grid)?;
        let end = self.socket_stub_line(&connector.target, grid)?;
        let delta = end.p2 - start.p2;
        if let Some(connector) = self.connector_mut(handle) {
            adjust_segments(&mut connector.segments, delta, grid);
        }
        Ok(())
    }

    /// Runs [`Network::adjust_connector`] over every connector, e.g. after
    /// loading a stored diagram. Lookup failures are reported and the
    /// offending connector is skipped.
    pub fn adjust_connectors(&mut self, grid: &Grid) {
        for handle in self.connectors.handles() {
            if let Err(e) = self.adjust_connector(handle, grid) {
                eprintln!("[blocknet] Warning: cannot adjust connector: {}", e);
            }
        }
    }
}

/// Distributes the gap `delta` onto the segment list: the contribution of
/// existing segments is subtracted first, then each remaining axis residual
/// goes to the *first* segment of matching direction, or a new trailing
/// segment if none exists.
///
/// The vertical residual is resolved before the horizontal one. This is an
/// arbitrary but fixed tie-break; changing it would re-route stored diagrams.
pub fn adjust_segments(segments: &mut Vec<Segment>, delta: Point, grid: &Grid) {
    let mut dx = delta.x;
    let mut dy = delta.y;
    for seg in segments.iter() {
        match seg.direction {
            Orientation::Horizontal => dx -= seg.offset,
            Orientation::Vertical => dy -= seg.offset,
        }
    }

    if !grid.near_zero(dy) {
        match segments
            .iter_mut()
            .find(|s| s.direction == Orientation::Vertical)
        {
            Some(seg) => seg.offset += dy,
            None => segments.push(Segment::new(Orientation::Vertical, dy)),
        }
    }
    if !grid.near_zero(dx) {
        match segments
            .iter_mut()
            .find(|s| s.direction == Orientation::Horizontal)
        {
            Some(seg) => seg.offset += dx,
            None => segments.push(Segment::new(Orientation::Horizontal, dx)),
        }
    }
}

/// Absorbs an interactive drag of the segment at `index` by `(dx, dy)` into
/// the rest of the list so that both connector endpoints stay fixed. Returns
/// the dragged segment's index, which shifts when a new segment is inserted
/// before it. An out-of-range index leaves the list unchanged.
///
/// Walking backward from the dragged segment, the first segment of matching
/// direction absorbs each delta component; a leftover component is taken by
/// the dragged segment itself if its direction matches, otherwise a new
/// segment is inserted just before it. The same walk then runs forward with
/// mirrored sign, appending at the end if no match exists, so the tail stays
/// anchored.
pub fn distribute_drag(
    segments: &mut Vec<Segment>,
    index: usize,
    dx: f64,
    dy: f64,
    grid: &Grid,
) -> usize {
    if index >= segments.len() {
        return index;
    }
    let mut seg_idx = index;

    // towards the start
    let mut rx = dx;
    let mut ry = dy;
    let mut i = index;
    while i > 0 && (!grid.near_zero(rx) || !grid.near_zero(ry)) {
        i -= 1;
        let seg = &mut segments[i];
        if !grid.near_zero(rx) && seg.direction == Orientation::Horizontal {
            seg.offset += rx;
            rx = 0.0;
        }
        if !grid.near_zero(ry) && seg.direction == Orientation::Vertical {
            seg.offset += ry;
            ry = 0.0;
        }
    }

    // leftovers: extend the dragged segment itself if it matches, otherwise
    // compensate with a new segment right before it
    if !grid.near_zero(rx) {
        if segments[seg_idx].direction == Orientation::Horizontal {
            segments[seg_idx].offset += rx;
        } else {
            segments.insert(seg_idx, Segment::new(Orientation::Horizontal, rx));
            seg_idx += 1;
        }
    }
    if !grid.near_zero(ry) {
        if segments[seg_idx].direction == Orientation::Vertical {
            segments[seg_idx].offset += ry;
        } else {
            segments.insert(seg_idx, Segment::new(Orientation::Vertical, ry));
            seg_idx += 1;
        }
    }

    // towards the end, with mirrored sign
    let mut rx = dx;
    let mut ry = dy;
    let mut i = seg_idx + 1;
    while i < segments.len() && (!grid.near_zero(rx) || !grid.near_zero(ry)) {
        let seg = &mut segments[i];
        if !grid.near_zero(rx) && seg.direction == Orientation::Horizontal {
            seg.offset -= rx;
            rx = 0.0;
        }
        if !grid.near_zero(ry) && seg.direction == Orientation::Vertical {
            seg.offset -= ry;
            ry = 0.0;
        }
        i += 1;
    }
    if !grid.near_zero(rx) {
        segments.push(Segment::new(Orientation::Horizontal, -rx));
    }
    if !grid.near_zero(ry) {
        segments.push(Segment::new(Orientation::Vertical, -ry));
    }

    seg_idx
}

/// Drag-release cleanup: repeatedly folds adjacent same-direction segments
/// into one (summing offsets) and removes near-zero segments, until a full
/// scan finds nothing to change. Removing an interior near-zero segment can
/// make its neighbors adjacent; those are folded as well. Returns true if
/// the list changed.
pub fn merge_segments(segments: &mut Vec<Segment>, grid: &Grid) -> bool {
    let mut changed = false;
    loop {
        // one scan: fold same-direction pairs into the earlier segment and
        // stop at the first near-zero segment
        let mut zero_idx = None;
        for i in 0..segments.len() {
            if i > 0 && segments[i - 1].direction == segments[i].direction {
                let offset = segments[i].offset;
                segments[i - 1].offset += offset;
                segments[i].offset = 0.0;
                changed = true;
            }
            if grid.near_zero(segments[i].offset) {
                zero_idx = Some(i);
                break;
            }
        }
        let Some(i) = zero_idx else {
            break;
        };

        segments.remove(i);
        changed = true;
        // the removal may have made two same-direction segments adjacent
        if i > 0 && i < segments.len() && segments[i - 1].direction == segments[i].direction {
            let offset = segments[i].offset;
            segments[i - 1].offset += offset;
            segments.remove(i);
        }
    }
    changed
}
