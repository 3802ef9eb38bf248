use blocknet::geometry::{Grid, Orientation, Point, Size};
use blocknet::model::{Block, Connector, ConnectorHandle, Network, Segment, Socket};
use blocknet::routing::{distribute_drag, merge_segments};

fn h(offset: f64) -> Segment {
    Segment::new(Orientation::Horizontal, offset)
}

fn v(offset: f64) -> Segment {
    Segment::new(Orientation::Vertical, offset)
}

/// Two blocks with a single outlet/inlet pair facing each other across a gap.
fn gap_network() -> (Network, ConnectorHandle) {
    let mut a = Block::new("A", 0.0, 0.0);
    a.size = Size::new(240.0, 160.0);
    a.sockets
        .push(Socket::new("out", Point::new(240.0, 64.0), Orientation::Horizontal, false));
    let mut b = Block::new("B", 400.0, 240.0);
    b.size = Size::new(240.0, 160.0);
    b.sockets
        .push(Socket::new("in", Point::new(0.0, 64.0), Orientation::Horizontal, true));

    let mut network = Network::new();
    network.add_block(a);
    network.add_block(b);
    let con = network
        .add_connector(Connector::new("c", "A.out", "B.in"))
        .expect("valid connector");
    (network, con)
}

/// End point of the segment walk from the source stub, and the target stub
/// point it must land on.
fn walk_end(network: &Network, handle: ConnectorHandle, grid: &Grid) -> (Point, Point) {
    let con = network.connector(handle).expect("live connector");
    let start = network.socket_stub_line(&con.source, grid).expect("source stub");
    let end = network.socket_stub_line(&con.target, grid).expect("target stub");
    let mut p = start.p2;
    for seg in &con.segments {
        p = p + seg.delta();
    }
    (p, end.p2)
}

fn assert_walk_closes(network: &Network, handle: ConnectorHandle, grid: &Grid) {
    let (got, want) = walk_end(network, handle, grid);
    assert!(
        (got.x - want.x).abs() < 1e-9 && (got.y - want.y).abs() < 1e-9,
        "walk ends at ({}, {}), target stub at ({}, {})",
        got.x,
        got.y,
        want.x,
        want.y
    );
}

#[test]
fn stub_lines_project_two_grid_units_outward() {
    let grid = Grid::default();
    let (network, _) = gap_network();
    let start = network.socket_stub_line("A.out", &grid).unwrap();
    assert_eq!(start.p1, Point::new(240.0, 64.0));
    assert_eq!(start.p2, Point::new(256.0, 64.0));
    let end = network.socket_stub_line("B.in", &grid).unwrap();
    assert_eq!(end.p1, Point::new(400.0, 304.0));
    assert_eq!(end.p2, Point::new(384.0, 304.0));
}

#[test]
fn adjust_routes_the_gap_vertical_first() {
    let grid = Grid::default();
    let (mut network, con) = gap_network();
    network.adjust_connector(con, &grid).unwrap();
    let segments = &network.connector(con).unwrap().segments;
    assert_eq!(*segments, vec![v(240.0), h(128.0)]);
    assert_walk_closes(&network, con, &grid);
}

#[test]
fn adjust_twice_changes_nothing() {
    let grid = Grid::default();
    let (mut network, con) = gap_network();
    network.adjust_connector(con, &grid).unwrap();
    let once = network.connector(con).unwrap().segments.clone();
    network.adjust_connector(con, &grid).unwrap();
    assert_eq!(network.connector(con).unwrap().segments, once);
}

#[test]
fn walk_closes_after_block_moves() {
    let grid = Grid::default();
    let (mut network, con) = gap_network();
    network.adjust_connector(con, &grid).unwrap();

    for pos in [
        Point::new(80.0, 40.0),
        Point::new(-160.0, 320.0),
        Point::new(0.0, 0.0),
    ] {
        let (a, _) = network.block_by_name("A").unwrap();
        network.block_mut(a).unwrap().pos = pos;
        network.adjust_connector(con, &grid).unwrap();
        assert_walk_closes(&network, con, &grid);
    }
}

#[test]
fn axis_aligned_blocks_collapse_a_segment_to_zero() {
    let grid = Grid::default();
    let (mut network, con) = gap_network();
    network.adjust_connector(con, &grid).unwrap();

    // move B so both stub points share the y coordinate; the vertical
    // segment stays in the list with a zero offset until a merge runs
    let (b, _) = network.block_by_name("B").unwrap();
    network.block_mut(b).unwrap().pos = Point::new(400.0, 0.0);
    network.adjust_connector(con, &grid).unwrap();
    assert_eq!(
        network.connector(con).unwrap().segments,
        vec![v(0.0), h(128.0)]
    );
    assert_walk_closes(&network, con, &grid);

    merge_segments(&mut network.connector_mut(con).unwrap().segments, &grid);
    assert_eq!(network.connector(con).unwrap().segments, vec![h(128.0)]);
    assert_walk_closes(&network, con, &grid);
}

#[test]
fn drag_along_own_axis_appends_compensation_and_merge_undoes_it() {
    let grid = Grid::default();
    let (mut network, con) = gap_network();
    network.adjust_connector(con, &grid).unwrap();

    // drag the horizontal segment by +40 along its own axis: nothing before
    // it can absorb, so it grows and a compensating tail appears
    let idx = distribute_drag(
        &mut network.connector_mut(con).unwrap().segments,
        1,
        40.0,
        0.0,
        &grid,
    );
    assert_eq!(idx, 1);
    assert_eq!(
        network.connector(con).unwrap().segments,
        vec![v(240.0), h(168.0), h(-40.0)]
    );
    assert_walk_closes(&network, con, &grid);

    // with both endpoints fixed a two-bend route has only one shape, so the
    // release-time merge folds the slide away
    merge_segments(&mut network.connector_mut(con).unwrap().segments, &grid);
    assert_eq!(
        network.connector(con).unwrap().segments,
        vec![v(240.0), h(128.0)]
    );
    assert_walk_closes(&network, con, &grid);
}

#[test]
fn drag_across_own_axis_reshapes_the_route() {
    let grid = Grid::default();
    let (mut network, con) = gap_network();
    network.adjust_connector(con, &grid).unwrap();

    // drag the horizontal segment downward: the vertical predecessor absorbs
    // the motion and a compensating vertical is appended
    let idx = distribute_drag(
        &mut network.connector_mut(con).unwrap().segments,
        1,
        0.0,
        16.0,
        &grid,
    );
    assert_eq!(idx, 1);
    assert_eq!(
        network.connector(con).unwrap().segments,
        vec![v(256.0), h(128.0), v(-16.0)]
    );
    assert_walk_closes(&network, con, &grid);

    // this is a genuine reshape, the merge has nothing to fold
    assert!(!merge_segments(
        &mut network.connector_mut(con).unwrap().segments,
        &grid
    ));
    assert_walk_closes(&network, con, &grid);
}

#[test]
fn walk_closes_across_a_mixed_operation_sequence() {
    let grid = Grid::default();
    let (mut network, con) = gap_network();
    network.adjust_connector(con, &grid).unwrap();

    distribute_drag(
        &mut network.connector_mut(con).unwrap().segments,
        1,
        24.0,
        16.0,
        &grid,
    );
    assert_walk_closes(&network, con, &grid);

    let (b, _) = network.block_by_name("B").unwrap();
    network.block_mut(b).unwrap().pos = Point::new(480.0, 80.0);
    network.adjust_connector(con, &grid).unwrap();
    assert_walk_closes(&network, con, &grid);

    merge_segments(&mut network.connector_mut(con).unwrap().segments, &grid);
    assert_walk_closes(&network, con, &grid);
    let segments = &network.connector(con).unwrap().segments;
    assert!(segments.iter().all(|s| !grid.near_zero(s.offset)));
    for pair in segments.windows(2) {
        assert_ne!(pair[0].direction, pair[1].direction);
    }
}

#[test]
fn helper_block_sockets_get_zero_length_stubs() {
    let grid = Grid::default();
    let mut helper = Block::new("helper-1", 120.0, 56.0);
    helper.connection_helper = true;
    let socket = Socket::new("in", Point::default(), Orientation::Horizontal, true);
    let line = helper.socket_start_line(&socket, &grid);
    assert_eq!(line.p1, Point::new(120.0, 56.0));
    assert_eq!(line.p2, line.p1);
}
