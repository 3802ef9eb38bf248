use blocknet::generator::{save_network, write_network};
use blocknet::geometry::{Grid, Orientation, Point, Size};
use blocknet::model::{demo_network, Block, Connector, Network, NetworkDoc, Socket};
use blocknet::parser::{load_network, parse_network};
use camino::Utf8PathBuf;
use tempfile::TempDir;

fn utf8(dir: &TempDir, name: &str) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().join(name)).expect("utf-8 temp path")
}

#[test]
fn xml_round_trip_preserves_the_network() {
    let network = demo_network(&Grid::default());
    let xml = write_network(&network);
    let restored = parse_network(&xml).expect("parse generated XML");
    assert_eq!(restored, network);
}

#[test]
fn xml_round_trip_preserves_properties_and_fractions() {
    let mut network = Network::new();
    let mut block = Block::new("Gain", 8.0, -16.0);
    block.size = Size::new(96.0, 48.5);
    block.sockets
        .push(Socket::new("u", Point::new(0.0, 8.0), Orientation::Horizontal, true));
    block.properties.insert("Gain".to_string(), "2.5".to_string());
    block.properties.insert("note".to_string(), "a < b & c".to_string());
    network.add_block(block);

    let restored = parse_network(&write_network(&network)).expect("parse generated XML");
    assert_eq!(restored, network);
    let (_, block) = restored.block_by_name("Gain").unwrap();
    // property insertion order survives the trip
    let keys: Vec<&String> = block.properties.keys().collect();
    assert_eq!(keys, vec!["Gain", "note"]);
}

#[test]
fn xml_file_round_trip() {
    let dir = TempDir::new().expect("temp dir");
    let path = utf8(&dir, "demo.xml");
    let network = demo_network(&Grid::default());
    save_network(&network, &path).expect("save");
    let restored = load_network(&path).expect("load");
    assert_eq!(restored, network);
}

#[test]
fn load_filters_invalid_connectors_and_keeps_the_rest() {
    let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<BlockNetwork>
  <Blocks>
    <Block name="A">
      <Position>0, 0</Position>
      <Size>160, 96</Size>
      <Sockets>
        <Socket name="out">
          <Position>160, 16</Position>
          <Orientation>Horizontal</Orientation>
          <Inlet>false</Inlet>
        </Socket>
      </Sockets>
    </Block>
    <Block name="B">
      <Position>320, 160</Position>
      <Size>160, 96</Size>
      <Sockets>
        <Socket name="in">
          <Position>0, 16</Position>
          <Orientation>Horizontal</Orientation>
          <Inlet>true</Inlet>
        </Socket>
      </Sockets>
    </Block>
  </Blocks>
  <Connectors>
    <Connector name="dangling">
      <Source>Ghost.out</Source>
      <Target>B.in</Target>
    </Connector>
    <Connector name="good">
      <Source>A.out</Source>
      <Target>B.in</Target>
    </Connector>
    <Connector name="reversed">
      <Source>B.in</Source>
      <Target>A.out</Target>
    </Connector>
  </Connectors>
</BlockNetwork>
"#;
    let network = parse_network(xml).expect("load succeeds despite bad connectors");
    assert_eq!(network.blocks().count(), 2);
    let names: Vec<&str> = network.connectors().map(|(_, c)| c.name.as_str()).collect();
    assert_eq!(names, vec!["good"]);
}

#[test]
fn binary_round_trip() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("demo.bnet");
    let doc = NetworkDoc {
        network: demo_network(&Grid::default()),
    };
    doc.save_to_binary(&path).expect("save snapshot");
    let restored = NetworkDoc::load_from_binary(&path).expect("load snapshot");
    assert_eq!(restored.network, doc.network);
}

#[test]
fn binary_round_trip_with_vacant_arena_slots() {
    // removing a block leaves a permanently vacant slot behind; the snapshot
    // must encode only the live elements, with the length stated up front
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("edited.bnet");
    let mut network = demo_network(&Grid::default());
    let mut extra = Block::new("Scratch", 640.0, 0.0);
    extra.size = Size::new(80.0, 80.0);
    let handle = network.add_block(extra);
    network.remove_block(handle);

    let doc = NetworkDoc { network };
    doc.save_to_binary(&path).expect("save snapshot");
    let restored = NetworkDoc::load_from_binary(&path).expect("load snapshot");
    assert_eq!(restored.network, doc.network);
    assert_eq!(restored.network.blocks().count(), 2);
}

#[test]
fn binary_snapshot_omits_connection_helpers() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("pending.bnet");
    let grid = Grid::default();
    let mut network = demo_network(&grid);
    let mut helper = Block::new("helper-1", 200.0, 200.0);
    helper.connection_helper = true;
    helper
        .sockets
        .push(Socket::new("in", Point::default(), Orientation::Horizontal, true));
    network.add_block(helper);
    network
        .add_connector(Connector::new("pending", "Source.left", "helper-1.in"))
        .expect("synthetic connector");

    NetworkDoc { network }.save_to_binary(&path).expect("save snapshot");
    let restored = NetworkDoc::load_from_binary(&path).expect("load snapshot");
    assert!(!restored.network.has_block("helper-1"));
    assert_eq!(restored.network.connectors().count(), 1);
    assert_eq!(restored.network, demo_network(&grid));
}

#[test]
fn binary_load_rejects_wrong_magic() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("bogus.bnet");
    std::fs::write(&path, b"NOTBLOCKNETDATA").expect("write");
    let err = NetworkDoc::load_from_binary(&path).unwrap_err();
    assert!(err.to_string().contains("magic"));
}

#[test]
fn connection_helper_state_never_reaches_disk() {
    let grid = Grid::default();
    let mut network = demo_network(&grid);
    let mut helper = Block::new("helper-1", 200.0, 200.0);
    helper.connection_helper = true;
    helper
        .sockets
        .push(Socket::new("in", Point::default(), Orientation::Horizontal, true));
    network.add_block(helper);
    network
        .add_connector(Connector::new("pending", "Source.left", "helper-1.in"))
        .expect("synthetic connector");

    let restored = parse_network(&write_network(&network)).expect("parse generated XML");
    assert!(!restored.has_block("helper-1"));
    assert_eq!(restored.connectors().count(), 1);
    assert_eq!(restored, demo_network(&grid));
}
