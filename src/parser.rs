//! Network XML parser.
//!
//! Reads the `<BlockNetwork>` document format into a [`Network`]. Structural
//! problems (malformed XML, unknown elements, bad coordinates) abort the load;
//! connectors whose endpoints do not validate are filtered out with a warning
//! so one stale connector cannot make a whole diagram unloadable.

use crate::geometry::{Orientation, Point, Size};
use crate::model::{Block, Connector, Network, Segment, Socket};
use anyhow::{anyhow, bail, Context, Result};
use camino::Utf8Path;
use roxmltree::{Document, Node};

/// Loads a network from an XML file.
pub fn load_network(path: impl AsRef<Utf8Path>) -> Result<Network> {
    let path = path.as_ref();
    let text =
        std::fs::read_to_string(path.as_str()).with_context(|| format!("Failed to read {}", path))?;
    parse_network(&text).with_context(|| format!("Failed to load network from {}", path))
}

/// Parses a network from XML text. Invalid connectors are skipped with a
/// warning on stderr; everything else fails the parse.
pub fn parse_network(xml: &str) -> Result<Network> {
    let doc = Document::parse(xml).context("Failed to parse XML")?;
    let root = doc.root_element();
    if !root.has_tag_name("BlockNetwork") {
        bail!(
            "Expected <BlockNetwork> root element, found <{}>",
            root.tag_name().name()
        );
    }

    let mut network = Network::new();
    let mut connectors: Vec<Connector> = Vec::new();

    for section in root.children().filter(|c| c.is_element()) {
        match section.tag_name().name() {
            "Blocks" => {
                for node in section
                    .children()
                    .filter(|c| c.is_element() && c.has_tag_name("Block"))
                {
                    network.add_block(parse_block_node(node)?);
                }
            }
            "Connectors" => {
                for node in section
                    .children()
                    .filter(|c| c.is_element() && c.has_tag_name("Connector"))
                {
                    connectors.push(parse_connector_node(node)?);
                }
            }
            other => bail!("Unknown element <{}> in BlockNetwork", other),
        }
    }

    // endpoint validation is skip-and-report: the offending connector is
    // dropped, the rest of the diagram still loads
    for connector in connectors {
        let name = connector.name.clone();
        if let Err(e) = network.add_connector(connector) {
            eprintln!("[blocknet] Warning: skipping connector '{}': {}", name, e);
        }
    }

    Ok(network)
}

fn parse_block_node(node: Node) -> Result<Block> {
    let name = node.attribute("name").unwrap_or("").to_string();
    let mut block = Block::new(name, 0.0, 0.0);

    for child in node.children().filter(|c| c.is_element()) {
        match child.tag_name().name() {
            "Position" => block.pos = decode_point(child)?,
            "Size" => {
                let p = decode_point(child)?;
                block.size = Size::new(p.x, p.y);
            }
            "Sockets" => {
                for snode in child
                    .children()
                    .filter(|c| c.is_element() && c.has_tag_name("Socket"))
                {
                    block.sockets.push(parse_socket_node(snode)?);
                }
            }
            "Properties" => {
                for pnode in child
                    .children()
                    .filter(|c| c.is_element() && c.has_tag_name("Property"))
                {
                    let key = pnode.attribute("name").unwrap_or("").to_string();
                    let value = pnode.text().unwrap_or("").to_string();
                    block.properties.insert(key, value);
                }
            }
            other => bail!("Unknown element <{}> in Block '{}'", other, block.name),
        }
    }

    Ok(block)
}

fn parse_socket_node(node: Node) -> Result<Socket> {
    let name = node.attribute("name").unwrap_or("").to_string();
    let mut socket = Socket::new(name, Point::default(), Orientation::Horizontal, false);

    for child in node.children().filter(|c| c.is_element()) {
        match child.tag_name().name() {
            "Position" => socket.pos = decode_point(child)?,
            // anything but "Horizontal" means vertical
            "Orientation" => {
                socket.orientation = if child.text() == Some("Horizontal") {
                    Orientation::Horizontal
                } else {
                    Orientation::Vertical
                };
            }
            "Inlet" => socket.inlet = child.text() == Some("true"),
            other => bail!("Unknown element <{}> in Socket '{}'", other, socket.name),
        }
    }

    Ok(socket)
}

fn parse_connector_node(node: Node) -> Result<Connector> {
    let name = node.attribute("name").unwrap_or("").to_string();
    let mut connector = Connector::new(name, "", "");

    for child in node.children().filter(|c| c.is_element()) {
        match child.tag_name().name() {
            "Source" => connector.source = child.text().unwrap_or("").to_string(),
            "Target" => connector.target = child.text().unwrap_or("").to_string(),
            "Segments" => {
                for snode in child
                    .children()
                    .filter(|c| c.is_element() && c.has_tag_name("Segment"))
                {
                    connector.segments.push(parse_segment_node(snode)?);
                }
            }
            other => bail!(
                "Unknown element <{}> in Connector '{}'",
                other,
                connector.name
            ),
        }
    }

    Ok(connector)
}

fn parse_segment_node(node: Node) -> Result<Segment> {
    let direction = match node.attribute("direction") {
        Some("Horizontal") => Orientation::Horizontal,
        Some("Vertical") => Orientation::Vertical,
        other => bail!("Invalid Segment direction {:?}", other),
    };
    let offset = node
        .attribute("offset")
        .ok_or_else(|| anyhow!("Segment is missing the offset attribute"))?;
    let offset: f64 = offset
        .trim()
        .parse()
        .with_context(|| format!("Invalid Segment offset '{}'", offset))?;
    Ok(Segment::new(direction, offset))
}

/// Decodes an `x, y` coordinate pair from an element's text content.
fn decode_point(node: Node) -> Result<Point> {
    let text = node.text().unwrap_or("");
    let (x, y) = text
        .split_once(',')
        .ok_or_else(|| anyhow!("Invalid coordinate pair '{}'", text))?;
    let x: f64 = x
        .trim()
        .parse()
        .with_context(|| format!("Invalid coordinate pair '{}'", text))?;
    let y: f64 = y
        .trim()
        .parse()
        .with_context(|| format!("Invalid coordinate pair '{}'", text))?;
    Ok(Point::new(x, y))
}
