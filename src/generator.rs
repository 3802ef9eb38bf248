//! Network XML generation.
//!
//! Writes the `<BlockNetwork>` document format read back by
//! [`crate::parser`]. The output uses 2-space indentation and a stable
//! element order, so generated files diff cleanly under version control.
//!
//! Connection-helper blocks (and any connector still attached to one) exist
//! only while a connection is being dragged out; they are never written.

use crate::geometry::Orientation;
use crate::model::{split_flat_name, Block, Connector, Network};
use anyhow::{Context, Result};
use camino::Utf8Path;

/// Saves a network to an XML file.
pub fn save_network(network: &Network, path: impl AsRef<Utf8Path>) -> Result<()> {
    let path = path.as_ref();
    std::fs::write(path.as_str(), write_network(network))
        .with_context(|| format!("Failed to write {}", path))
}

/// Generates the XML text for a network.
pub fn write_network(network: &Network) -> String {
    let mut out = String::with_capacity(4096);
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str("<BlockNetwork>\n");

    let blocks: Vec<&Block> = network
        .blocks()
        .map(|(_, b)| b)
        .filter(|b| !b.connection_helper)
        .collect();
    if !blocks.is_empty() {
        out.push_str("  <Blocks>\n");
        for block in &blocks {
            write_block(&mut out, block, 2);
        }
        out.push_str("  </Blocks>\n");
    }

    let connectors: Vec<&Connector> = network
        .connectors()
        .map(|(_, c)| c)
        .filter(|c| !references_helper(network, c))
        .collect();
    if !connectors.is_empty() {
        out.push_str("  <Connectors>\n");
        for connector in &connectors {
            write_connector(&mut out, connector, 2);
        }
        out.push_str("  </Connectors>\n");
    }

    out.push_str("</BlockNetwork>\n");
    out
}

fn references_helper(network: &Network, connector: &Connector) -> bool {
    [&connector.source, &connector.target].into_iter().any(|addr| {
        split_flat_name(addr)
            .ok()
            .and_then(|(block, _)| network.block_by_name(block))
            .map(|(_, b)| b.connection_helper)
            .unwrap_or(false)
    })
}

fn indent(out: &mut String, level: usize) {
    for _ in 0..level {
        out.push_str("  ");
    }
}

/// Escape text content for XML.
fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Formats a coordinate without a trailing `.0` on whole numbers, so file
/// output stays readable for grid-aligned diagrams.
fn fmt_coord(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

fn fmt_point(x: f64, y: f64) -> String {
    format!("{}, {}", fmt_coord(x), fmt_coord(y))
}

fn write_block(out: &mut String, block: &Block, level: usize) {
    indent(out, level);
    out.push_str(&format!("<Block name=\"{}\">\n", xml_escape(&block.name)));
    indent(out, level + 1);
    out.push_str(&format!(
        "<Position>{}</Position>\n",
        fmt_point(block.pos.x, block.pos.y)
    ));
    indent(out, level + 1);
    out.push_str(&format!(
        "<Size>{}</Size>\n",
        fmt_point(block.size.width, block.size.height)
    ));

    if !block.sockets.is_empty() {
        indent(out, level + 1);
        out.push_str("<Sockets>\n");
        for socket in &block.sockets {
            indent(out, level + 2);
            out.push_str(&format!("<Socket name=\"{}\">\n", xml_escape(&socket.name)));
            indent(out, level + 3);
            out.push_str(&format!(
                "<Position>{}</Position>\n",
                fmt_point(socket.pos.x, socket.pos.y)
            ));
            indent(out, level + 3);
            out.push_str(&format!(
                "<Orientation>{}</Orientation>\n",
                orientation_name(socket.orientation)
            ));
            indent(out, level + 3);
            out.push_str(&format!(
                "<Inlet>{}</Inlet>\n",
                if socket.inlet { "true" } else { "false" }
            ));
            indent(out, level + 2);
            out.push_str("</Socket>\n");
        }
        indent(out, level + 1);
        out.push_str("</Sockets>\n");
    }

    if !block.properties.is_empty() {
        indent(out, level + 1);
        out.push_str("<Properties>\n");
        for (key, value) in &block.properties {
            indent(out, level + 2);
            out.push_str(&format!(
                "<Property name=\"{}\">{}</Property>\n",
                xml_escape(key),
                xml_escape(value)
            ));
        }
        indent(out, level + 1);
        out.push_str("</Properties>\n");
    }

    indent(out, level);
    out.push_str("</Block>\n");
}

fn write_connector(out: &mut String, connector: &Connector, level: usize) {
    indent(out, level);
    out.push_str(&format!(
        "<Connector name=\"{}\">\n",
        xml_escape(&connector.name)
    ));
    indent(out, level + 1);
    out.push_str(&format!("<Source>{}</Source>\n", xml_escape(&connector.source)));
    indent(out, level + 1);
    out.push_str(&format!("<Target>{}</Target>\n", xml_escape(&connector.target)));

    if !connector.segments.is_empty() {
        indent(out, level + 1);
        out.push_str("<Segments>\n");
        for segment in &connector.segments {
            indent(out, level + 2);
            out.push_str(&format!(
                "<Segment direction=\"{}\" offset=\"{}\"/>\n",
                orientation_name(segment.direction),
                fmt_coord(segment.offset)
            ));
        }
        indent(out, level + 1);
        out.push_str("</Segments>\n");
    }

    indent(out, level);
    out.push_str("</Connector>\n");
}

fn orientation_name(orientation: Orientation) -> &'static str {
    match orientation {
        Orientation::Horizontal => "Horizontal",
        Orientation::Vertical => "Vertical",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Grid, Point, Size};
    use crate::model::{demo_network, Socket};

    #[test]
    fn writes_demo_network_structure() {
        let grid = Grid::default();
        let xml = write_network(&demo_network(&grid));
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<BlockNetwork>\n"));
        assert!(xml.contains("<Block name=\"Source\">"));
        assert!(xml.contains("<Source>Source.right</Source>"));
        assert!(xml.contains("<Segment direction=\"Vertical\""));
        assert!(xml.ends_with("</BlockNetwork>\n"));
    }

    #[test]
    fn escapes_special_characters() {
        let mut network = Network::new();
        let mut block = Block::new("a<b>&\"c\"", 0.0, 0.0);
        block.properties.insert("note".to_string(), "1 < 2".to_string());
        network.add_block(block);
        let xml = write_network(&network);
        assert!(xml.contains("<Block name=\"a&lt;b&gt;&amp;&quot;c&quot;\">"));
        assert!(xml.contains("<Property name=\"note\">1 &lt; 2</Property>"));
    }

    #[test]
    fn helper_blocks_and_their_connectors_are_omitted() {
        let grid = Grid::default();
        let mut network = demo_network(&grid);
        let mut helper = Block::new("helper-1", 100.0, 100.0);
        helper.connection_helper = true;
        helper
            .sockets
            .push(Socket::new("in", Point::default(), Orientation::Horizontal, true));
        network.add_block(helper);
        network
            .add_connector(crate::model::Connector::new(
                "pending",
                "Source.left",
                "helper-1.in",
            ))
            .unwrap();

        let xml = write_network(&network);
        assert!(!xml.contains("helper-1"));
        assert!(!xml.contains("pending"));
    }

    #[test]
    fn whole_coordinates_print_without_fraction() {
        let mut network = Network::new();
        let mut block = Block::new("A", 8.0, -16.0);
        block.size = Size::new(160.0, 96.5);
        network.add_block(block);
        let xml = write_network(&network);
        assert!(xml.contains("<Position>8, -16</Position>"));
        assert!(xml.contains("<Size>160, 96.5</Size>"));
    }
}
