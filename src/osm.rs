use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;

use crate::error::ConvertError;
use crate::node::OutputNode;

pub const OSM_VERSION: &str = "0.6";
pub const GENERATOR: &str = "kml2osm";

/// Streams `<osm>` node blocks. Attribute values are escaped by quick-xml.
pub struct OsmWriter<W: Write> {
    writer: Writer<W>,
}

impl<W: Write> OsmWriter<W> {
    /// Writes the XML declaration and the opening `<osm>` element.
    pub fn start(inner: W) -> Result<Self> {
        let mut writer = Writer::new_with_indent(inner, b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        let mut osm = BytesStart::new("osm");
        osm.push_attribute(("version", OSM_VERSION));
        osm.push_attribute(("generator", GENERATOR));
        writer.write_event(Event::Start(osm))?;
        Ok(OsmWriter { writer })
    }

    pub fn write_node(&mut self, node: &OutputNode) -> Result<()> {
        let mut start = BytesStart::new("node");
        start.push_attribute(("id", node.id.to_string().as_str()));
        start.push_attribute(("visible", "true"));
        start.push_attribute(("lat", node.lat.to_string().as_str()));
        start.push_attribute(("lon", node.lon.to_string().as_str()));
        self.writer.write_event(Event::Start(start))?;
        for (k, v) in &node.tags {
            let mut tag = BytesStart::new("tag");
            tag.push_attribute(("k", k.as_str()));
            tag.push_attribute(("v", v.as_str()));
            self.writer.write_event(Event::Empty(tag))?;
        }
        self.writer.write_event(Event::End(BytesEnd::new("node")))?;
        Ok(())
    }

    /// Closes `</osm>` and flushes, handing back the sink.
    pub fn finish(mut self) -> Result<W> {
        self.writer.write_event(Event::End(BytesEnd::new("osm")))?;
        let mut inner = self.writer.into_inner();
        inner.write_all(b"\n")?;
        inner.flush()?;
        Ok(inner)
    }
}

#[cfg(test)]
pub fn render(nodes: &[OutputNode]) -> Result<String> {
    let mut out = OsmWriter::start(Vec::new())?;
    for node in nodes {
        out.write_node(node)?;
    }
    let bytes = out.finish()?;
    Ok(String::from_utf8(bytes)?)
}

/// Writes to a sibling temp file and renames it over `path`, so a failed run leaves no partial output.
pub fn write_file(path: &Path, nodes: &[OutputNode]) -> Result<()> {
    let tmp = temp_path(path);
    let file = File::create(&tmp).map_err(|source| ConvertError::Write {
        path: tmp.clone(),
        source,
    })?;

    let written = (|| -> Result<()> {
        let mut out = OsmWriter::start(BufWriter::new(file))?;
        for node in nodes {
            out.write_node(node)?;
        }
        out.finish()?;
        Ok(())
    })();
    if let Err(e) = written {
        let _ = std::fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("Failed to write {}", path.display()));
    }

    std::fs::rename(&tmp, path).map_err(|source| ConvertError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
