//! RSS 2.0 output.

use std::io::{Cursor, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::app::{PagefeedError, Result};
use crate::domain::Feed;
use crate::fetcher::http_fetcher::{NAME, VERSION};

fn xml_error(e: impl std::fmt::Display) -> PagefeedError {
    PagefeedError::Xml(e.to_string())
}

fn write_element<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml_error)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(xml_error)?;
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_error)?;
    Ok(())
}

/// Serialize `feed` as an RSS 2.0 document. Entries without a link are
/// skipped; a feed without a source URL is rejected.
pub fn to_rss(feed: &Feed) -> Result<String> {
    let url = feed
        .url
        .as_ref()
        .ok_or_else(|| PagefeedError::InvalidFeed(feed.title.clone()))?;

    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_error)?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    writer.write_event(Event::Start(rss)).map_err(xml_error)?;
    writer
        .write_event(Event::Start(BytesStart::new("channel")))
        .map_err(xml_error)?;

    let pub_date = feed.last_modified.to_rfc2822();
    write_element(&mut writer, "title", &feed.title)?;
    write_element(&mut writer, "link", url.as_str())?;
    write_element(&mut writer, "description", &feed.description)?;
    write_element(&mut writer, "pubDate", &pub_date)?;
    write_element(&mut writer, "lastBuildDate", &pub_date)?;
    write_element(&mut writer, "generator", &format!("{NAME} {VERSION}"))?;

    for entry in &feed.entries {
        let Some(link) = entry.link.as_ref() else {
            continue;
        };

        writer
            .write_event(Event::Start(BytesStart::new("item")))
            .map_err(xml_error)?;
        write_element(&mut writer, "title", entry.display_title())?;
        write_element(&mut writer, "link", link.as_str())?;
        write_element(&mut writer, "description", &entry.content)?;
        if let Some(date) = entry.pub_date {
            write_element(&mut writer, "pubDate", &date.to_rfc2822())?;
        }

        let mut guid = BytesStart::new("guid");
        guid.push_attribute(("isPermaLink", "true"));
        writer.write_event(Event::Start(guid)).map_err(xml_error)?;
        writer
            .write_event(Event::Text(BytesText::new(link.as_str())))
            .map_err(xml_error)?;
        writer
            .write_event(Event::End(BytesEnd::new("guid")))
            .map_err(xml_error)?;

        writer
            .write_event(Event::End(BytesEnd::new("item")))
            .map_err(xml_error)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("channel")))
        .map_err(xml_error)?;
    writer
        .write_event(Event::End(BytesEnd::new("rss")))
        .map_err(xml_error)?;

    String::from_utf8(writer.into_inner().into_inner()).map_err(xml_error)
}

/// Write the feed to `path` through a temporary file in the same directory
/// so readers never see a partial document.
pub fn write_feed_file(feed: &Feed, path: &Path) -> Result<()> {
    let content = to_rss(feed)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = path.with_extension(format!("tmp.{:016x}", suffix));

    let written = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .and_then(|mut file| {
            file.write_all(content.as_bytes())?;
            file.sync_all()
        })
        .and_then(|_| std::fs::rename(&temp_path, path));

    if let Err(e) = written {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e.into());
    }

    tracing::info!("Wrote {} ({} entries)", path.display(), feed.entries.len());
    Ok(())
}
