use std::io::Cursor;

use chrono::{TimeZone, Utc};
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::post::Post;

/* Example
<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
<channel>
  <title>My blog</title>
  <link>https://example.com</link>
  <description>Posts about things</description>
  <item>
    <title>Hello World</title>
    <link>https://example.com/hello-world</link>
    <guid isPermaLink="false">hello-world</guid>
    <description><![CDATA[<p>The excerpt</p>]]></description>
    <pubDate>Mon, 1 Jan 2024 00:00:00 +0000</pubDate>
  </item>
</channel>
</rss>
*/

pub struct RssChannel<'a> {
    pub ch_title: &'a str,
    pub ch_link: &'a str,
    pub ch_desc: &'a str,
}

impl<'a> RssChannel<'a> {
    /// Renders `posts` in the given order, callers pass them newest first.
    pub fn render(&self, posts: &[Post]) -> quick_xml::Result<Vec<u8>> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        let mut rss = BytesStart::new("rss");
        rss.push_attribute(("version", "2.0"));
        writer.write_event(Event::Start(rss))?;
        writer.write_event(Event::Start(BytesStart::new("channel")))?;

        push_text(&mut writer, "title", self.ch_title)?;
        push_text(&mut writer, "link", self.ch_link)?;
        push_text(&mut writer, "description", self.ch_desc)?;

        for post in posts {
            writer.write_event(Event::Start(BytesStart::new("item")))?;

            push_text(&mut writer, "title", &post.title)?;
            push_text(&mut writer, "link", &post_link(self.ch_link, &post.slug))?;

            // slugs survive edits, hashes do not
            let mut guid = BytesStart::new("guid");
            guid.push_attribute(("isPermaLink", "false"));
            writer.write_event(Event::Start(guid))?;
            writer.write_event(Event::Text(BytesText::new(&post.slug)))?;
            writer.write_event(Event::End(BytesEnd::new("guid")))?;

            push_cdata(&mut writer, "description", &post.excerpt)?;

            let published = Utc.from_utc_datetime(&post.created_at);
            push_text(&mut writer, "pubDate", &published.to_rfc2822())?;

            writer.write_event(Event::End(BytesEnd::new("item")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("channel")))?;
        writer.write_event(Event::End(BytesEnd::new("rss")))?;

        Ok(writer.into_inner().into_inner())
    }
}

fn post_link(base_url: &str, slug: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), slug)
}

fn push_text(writer: &mut Writer<Cursor<Vec<u8>>>, tag: &str, text: &str) -> quick_xml::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

fn push_cdata(writer: &mut Writer<Cursor<Vec<u8>>>, tag: &str, text: &str) -> quick_xml::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    // "]]>" cannot live in one section: close after "]]", reopen before ">"
    let mut rest = text;
    while let Some(idx) = rest.find("]]>") {
        writer.write_event(Event::CData(BytesCData::new(&rest[..idx + 2])))?;
        rest = &rest[idx + 2..];
    }
    writer.write_event(Event::CData(BytesCData::new(rest)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}
