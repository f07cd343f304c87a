//! RSS/Atom parsing into flattened articles

use chrono::{DateTime, Utc};

use crate::models::Article;
use crate::utils::error::ParseError;

/// Parse RSS/Atom bytes into flattened articles.
///
/// Entry fields land under the placeholder names the rest of the core
/// understands: `guid`, `title`, `pubdate`, `link`, `description`,
/// `author`, `category`. Fields without a value are simply absent.
pub fn parse_articles(bytes: &[u8]) -> Result<Vec<Article>, ParseError> {
    let feed = feed_rs::parser::parse(bytes)
        .map_err(|e| ParseError::InvalidDocument(e.to_string()))?;

    let mut articles = Vec::with_capacity(feed.entries.len());
    for entry in feed.entries {
        let mut article = Article::new();

        set_if_present(&mut article, "guid", Some(entry.id));
        set_if_present(&mut article, "title", entry.title.map(|t| t.content));
        set_if_present(
            &mut article,
            "link",
            entry.links.first().map(|l| l.href.clone()),
        );
        set_if_present(
            &mut article,
            "pubdate",
            entry
                .published
                .or(entry.updated)
                .map(|d: DateTime<Utc>| d.to_rfc3339()),
        );
        set_if_present(
            &mut article,
            "description",
            entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body)),
        );
        set_if_present(
            &mut article,
            "author",
            entry.authors.first().map(|a| a.name.clone()),
        );
        set_if_present(
            &mut article,
            "category",
            entry.categories.first().map(|c| c.term.clone()),
        );

        articles.push(article);
    }

    Ok(articles)
}

fn set_if_present(article: &mut Article, field: &str, value: Option<String>) {
    if let Some(value) = value {
        if !value.is_empty() {
            article.set(field, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS_SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example Feed</title>
    <link>https://example.com</link>
    <item>
      <guid>item-1</guid>
      <title>First article</title>
      <link>https://example.com/1</link>
      <pubDate>Mon, 06 Jan 2025 10:00:00 GMT</pubDate>
      <description>Hello world</description>
    </item>
    <item>
      <guid>item-2</guid>
      <title>Second article</title>
      <link>https://example.com/2</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_rss_items() {
        let articles = parse_articles(RSS_SAMPLE.as_bytes()).unwrap();
        assert_eq!(articles.len(), 2);

        assert_eq!(articles[0].get("guid"), Some("item-1"));
        assert_eq!(articles[0].get("title"), Some("First article"));
        assert_eq!(articles[0].get("description"), Some("Hello world"));
        assert!(articles[0].has_field("pubdate"));

        // Second item has no pubDate or description
        assert_eq!(articles[1].get("guid"), Some("item-2"));
        assert!(!articles[1].has_field("pubdate"));
        assert!(!articles[1].has_field("description"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_articles(b"definitely not xml").is_err());
    }

    #[test]
    fn test_parse_atom_entries() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Feed</title>
  <id>urn:uuid:feed</id>
  <updated>2025-01-06T10:00:00Z</updated>
  <entry>
    <id>urn:uuid:entry-1</id>
    <title>Atom article</title>
    <updated>2025-01-06T10:00:00Z</updated>
    <link href="https://example.com/a1"/>
  </entry>
</feed>"#;

        let articles = parse_articles(atom.as_bytes()).unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].get("guid"), Some("urn:uuid:entry-1"));
        assert_eq!(articles[0].get("title"), Some("Atom article"));
        // Atom's updated maps to pubdate when published is absent
        assert!(articles[0].has_field("pubdate"));
    }
}
