// tests/rss_provider.rs
use chrono::{TimeZone, Utc};
use rss_hugo_ai::ingest::load_entries;
use rss_hugo_ai::ingest::providers::rss::{parse_feed, RssFeed};
use rss_hugo_ai::FeedSource;

const FIXTURE: &str = include_str!("fixtures/feed.xml");

#[tokio::test]
async fn fixture_feed_yields_entries_in_order() {
    let feed = RssFeed::from_fixture(FIXTURE);
    let entries = load_entries(&feed).await.unwrap();
    assert_eq!(entries.len(), 2);

    let first = &entries[0];
    assert_eq!(first.id, "story-1");
    assert_eq!(first.title, "Star & Director Announce New Film");
    assert_eq!(first.link, "https://news.example/story-1");
    assert_eq!(first.summary, "The pair will shoot in Kyoto.");
    assert_eq!(
        first.published,
        Utc.with_ymd_and_hms(2025, 6, 9, 19, 0, 0).unwrap()
    );

    // No guid: the link is the identity.
    assert_eq!(entries[1].id, "https://news.example/story-2");
    assert_eq!(
        entries[1].published,
        Utc.with_ymd_and_hms(2025, 6, 10, 8, 30, 0).unwrap()
    );
}

#[tokio::test]
async fn fixture_source_has_a_name() {
    let feed = RssFeed::from_fixture(FIXTURE);
    assert_eq!(feed.name(), "fixture");
}

#[test]
fn atom_feeds_are_accepted() {
    let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Example</title>
  <entry>
    <id>tag:news.example,2025:1</id>
    <title type="text">Atom Story</title>
    <link rel="self" href="https://news.example/self/1"/>
    <link rel="alternate" href="https://news.example/atom-1"/>
    <updated>2025-06-09T19:00:00Z</updated>
    <summary type="html">&lt;b&gt;Bold&lt;/b&gt; summary</summary>
  </entry>
</feed>"#;
    let entries = parse_feed(xml).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, "tag:news.example,2025:1");
    assert_eq!(entries[0].link, "https://news.example/atom-1");
    assert_eq!(entries[0].summary, "Bold summary");
}
