//! Tests for the extractor driver

use super::*;
use crate::pagination::{CursorPaginator, Page, PageSignal, StopReason};
use crate::source::PageRequest;
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replays canned pages of JSON posts
struct PostSource {
    pages: Mutex<VecDeque<Result<Page<Value>>>>,
    fetches: Mutex<usize>,
}

impl PostSource {
    fn new(pages: Vec<Result<Page<Value>>>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            fetches: Mutex::new(0),
        }
    }
}

#[async_trait]
impl ItemSource for PostSource {
    type Item = Value;

    async fn fetch_page(&self, _request: &PageRequest) -> Result<Page<Value>> {
        *self.fetches.lock().unwrap() += 1;
        self.pages
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Page::empty()))
    }
}

fn posts(items: Vec<Value>, next: Option<&str>) -> Result<Page<Value>> {
    let signal = match next {
        Some(token) => PageSignal::new().next_token(token),
        None => PageSignal::new(),
    };
    Ok(Page::new(items, signal))
}

fn gallery() -> JsonGroups {
    JsonGroups::new("src")
        .with_files("files")
        .field("id", "id")
        .field("title", "title")
}

fn driver(pages: Vec<Result<Page<Value>>>) -> Driver<PostSource> {
    let stream = PageStream::new(PostSource::new(pages), CursorPaginator::new("cursor"));
    Driver::new(stream, gallery(), "https://img.example.com/").unwrap()
}

fn fetches(driver: &Driver<PostSource>) -> usize {
    *driver.stream().source().fetches.lock().unwrap()
}

fn urls(messages: &[Message]) -> Vec<&str> {
    messages
        .iter()
        .filter_map(|m| match m {
            Message::Url { url, .. } | Message::Queue { url, .. } => Some(url.as_str()),
            Message::Directory { .. } => None,
        })
        .collect()
}

#[tokio::test]
async fn test_directory_precedes_group_urls() {
    let mut driver = driver(vec![posts(
        vec![
            json!({"id": 1, "title": "first", "files": [{"src": "a.jpg"}, {"src": "/b.png"}]}),
            json!({"id": 2, "title": "second", "files": [{"src": "https://cdn.example.com/c.gif"}]}),
        ],
        None,
    )]);
    let mut sink = Vec::new();

    let summary = driver.run(&mut sink).await.unwrap();

    let kinds: Vec<bool> = sink.iter().map(Message::is_directory).collect();
    assert_eq!(kinds, vec![true, false, false, true, false]);
    assert_eq!(
        urls(&sink),
        vec![
            "https://img.example.com/a.jpg",
            "https://img.example.com/b.png",
            "https://cdn.example.com/c.gif",
        ]
    );
    assert_eq!(summary.stats.groups, 2);
    assert_eq!(summary.stats.urls, 3);
    assert_eq!(summary.stop, Some(StopReason::NoMore));
    assert_eq!(summary.cursor, None);
}

#[tokio::test]
async fn test_url_metadata_merges_group_item_and_num() {
    let mut driver = driver(vec![posts(
        vec![json!({
            "id": 7,
            "title": "post",
            "files": [{"src": "a.jpg", "width": 10}, {"src": "b.jpg", "title": "override"}]
        })],
        None,
    )]);
    let mut sink = Vec::new();
    driver.run(&mut sink).await.unwrap();

    assert_eq!(
        Value::Object(sink[0].metadata().clone()),
        json!({"id": 7, "title": "post"})
    );
    assert_eq!(
        Value::Object(sink[1].metadata().clone()),
        json!({"id": 7, "title": "post", "src": "a.jpg", "width": 10, "num": 1})
    );
    assert_eq!(
        Value::Object(sink[2].metadata().clone()),
        json!({"id": 7, "title": "override", "src": "b.jpg", "num": 2})
    );
}

#[tokio::test]
async fn test_failed_group_is_skipped() {
    let mut driver = driver(vec![posts(
        vec![
            json!({"id": 1, "title": "ok", "files": [{"src": "a.jpg"}]}),
            json!({"id": 2, "title": "broken", "files": [{"name": "no url"}]}),
            json!({"id": 3, "files": [{"src": "c.jpg"}]}),
            json!({"id": 4, "title": "ok", "files": [{"src": "d.jpg"}]}),
        ],
        None,
    )]);
    let mut sink = Vec::new();

    let summary = driver.run(&mut sink).await.unwrap();

    assert_eq!(
        urls(&sink),
        vec!["https://img.example.com/a.jpg", "https://img.example.com/d.jpg"]
    );
    assert_eq!(sink.iter().filter(|m| m.is_directory()).count(), 2);
    assert_eq!(summary.stats.skipped_groups, 2);
}

#[tokio::test]
async fn test_group_without_entries_still_gets_directory() {
    let mut driver = driver(vec![posts(
        vec![json!({"id": 1, "title": "empty", "files": null})],
        None,
    )]);
    let mut sink = Vec::new();
    driver.run(&mut sink).await.unwrap();

    assert_eq!(sink.len(), 1);
    assert!(sink[0].is_directory());
}

#[tokio::test]
async fn test_page_error_ends_run_and_keeps_sent_messages() {
    let mut driver = driver(vec![
        posts(
            vec![json!({"id": 1, "title": "a", "files": [{"src": "a.jpg"}]})],
            Some("p2"),
        ),
        Err(Error::http_status(410, "gone")),
    ]);
    let mut sink = Vec::new();

    let err = driver.run(&mut sink).await.unwrap_err();

    assert!(matches!(err, Error::HttpStatus { status: 410, .. }));
    assert_eq!(urls(&sink), vec!["https://img.example.com/a.jpg"]);
    assert_eq!(driver.summary().cursor.as_deref(), Some("token:p2"));
}

#[tokio::test]
async fn test_limit_stops_pulling() {
    let mut driver = driver(vec![
        posts(
            vec![
                json!({"id": 1, "title": "a", "files": [{"src": "1.jpg"}, {"src": "2.jpg"}]}),
                json!({"id": 2, "title": "b", "files": [{"src": "3.jpg"}]}),
            ],
            Some("p2"),
        ),
        posts(vec![json!({"id": 3, "title": "c", "files": [{"src": "4.jpg"}]})], None),
    ])
    .with_config(DriverConfig::new().with_limit(1));
    let mut sink = Vec::new();

    let summary = driver.run(&mut sink).await.unwrap();

    assert_eq!(urls(&sink), vec!["https://img.example.com/1.jpg"]);
    assert_eq!(fetches(&driver), 1);
    assert!(summary.limited);
    assert_eq!(summary.stop, None);
    assert_eq!(summary.cursor.as_deref(), Some("start"));
}

#[tokio::test]
async fn test_limit_inside_last_group_keeps_its_page_cursor() {
    let mut driver = driver(vec![posts(
        vec![json!({"id": 1, "title": "a", "files": [{"src": "a.jpg"}, {"src": "b.jpg"}]})],
        None,
    )])
    .with_config(DriverConfig::new().with_limit(1));
    let mut sink = Vec::new();

    let summary = driver.run(&mut sink).await.unwrap();

    assert_eq!(urls(&sink), vec!["https://img.example.com/a.jpg"]);
    assert!(summary.limited);
    assert_eq!(summary.stop, Some(StopReason::NoMore));
    assert_eq!(summary.cursor.as_deref(), Some("start"));
}

#[tokio::test]
async fn test_limit_at_group_end_does_not_pin_cursor() {
    let mut driver = driver(vec![posts(
        vec![json!({"id": 1, "title": "a", "files": [{"src": "a.jpg"}]})],
        None,
    )])
    .with_config(DriverConfig::new().with_limit(1));
    let mut sink = Vec::new();

    let summary = driver.run(&mut sink).await.unwrap();

    assert_eq!(urls(&sink), vec!["https://img.example.com/a.jpg"]);
    assert!(summary.limited);
    assert_eq!(summary.cursor, None);
}

#[tokio::test]
async fn test_queue_messages() {
    let mut driver = driver(vec![posts(
        vec![json!({"id": 1, "title": "a", "files": [{"src": "/user/42"}]})],
        None,
    )])
    .with_config(DriverConfig::new().with_queue("profile"));
    let mut sink = Vec::new();

    let summary = driver.run(&mut sink).await.unwrap();

    match &sink[1] {
        Message::Queue { url, extractor, .. } => {
            assert_eq!(url, "https://img.example.com/user/42");
            assert_eq!(extractor, "profile");
        }
        other => panic!("unexpected message: {other:?}"),
    }
    assert_eq!(summary.stats.queued, 1);
    assert_eq!(summary.stats.urls, 0);
}

#[test]
fn test_driver_rejects_invalid_root() {
    let stream = PageStream::new(PostSource::new(Vec::new()), CursorPaginator::new("cursor"));
    assert!(Driver::new(stream, gallery(), "not a url").is_err());
}

#[test]
fn test_json_groups_single_entry_item() {
    let groups = JsonGroups::new("file_url");
    let item = json!({"id": 5, "file_url": "x.jpg", "tags": ["a"]});

    let entries = groups.entries(&item).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].url, "x.jpg");

    let metadata = groups.metadata(&item).unwrap();
    assert!(metadata.contains_key("id"));
    assert!(!metadata.contains_key("tags"));
}

#[test]
fn test_json_groups_missing_field() {
    let groups = JsonGroups::new("src").field("artist", "user.name");
    assert!(groups.metadata(&json!({"user": {}})).is_err());
    assert_eq!(
        groups.metadata(&json!({"user": {"name": "kim"}})).unwrap()["artist"],
        json!("kim")
    );
}

#[test]
fn test_json_groups_files_not_array() {
    let groups = JsonGroups::new("src").with_files("files");
    assert!(matches!(
        groups.entries(&json!({"files": "a.jpg"})),
        Err(Error::RecordExtraction { .. })
    ));
}

#[test]
fn test_json_lines_sink() {
    let mut sink = JsonLinesSink::new(Vec::new());
    let mut metadata = Metadata::new();
    metadata.insert("num".to_string(), json!(1));

    sink.send(Message::directory(Metadata::new())).unwrap();
    sink.send(Message::url("https://example.com/a.jpg", metadata))
        .unwrap();

    let output = String::from_utf8(sink.into_inner()).unwrap();
    let lines: Vec<Value> = output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(
        lines,
        vec![
            json!({"type": "directory", "metadata": {}}),
            json!({"type": "url", "url": "https://example.com/a.jpg", "metadata": {"num": 1}}),
        ]
    );
}
