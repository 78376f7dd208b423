//! Integration tests for the mirror
//!
//! These tests use wiremock to create mock HTTP servers and run full crawls
//! end-to-end into temporary directories.

use std::io::Write;
use std::sync::Arc;
use tempfile::TempDir;
use webmirror::config::{MirrorConfig, RootUrl, SaveMode};
use webmirror::storage::MAP_FILE;
use webmirror::Mirror;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn root(url: String, level: u32, down_level: u32, ext_level: u32) -> RootUrl {
    RootUrl {
        url,
        level,
        down_level,
        ext_level,
    }
}

/// Creates a test configuration for the given roots
fn create_test_config(urls: Vec<RootUrl>) -> MirrorConfig {
    MirrorConfig {
        retry: 2,
        parallel: 2,
        urls,
        ..MirrorConfig::default()
    }
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html")
}

/// Seeds the roots, runs every worker to completion and returns the outcome
async fn run_mirror(mirror: Mirror) -> (Arc<Mirror>, bool) {
    mirror.add_roots().expect("Failed to seed roots");
    let mirror = Arc::new(mirror);
    let failed = mirror.start().wait().await;
    (mirror, failed)
}

fn read(dir: &TempDir, file: &str) -> String {
    std::fs::read_to_string(dir.path().join(file))
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", file, e))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_full_mirror_flat() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(format!(
            r#"<html><head><link rel="stylesheet" href="/style.css"></head><body>
            <a href="page1.html">Page 1</a>
            <img src="{}/logo.png">
            <a href="http://elsewhere.invalid/">External</a>
            </body></html>"#,
            base_url
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page1.html"))
        .respond_with(html(
            r#"<html><body><a href="/">Home</a><a href="/deep/page2.html">Deeper</a></body></html>"#
                .to_string(),
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Out of link budget
    Mock::given(method("GET"))
        .and(path("/deep/page2.html"))
        .respond_with(html("<html></html>".to_string()))
        .expect(0)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/style.css"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("body { color: red }", "text/css"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"\x89PNG".to_vec(), "image/png"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(vec![root(format!("{}/", base_url), 2, 0, 0)]);
    let mirror = Mirror::create(dir.path(), config).expect("Failed to create mirror");
    let (mirror, failed) = run_mirror(mirror).await;

    assert!(!failed, "Mirror should succeed");
    assert_eq!(read(&dir, "style.css"), "body { color: red }");
    assert_eq!(std::fs::read(dir.path().join("logo.png")).unwrap(), b"\x89PNG");
    assert!(!dir.path().join("logo.png.part").exists());

    let index = read(&dir, "index.html");
    assert!(index.contains(r#"href="page1.html""#));
    assert!(index.contains(r#"href="style.css""#));
    assert!(index.contains(r#"src="logo.png""#));
    assert!(index.contains(r#"href="http://elsewhere.invalid/""#));
    assert!(index.contains(&format!(r#"tppabs="{}/page1.html""#, base_url)));

    let page1 = read(&dir, "page1.html");
    assert!(page1.contains(r#"href="index.html""#));
    assert!(page1.contains(&format!(r#"href="{}/deep/page2.html""#, base_url)));

    let map = read(&dir, MAP_FILE);
    assert!(map.contains(&format!("{}/\nindex.html text/html\n", base_url)));
    assert!(map.contains("style.css text/css"));

    let stats = mirror.statistics(chrono::Utc::now());
    assert_eq!(stats.succeeded, 4);
    assert_eq!(stats.failed, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_not_found_is_terminal() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<html><body><img src="/missing.png"></body></html>"#.to_string()))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(vec![root(format!("{}/", base_url), 1, 0, 0)]);
    config.retry = 5;
    let mirror = Mirror::create(dir.path(), config).unwrap();
    let (mirror, failed) = run_mirror(mirror).await;

    assert!(failed, "A 404 marks the run as failed");
    assert!(!dir.path().join("missing.png").exists());

    let index = read(&dir, "index.html");
    assert!(index.contains(&format!(r#"src="{}/missing.png""#, base_url)));

    let stats = mirror.statistics(chrono::Utc::now());
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.failed, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_retries_exhausted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(vec![root(format!("{}/", mock_server.uri()), 1, 0, 0)]);
    config.retry = 3;
    let mirror = Mirror::create(dir.path(), config).unwrap();
    let (mirror, failed) = run_mirror(mirror).await;

    assert!(failed);
    assert!(!dir.path().join("index.html").exists());
    // Nothing was allocated
    assert_eq!(read(&dir, MAP_FILE), "");

    let stats = mirror.statistics(chrono::Utc::now());
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.pending, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_resume_does_not_refetch() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<html><head><link rel="stylesheet" href="style.css"></head></html>"#.to_string(),
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/style.css"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("p {}", "text/css"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(vec![root(format!("{}/", base_url), 2, 0, 0)]);
    let (_, failed) = run_mirror(Mirror::create(dir.path(), config).unwrap()).await;
    assert!(!failed);
    let map_before = read(&dir, MAP_FILE);

    let mirror = Mirror::resume(dir.path(), Some(3)).expect("Failed to resume");
    assert_eq!(mirror.registry().len(), 2);
    let (mirror, failed) = run_mirror(mirror).await;

    assert!(!failed, "Continuing a finished mirror should succeed");
    assert_eq!(read(&dir, MAP_FILE), map_before);
    assert!(read(&dir, "index.html").contains(r#"href="style.css""#));

    let stats = mirror.statistics(chrono::Utc::now());
    assert_eq!(stats.succeeded, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_requisites_fetched_at_budget_edge() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<html><body><a href="/next.html">Next</a><img src="/pic.gif"></body></html>"#
                .to_string(),
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/next.html"))
        .respond_with(html("<html></html>".to_string()))
        .expect(0)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/pic.gif"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"GIF89a".to_vec(), "image/gif"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(vec![root(format!("{}/", mock_server.uri()), 1, 0, 0)]);
    let (_, failed) = run_mirror(Mirror::create(dir.path(), config).unwrap()).await;

    assert!(!failed);
    assert!(dir.path().join("pic.gif").exists());
    assert!(!dir.path().join("next.html").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_external_budget_and_collisions() {
    let site = MockServer::start().await;
    let other = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(format!(
            r#"<html><body><a href="{}/">Other site</a></body></html>"#,
            other.uri()
        )))
        .expect(1)
        .mount(&site)
        .await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(r#"<html><body><a href="/b2.html">More</a></body></html>"#.to_string()))
        .expect(1)
        .mount(&other)
        .await;

    // The external page got (1, 0, 0): its own links are out of budget
    Mock::given(method("GET"))
        .and(path("/b2.html"))
        .respond_with(html("<html></html>".to_string()))
        .expect(0)
        .mount(&other)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(vec![root(format!("{}/", site.uri()), 2, 0, 1)]);
    let (_, failed) = run_mirror(Mirror::create(dir.path(), config).unwrap()).await;

    assert!(!failed);
    assert!(read(&dir, "index.html").contains(r#"href="index-1.html""#));
    assert!(read(&dir, "index-1.html").contains("b2.html"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dir_mode_with_down_level() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/docs/guide/"))
        .respond_with(html(
            r#"<html><body><a href="../other.html">Up one</a><a href="/top.html">Up two</a></body></html>"#
                .to_string(),
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/docs/other.html"))
        .respond_with(html("<html></html>".to_string()))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/top.html"))
        .respond_with(html("<html></html>".to_string()))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config =
        create_test_config(vec![root(format!("{}/docs/guide/", mock_server.uri()), 3, 1, 0)]);
    config.save_mode = SaveMode::Dir;
    let (_, failed) = run_mirror(Mirror::create(dir.path(), config).unwrap()).await;

    assert!(!failed);
    let index = read(&dir, "docs/guide/index.html");
    assert!(index.contains(r#"href="../other.html""#));
    assert!(dir.path().join("docs/other.html").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_abort_before_start() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(html("<html></html>".to_string()))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(vec![root(format!("{}/", mock_server.uri()), 1, 0, 0)]);
    let mirror = Mirror::create(dir.path(), config).unwrap();
    mirror.add_roots().unwrap();
    mirror.abort();

    let mirror = Arc::new(mirror);
    let failed = mirror.start().wait().await;

    assert!(failed, "An aborted run counts as failed");
    let stats = mirror.statistics(chrono::Utc::now());
    assert_eq!(stats.pending, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_resume_interrupted_run() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    // The page survived the interruption
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("<html></html>".to_string()))
        .expect(0)
        .mount(&mock_server)
        .await;

    // Discovered but never logged
    Mock::given(method("GET"))
        .and(path("/a.css"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("a {}", "text/css"))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Logged, but the download never finished
    Mock::given(method("GET"))
        .and(path("/b.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"\x89PNG".to_vec(), "image/png"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(vec![root(format!("{}/", base_url), 2, 0, 0)]);
    drop(Mirror::create(dir.path(), config).unwrap());

    std::fs::write(
        dir.path().join("index.html"),
        r#"<html><head><link rel="stylesheet" href="a.css"></head><body><img src="b.png"></body></html>"#,
    )
    .unwrap();
    let mut map = std::fs::OpenOptions::new()
        .append(true)
        .open(dir.path().join(MAP_FILE))
        .unwrap();
    write!(
        map,
        "{0}/\nindex.html text/html\n{0}/b.png\nb.png image/png\n",
        base_url
    )
    .unwrap();
    drop(map);

    let mirror = Mirror::resume(dir.path(), None).expect("Failed to resume");
    assert_eq!(mirror.registry().len(), 2);
    let (mirror, failed) = run_mirror(mirror).await;

    assert!(!failed, "Resuming should succeed");
    assert_eq!(read(&dir, "a.css"), "a {}");
    assert_eq!(std::fs::read(dir.path().join("b.png")).unwrap(), b"\x89PNG");

    let index = read(&dir, "index.html");
    assert!(index.contains(r#"href="a.css""#));
    assert!(index.contains(r#"src="b.png""#));

    let map = read(&dir, MAP_FILE);
    assert_eq!(map.matches("b.png image/png").count(), 1);
    assert_eq!(map.matches("a.css text/css").count(), 1);

    let stats = mirror.statistics(chrono::Utc::now());
    assert_eq!(stats.succeeded, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_mirror_files_never_overwritten() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(
            r#"<html><body><img src="/webmirror.map"><a href="/webmirror.toml">cfg</a></body></html>"#
                .to_string(),
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/webmirror.map"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("garbage\n", "application/octet-stream"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/webmirror.toml"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("retry = \"x\"", "text/plain"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(vec![root(format!("{}/", base_url), 2, 0, 0)]);
    let (_, failed) = run_mirror(Mirror::create(dir.path(), config).unwrap()).await;

    assert!(!failed);
    assert_eq!(read(&dir, "webmirror-1.map"), "garbage\n");
    assert_eq!(read(&dir, "webmirror-1.toml"), "retry = \"x\"");

    // Both the log and the config snapshot still load
    let mirror = Mirror::resume(dir.path(), None).expect("Mirror files were clobbered");
    assert_eq!(mirror.registry().len(), 3);
    assert_eq!(mirror.config().retry, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_page_decoded_from_meta_charset() {
    let mock_server = MockServer::start().await;

    // "Привет" in windows-1251
    let mut body = br#"<html><head><meta charset="windows-1251"></head><body><p>"#.to_vec();
    body.extend_from_slice(&[0xCF, 0xF0, 0xE8, 0xE2, 0xE5, 0xF2]);
    body.extend_from_slice(b"</p></body></html>");

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(vec![root(format!("{}/", mock_server.uri()), 1, 0, 0)]);
    let (_, failed) = run_mirror(Mirror::create(dir.path(), config).unwrap()).await;

    assert!(!failed);
    let index = read(&dir, "index.html");
    assert!(index.contains("<p>Привет</p>"));
    assert!(index.contains(r#"<meta charset="utf-8">"#));
}
