//! Integration tests for the load generator
//!
//! These tests use wiremock to create mock HTTP servers and drive the real
//! `HttpFetcher` through workers, the dispatcher and the scheduler.

use http_getter::config::Config;
use http_getter::fetcher::{codes, FetchOptions, Fetcher, HttpFetcher};
use http_getter::getter::{dispatch_cycle, ProgressMeter, UrlSource};
use http_getter::{run_loop, WorkerPool};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration for a static URL list
fn create_test_config(urls: Vec<String>, count: u64) -> Config {
    let mut config = Config::default();
    config.run.workers = 2;
    config.run.interval = 10; // Very short for testing
    config.run.run_length = 0;
    config.run.count = count;
    config.fetch.timeout = 5_000;
    config.urls.list = Some(urls);
    config
}

async fn mount_body(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

fn configured(options: &FetchOptions) -> HttpFetcher {
    let mut fetcher = HttpFetcher::new();
    fetcher.configure(options).expect("Failed to configure fetcher");
    fetcher
}

#[tokio::test]
async fn test_fetch_counts_headers_and_body() {
    let mock_server = MockServer::start().await;
    mount_body(&mock_server, "/page", &"x".repeat(1000)).await;

    let mut fetcher = configured(&FetchOptions::default());
    let bytes = fetcher
        .fetch(&format!("{}/page", mock_server.uri()), None)
        .await
        .expect("Fetch failed");

    assert!(bytes > 1000, "expected header bytes on top of the body, got {}", bytes);
}

#[tokio::test]
async fn test_error_status_still_counts_bytes() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
        .mount(&mock_server)
        .await;

    let mut fetcher = configured(&FetchOptions::default());
    let bytes = fetcher
        .fetch(&format!("{}/missing", mock_server.uri()), None)
        .await
        .expect("HTTP errors are not fetch errors");

    assert!(bytes > "not here".len() as u64);
}

#[tokio::test]
async fn test_redirects_are_followed() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/new"))
        .mount(&mock_server)
        .await;
    mount_body(&mock_server, "/new", "moved content").await;

    let mut fetcher = configured(&FetchOptions::default());
    let (_, body) = fetcher
        .fetch_text(&format!("{}/old", mock_server.uri()))
        .await
        .expect("Fetch failed");

    assert_eq!(body, "moved content");
}

#[tokio::test]
async fn test_progress_snapshots_are_cumulative() {
    let mock_server = MockServer::start().await;
    let body = "y".repeat(256 * 1024);
    mount_body(&mock_server, "/big", &body).await;

    let mut fetcher = configured(&FetchOptions::default());
    let (tx, mut rx) = mpsc::unbounded_channel();
    fetcher
        .fetch(&format!("{}/big", mock_server.uri()), Some(tx))
        .await
        .expect("Fetch failed");

    let mut snapshots = Vec::new();
    while let Ok(snapshot) = rx.try_recv() {
        snapshots.push(snapshot);
    }
    assert!(!snapshots.is_empty());
    assert!(snapshots.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(snapshots.last().copied(), Some(body.len() as u64));
}

#[tokio::test]
async fn test_connection_refused_maps_to_connect_code() {
    // Reserve a port, then free it so nothing is listening there.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    let port = listener.local_addr().expect("No local address").port();
    drop(listener);

    let mut fetcher = configured(&FetchOptions::default());
    let error = fetcher
        .fetch(&format!("http://127.0.0.1:{}/", port), None)
        .await
        .expect_err("Nothing should be listening");

    assert_eq!(error.code, codes::COULDNT_CONNECT);
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&mock_server)
        .await;

    let options = FetchOptions {
        timeout: Some(Duration::from_millis(200)),
        ..FetchOptions::default()
    };
    let mut fetcher = configured(&options);
    let error = fetcher
        .fetch(&format!("{}/slow", mock_server.uri()), None)
        .await
        .expect_err("Fetch should time out");

    assert_eq!(error.code, codes::OPERATION_TIMEDOUT);
}

#[tokio::test]
async fn test_dns_override_pins_host() {
    let mock_server = MockServer::start().await;
    mount_body(&mock_server, "/pinned", "pinned").await;
    let port = mock_server.address().port();

    let options = FetchOptions {
        dns_override: Some("load-target.invalid=127.0.0.1".to_string()),
        ..FetchOptions::default()
    };
    let mut fetcher = configured(&options);
    let (_, body) = fetcher
        .fetch_text(&format!("http://load-target.invalid:{}/pinned", port))
        .await
        .expect("Pinned host should resolve");

    assert_eq!(body, "pinned");
}

#[tokio::test]
async fn test_remote_url_list_cycle() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    let list = format!("{base}/a\n\n# not a URL\n{base}/b\n", base = base_url);
    mount_body(&mock_server, "/urls.txt", &list).await;
    mount_body(&mock_server, "/a", "alpha").await;
    mount_body(&mock_server, "/b", "bravo").await;

    let mut pool = WorkerPool::spawn(3, FetchOptions::default(), |_| HttpFetcher::new())
        .expect("Failed to spawn pool");
    let mut meter = ProgressMeter::new(None);

    let result = dispatch_cycle(
        &mut pool,
        &UrlSource::Remote(format!("{}/urls.txt", base_url)),
        &mut meter,
        &CancellationToken::new(),
    )
    .await
    .expect("Cycle failed");

    assert_eq!(result.request_count, 3);
    assert!(result.first_error.is_none());
    assert!(result.total_bytes > (list.len() + "alpha".len() + "bravo".len()) as u64);

    pool.stop_all().await;

    let requests = mock_server.received_requests().await.expect("Recording disabled");
    assert_eq!(requests.len(), 3);
}

#[tokio::test]
async fn test_run_loop_writes_report_lines() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_body(&mock_server, "/one", "first page").await;
    mount_body(&mock_server, "/two", "second page").await;

    let config = create_test_config(
        vec![format!("{}/one", base_url), format!("{}/two", base_url)],
        3,
    );
    let mut output = Vec::new();

    let report = run_loop(&config, |_| HttpFetcher::new(), &mut output, &CancellationToken::new())
        .await
        .expect("Run failed");

    assert_eq!(report.stats.total_count, 3);
    assert_eq!(report.stats.success_count, 3);
    assert_eq!(report.stats.total_requests, 6);
    assert_eq!(report.exit_code(), 0);

    let text = String::from_utf8(output).expect("Output is not UTF-8");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    for line in &lines[..3] {
        assert!(line.starts_with('['), "unexpected cycle line: {}", line);
        assert!(line.contains("] 2 request(s) received "), "unexpected cycle line: {}", line);
    }
    assert!(lines[3].starts_with("Total 3 successful of 3 cycles. 6 total requests. min/avg/max = "));

    let requests = mock_server.received_requests().await.expect("Recording disabled");
    assert_eq!(requests.len(), 6);
}

#[tokio::test]
async fn test_run_loop_records_failures_and_continues() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    mount_body(&mock_server, "/ok", "fine").await;

    // Nothing is listening on the second URL's port.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    let dead = format!("http://127.0.0.1:{}/", listener.local_addr().expect("No address").port());
    drop(listener);

    let config = create_test_config(vec![format!("{}/ok", base_url), dead], 2);
    let mut output = Vec::new();

    let report = run_loop(&config, |_| HttpFetcher::new(), &mut output, &CancellationToken::new())
        .await
        .expect("Run failed");

    assert_eq!(report.stats.total_count, 2);
    assert_eq!(report.stats.success_count, 0);
    assert_eq!(report.first_error, Some(codes::COULDNT_CONNECT));
    assert_eq!(report.exit_code(), codes::COULDNT_CONNECT as u8);

    // Only the final line: failed cycles get no cycle line.
    let text = String::from_utf8(output).expect("Output is not UTF-8");
    assert_eq!(text.lines().count(), 1);

    // The healthy URL was still fetched in every cycle.
    let requests = mock_server.received_requests().await.expect("Recording disabled");
    assert_eq!(requests.len(), 2);
}

#[tokio::test]
async fn test_list_byte_count_ignores_invalid_utf8() {
    let mock_server = MockServer::start().await;
    let mut body = b"http://a.example/\n".to_vec();
    body.extend_from_slice(&[0xff, 0xfe, b'\n']);
    Mock::given(method("GET"))
        .and(path("/list"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&mock_server)
        .await;
    let url = format!("{}/list", mock_server.uri());

    let mut fetcher = configured(&FetchOptions::default());
    let raw_bytes = fetcher.fetch(&url, None).await.expect("Fetch failed");
    let (text_bytes, text) = fetcher.fetch_text(&url).await.expect("Fetch failed");

    // Replacement characters are longer than the bytes they stand for.
    assert!(text.contains('\u{fffd}'));
    assert_eq!(text_bytes, raw_bytes);
}
