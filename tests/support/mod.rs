//! Shared fixtures for integration tests: socket skip guard, flaky responders,
//! a raw TCP server for peak-concurrency measurement and H5P archives.

#![allow(dead_code)]

pub mod socket_guard;

use std::io::{Cursor, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use wiremock::{Respond, ResponseTemplate};
use zip::write::SimpleFileOptions;

pub use socket_guard::{should_skip_socket_bound_test, start_mock_server_or_skip};

/// Responder that answers the first `fail_count` requests with `failure`,
/// then `success` for every later one.
pub struct FlakyResponder {
    request_count: Arc<AtomicUsize>,
    fail_count: usize,
    failure: ResponseTemplate,
    success: ResponseTemplate,
}

impl FlakyResponder {
    pub fn new(fail_count: usize, failure: ResponseTemplate, success: ResponseTemplate) -> Self {
        Self {
            request_count: Arc::new(AtomicUsize::new(0)),
            fail_count,
            failure,
            success,
        }
    }

    /// Shared request counter, readable after the responder is mounted.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.request_count)
    }
}

impl Respond for FlakyResponder {
    fn respond(&self, _request: &wiremock::Request) -> ResponseTemplate {
        let n = self.request_count.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_count {
            self.failure.clone()
        } else {
            self.success.clone()
        }
    }
}

/// Responder that plays `responses` in order and repeats the last one.
pub struct SequenceResponder {
    request_count: Arc<AtomicUsize>,
    responses: Vec<ResponseTemplate>,
}

impl SequenceResponder {
    pub fn new(responses: Vec<ResponseTemplate>) -> Self {
        assert!(!responses.is_empty(), "sequence needs at least one response");
        Self {
            request_count: Arc::new(AtomicUsize::new(0)),
            responses,
        }
    }

    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.request_count)
    }
}

impl Respond for SequenceResponder {
    fn respond(&self, _request: &wiremock::Request) -> ResponseTemplate {
        let n = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.responses[n.min(self.responses.len() - 1)].clone()
    }
}

/// Plain HTTP/1.1 server that holds every request for a fixed time and
/// records how many were held at once.
pub struct ConcurrencyMeter {
    pub url: String,
    peak: Arc<AtomicUsize>,
    served: Arc<AtomicUsize>,
    accept_loop: JoinHandle<()>,
}

impl ConcurrencyMeter {
    /// Highest number of requests held simultaneously.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn served(&self) -> usize {
        self.served.load(Ordering::SeqCst)
    }
}

impl Drop for ConcurrencyMeter {
    fn drop(&mut self) {
        self.accept_loop.abort();
    }
}

/// Starts a [`ConcurrencyMeter`], or returns `None` when localhost sockets
/// are unavailable.
pub async fn start_concurrency_meter(hold: Duration) -> Option<ConcurrencyMeter> {
    if should_skip_socket_bound_test() {
        return None;
    }

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind meter listener");
    let addr = listener.local_addr().expect("meter address");

    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let served = Arc::new(AtomicUsize::new(0));

    let accept_loop = {
        let peak = Arc::clone(&peak);
        let served = Arc::clone(&served);
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                let served = Arc::clone(&served);
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match stream.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }

                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(hold).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    served.fetch_add(1, Ordering::SeqCst);

                    let body = "ok";
                    let response = format!(
                        "HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        })
    };

    Some(ConcurrencyMeter {
        url: format!("http://{addr}"),
        peak,
        served,
        accept_loop,
    })
}

/// Builds an in-memory zip archive from `(path, contents)` pairs.
pub fn zip_archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("start zip entry");
        writer.write_all(data.as_bytes()).expect("write zip entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

/// A small but realistic package: manifest, content folder and two libraries.
pub fn sample_package() -> Vec<u8> {
    zip_archive(&[
        (
            "h5p.json",
            r#"{
                "title": "Photosynthesis quiz",
                "language": "en",
                "mainLibrary": "H5P.MultiChoice",
                "embedTypes": "iframe",
                "preloadedDependencies": [
                    {"machineName": "H5P.MultiChoice", "majorVersion": "1", "minorVersion": "16"}
                ]
            }"#,
        ),
        ("content/content.json", r#"{"question": "What do plants absorb?"}"#),
        ("content/images/leaf.png", "png-bytes"),
        (
            "H5P.MultiChoice-1.16/library.json",
            r#"{
                "title": "Multiple Choice",
                "machineName": "H5P.MultiChoice",
                "majorVersion": 1,
                "minorVersion": 16,
                "patchVersion": 3,
                "runnable": 1,
                "preloadedJs": [{"path": "js/multichoice.js"}],
                "preloadedCss": [{"path": "css/multichoice.css"}],
                "preloadedDependencies": [
                    {"machineName": "H5P.Question", "majorVersion": 1, "minorVersion": "5"}
                ]
            }"#,
        ),
        ("H5P.MultiChoice-1.16/js/multichoice.js", "H5P.MultiChoice = function () {};"),
        ("H5P.MultiChoice-1.16/css/multichoice.css", ".h5p-multichoice { display: block; }"),
        (
            "H5P.Question-1.5/library.json",
            r#"{
                "title": "Question",
                "machineName": "H5P.Question",
                "majorVersion": "1",
                "minorVersion": "5",
                "patchVersion": "12",
                "runnable": 0
            }"#,
        ),
        ("H5P.Question-1.5/scripts/question.js", "H5P.Question = function () {};"),
    ])
}
