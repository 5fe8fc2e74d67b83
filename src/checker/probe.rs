// src/checker/probe.rs
// =============================================================================
// This module decides whether a single URL is still alive.
//
// How it works (two stages, each with its own hard timeout):
// 1. HEAD request (lightweight, no body download), budget T1 (5s)
//    - any response at all => Alive
//    - timed out           => Dead, no second stage
//    - transport error     => go to stage 2
// 2. GET request, budget T2 (3s), measured from its own start
//    - any response        => Alive
//    - error or timed out  => Dead
//
// Many servers reject HEAD but answer GET, which is why stage 2 exists.
//
// Status codes are NOT looked at. A 404 or a redirect still proves the host
// is reachable, and reachability is all we measure here. The worst case for
// one probe is T1 + T2, after which it always has an answer.
//
// Rust concepts:
// - tokio::time::timeout: wraps a future and gives up after a deadline.
//   Dropping the losing request future cancels it and frees its connection.
// - async_trait: lets the scheduler hold any probe as Arc<dyn Probe>
// =============================================================================

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::debug;

use crate::config::Settings;

/// The verdict for one URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeResult {
    Alive,
    Dead,
}

impl ProbeResult {
    pub fn is_alive(self) -> bool {
        self == ProbeResult::Alive
    }
}

/// Anything that can tell whether a URL is reachable.
///
/// Implementations never fail: every problem is a `Dead` verdict.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, url: &str) -> ProbeResult;
}

// How one timed request ended
#[derive(Debug)]
enum Stage {
    Reached,
    Failed(reqwest::Error),
    TimedOut,
}

// Send one request under its own deadline. Only the yes/no signal matters,
// so the response is dropped right away, which releases the connection.
async fn timed_request(request: RequestBuilder, budget: Duration) -> Stage {
    match timeout(budget, request.send()).await {
        Ok(Ok(_response)) => Stage::Reached,
        Ok(Err(e)) if e.is_timeout() => Stage::TimedOut,
        Ok(Err(e)) => Stage::Failed(e),
        Err(_elapsed) => Stage::TimedOut,
    }
}

/// Real HTTP liveness check: HEAD, then GET as a fallback.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
    head_timeout: Duration,
    get_timeout: Duration,
}

impl HttpProbe {
    /// Create a probe with the given stage budgets.
    ///
    /// The client is created once and cloned cheaply (it's reference
    /// counted), so all probes share one connection pool.
    pub fn new(
        head_timeout: Duration,
        get_timeout: Duration,
        max_redirects: usize,
        user_agent: &str,
    ) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert("DNT", HeaderValue::from_static("1"));

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(max_redirects))
            .build()?;

        Ok(Self {
            client,
            head_timeout,
            get_timeout,
        })
    }

    pub fn from_settings(settings: &Settings) -> crate::Result<Self> {
        let probe = Self::new(
            settings.head_timeout,
            settings.get_timeout,
            settings.max_redirects,
            &settings.user_agent,
        )?;
        Ok(probe)
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, url: &str) -> ProbeResult {
        match timed_request(self.client.head(url), self.head_timeout).await {
            Stage::Reached => {
                debug!(url, "HEAD reached host");
                return ProbeResult::Alive;
            }
            Stage::TimedOut => {
                debug!(url, "HEAD timed out");
                return ProbeResult::Dead;
            }
            Stage::Failed(e) => {
                debug!(url, error = %e, "HEAD failed, falling back to GET");
            }
        }

        match timed_request(self.client.get(url), self.get_timeout).await {
            Stage::Reached => ProbeResult::Alive,
            Stage::Failed(e) => {
                debug!(url, error = %e, "GET failed");
                ProbeResult::Dead
            }
            Stage::TimedOut => {
                debug!(url, "GET timed out");
                ProbeResult::Dead
            }
        }
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why doesn't probe() return a Result?
//    - A dead link is the normal, expected answer, not an error
//    - Returning ProbeResult forces every failure into Dead at the source
//
// 2. What does timeout() return?
//    - Ok(output) if the inner future finished in time
//    - Err(Elapsed) if the deadline passed first
//    - Here the output is itself a Result, hence Ok(Ok(..)) / Ok(Err(..))
//
// 3. Why match guards like `Ok(Err(e)) if e.is_timeout()`?
//    - A guard adds a condition to a pattern
//    - The first arm whose pattern AND guard match wins
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[derive(Clone, Copy)]
    enum Behaviour {
        // 200 for everything
        Answer,
        // drop HEAD connections, answer GET
        RejectHead,
        // accept and never reply
        Hang,
        // drop HEAD connections, never answer GET
        RejectHeadHangGet,
    }

    #[derive(Default)]
    struct Hits {
        head: AtomicUsize,
        get: AtomicUsize,
    }

    // Minimal HTTP/1.1 server on 127.0.0.1, one request per connection.
    async fn serve(behaviour: Behaviour) -> (String, Arc<Hits>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(Hits::default());
        let counter = hits.clone();

        tokio::spawn(async move {
            loop {
                let (mut socket, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => return,
                };
                let counter = counter.clone();
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 4096];
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    let is_head = buf[..n].starts_with(b"HEAD");
                    if is_head {
                        counter.head.fetch_add(1, Ordering::SeqCst);
                    } else {
                        counter.get.fetch_add(1, Ordering::SeqCst);
                    }
                    match behaviour {
                        Behaviour::Hang => {
                            tokio::time::sleep(Duration::from_secs(30)).await;
                        }
                        Behaviour::RejectHeadHangGet if !is_head => {
                            tokio::time::sleep(Duration::from_secs(30)).await;
                        }
                        Behaviour::RejectHead | Behaviour::RejectHeadHangGet if is_head => {
                            // close without a response
                        }
                        _ => {
                            let _ = socket
                                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                                .await;
                        }
                    }
                });
            }
        });

        (format!("http://{}/", addr), hits)
    }

    fn fast_probe() -> HttpProbe {
        HttpProbe::new(Duration::from_millis(300), Duration::from_millis(300), 5, "test").unwrap()
    }

    #[tokio::test]
    async fn test_head_success_is_alive() {
        let (url, hits) = serve(Behaviour::Answer).await;
        assert_eq!(fast_probe().probe(&url).await, ProbeResult::Alive);
        assert_eq!(hits.head.load(Ordering::SeqCst), 1);
        assert_eq!(hits.get.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_head_rejected_falls_back_to_get() {
        let (url, hits) = serve(Behaviour::RejectHead).await;
        assert_eq!(fast_probe().probe(&url).await, ProbeResult::Alive);
        assert_eq!(hits.get.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_head_timeout_skips_get() {
        let (url, hits) = serve(Behaviour::Hang).await;
        let started = std::time::Instant::now();
        assert_eq!(fast_probe().probe(&url).await, ProbeResult::Dead);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(hits.get.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_get_timeout_after_failed_head_is_dead() {
        let (url, hits) = serve(Behaviour::RejectHeadHangGet).await;
        let probe = fast_probe();
        let started = std::time::Instant::now();
        assert_eq!(probe.probe(&url).await, ProbeResult::Dead);
        assert!(started.elapsed() < probe.head_timeout + probe.get_timeout);
        assert_eq!(hits.head.load(Ordering::SeqCst), 1);
        assert_eq!(hits.get.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refused_connection_is_dead() {
        // Bind then drop, so nothing listens on that port.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let url = format!("http://{}/", addr);
        assert_eq!(fast_probe().probe(&url).await, ProbeResult::Dead);
    }

    #[tokio::test]
    async fn test_unparseable_url_is_dead() {
        assert_eq!(fast_probe().probe("not a url").await, ProbeResult::Dead);
    }
}
