//! Minimal HTTP/1.1 responder for exercising the client against canned replies.

use std::time::Duration;

use reqwest::Client;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    task::JoinHandle,
};

use crate::{client::CdoClient, config::ApiToken};

/// Client pointed at a stub, bypassing any proxy from the environment.
pub fn stub_client(base_url: &str) -> CdoClient {
    let http = Client::builder().no_proxy().timeout(Duration::from_secs(5)).build().unwrap();
    CdoClient::with_http(base_url, ApiToken::new("TEST_TOKEN").unwrap(), http)
}

#[derive(Debug, Clone)]
pub struct StubResponse {
    pub status: u16,
    pub reason: &'static str,
    pub body: String,
}

impl StubResponse {
    pub fn ok(body: &str) -> Self {
        Self::status(200, "OK", body)
    }

    pub fn status(status: u16, reason: &'static str, body: &str) -> Self {
        Self { status, reason, body: body.to_string() }
    }

    fn render(&self) -> String {
        format!(
            "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            self.status,
            self.reason,
            self.body.len(),
            self.body
        )
    }
}

/// Serve `responses` in order, one connection each, then return the raw request heads.
pub async fn serve(responses: Vec<StubResponse>) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let mut requests = Vec::with_capacity(responses.len());

        for response in responses {
            let (mut socket, _) = listener.accept().await.unwrap();

            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            requests.push(String::from_utf8_lossy(&head).into_owned());

            socket.write_all(response.render().as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        }

        requests
    });

    (format!("http://{addr}"), handle)
}

/// Base URL of a port that nothing is listening on.
pub async fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}
