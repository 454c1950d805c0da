//! Local stand-in for the SQS JSON endpoint. Each call is recorded as its
//! `X-Amz-Target` action and JSON body and answered with a canned reply.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use aws_sdk_sqs::Client;
use aws_sdk_sqs::config::{BehaviorVersion, Credentials, Region};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone)]
pub struct SqsCall {
    pub action: String,
    pub body: Value,
}

pub struct MockSqs {
    endpoint: String,
    calls: Arc<Mutex<Vec<SqsCall>>>,
}

impl MockSqs {
    /// Actions without a reply answer `{}`.
    pub async fn start(replies: &[(&str, Value)]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        let calls = Arc::new(Mutex::new(Vec::new()));
        let replies: Arc<HashMap<String, Value>> = Arc::new(
            replies
                .iter()
                .map(|(action, reply)| (action.to_string(), reply.clone()))
                .collect(),
        );

        let recorded = calls.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let recorded = recorded.clone();
                let replies = replies.clone();
                tokio::spawn(async move {
                    let Some(call) = read_call(&mut socket).await else {
                        return;
                    };
                    let reply = replies.get(&call.action).cloned().unwrap_or_else(|| json!({})).to_string();
                    recorded.lock().unwrap().push(call);

                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/x-amz-json-1.0\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        reply.len(),
                        reply
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        MockSqs { endpoint, calls }
    }

    pub fn client(&self) -> Client {
        let config = aws_sdk_sqs::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .endpoint_url(&self.endpoint)
            .credentials_provider(Credentials::new("test", "test", None, None, "mock-sqs"))
            .build();
        Client::from_conf(config)
    }

    pub fn calls(&self) -> Vec<SqsCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.action).collect()
    }
}

async fn read_call(socket: &mut TcpStream) -> Option<SqsCall> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|window| window == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let header = |name: &str| {
        head.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim().eq_ignore_ascii_case(name).then(|| value.trim().to_string())
        })
    };

    let length: usize = header("content-length").and_then(|value| value.parse().ok()).unwrap_or(0);
    while buf.len() < header_end + length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let action = header("x-amz-target")?.trim_start_matches("AmazonSQS.").to_string();
    let body = serde_json::from_slice(&buf[header_end..]).unwrap_or(Value::Null);
    Some(SqsCall { action, body })
}
