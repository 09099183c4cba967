//! Newline-delimited JSON-RPC over a byte stream.
//!
//! Every request runs on its own task; responses and server notifications share
//! one writer so lines never interleave.

use super::protocol::{CancelledParams, Incoming, JsonRpcError, JsonRpcResponse, Request, RequestId};
use super::RequestHandler;
use log::{debug, error, info, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

type InFlight = Arc<Mutex<HashMap<RequestId, CancellationToken>>>;

fn send(tx: &UnboundedSender<Value>, response: JsonRpcResponse) {
    match serde_json::to_value(&response) {
        Ok(v) => {
            if tx.send(v).is_err() {
                warn!("output closed; dropping response {}", response.id);
            }
        }
        Err(e) => error!("failed to serialize response {}: {}", response.id, e),
    }
}

/// Serve until `shutdown` resolves or the reader hits EOF, then wait for every
/// in-flight request to answer before returning.
pub async fn serve<H, R, W, S>(
    handler: Arc<H>,
    reader: R,
    writer: W,
    tx: UnboundedSender<Value>,
    rx: UnboundedReceiver<Value>,
    shutdown: S,
) -> io::Result<()>
where
    H: RequestHandler,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
    S: Future<Output = ()>,
{
    let done = CancellationToken::new();
    let writer_task = tokio::spawn(write_loop(writer, rx, done.clone()));
    let inflight: InFlight = Arc::default();
    let mut tasks = JoinSet::new();
    let mut lines = BufReader::new(reader).lines();
    tokio::pin!(shutdown);

    loop {
        let next = tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown requested");
                break;
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    error!("request task failed: {}", e);
                }
                continue;
            }
            next = lines.next_line() => next,
        };
        let line = match next {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("input closed");
                break;
            }
            Err(e) => {
                error!("failed to read input: {}", e);
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        debug!("received: {}", line);
        match Incoming::decode(line) {
            Incoming::Malformed(e) => {
                send(&tx, JsonRpcResponse::error(RequestId::Null, JsonRpcError::parse_error(&e)))
            }
            Incoming::Invalid(id, e) => {
                send(&tx, JsonRpcResponse::error(id, JsonRpcError::invalid_request(&e)))
            }
            Incoming::Message(request) => match request.id.clone() {
                None => notification(handler.as_ref(), &inflight, request),
                Some(id) => {
                    let token = CancellationToken::new();
                    lock(&inflight).insert(id.clone(), token.clone());
                    let handler = handler.clone();
                    let inflight = inflight.clone();
                    let tx = tx.clone();
                    tasks.spawn(async move {
                        let result = handler.handle(request, token).await;
                        lock(&inflight).remove(&id);
                        send(&tx, JsonRpcResponse::from_result(id, result));
                    });
                }
            },
        }
    }

    if !tasks.is_empty() {
        info!("waiting for {} in-flight requests", tasks.len());
    }
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!("request task failed: {}", e);
        }
    }
    done.cancel();
    writer_task
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
}

fn lock(inflight: &InFlight) -> std::sync::MutexGuard<'_, HashMap<RequestId, CancellationToken>> {
    inflight.lock().unwrap_or_else(|p| p.into_inner())
}

fn notification<H: RequestHandler + ?Sized>(handler: &H, inflight: &InFlight, request: Request) {
    if request.method != "notifications/cancelled" {
        handler.on_notification(&request.method, &request.params);
        return;
    }
    match serde_json::from_value::<CancelledParams>(request.params) {
        Ok(p) => match lock(inflight).get(&p.request_id) {
            Some(token) => {
                debug!(
                    "cancelling request {} ({})",
                    p.request_id,
                    p.reason.as_deref().unwrap_or("no reason given")
                );
                token.cancel();
            }
            None => debug!("cancellation for unknown request {}", p.request_id),
        },
        Err(e) => warn!("ignoring malformed cancellation: {}", e),
    }
}

async fn write_line<W: AsyncWrite + Unpin>(w: &mut W, msg: &Value) -> io::Result<()> {
    let mut bytes = serde_json::to_vec(msg)?;
    debug!("sending: {}", String::from_utf8_lossy(&bytes));
    bytes.push(b'\n');
    w.write_all(&bytes).await?;
    w.flush().await
}

async fn write_loop<W: AsyncWrite + Unpin>(
    mut w: W,
    mut rx: UnboundedReceiver<Value>,
    done: CancellationToken,
) -> io::Result<()> {
    loop {
        let msg = tokio::select! {
            biased;
            msg = rx.recv() => match msg {
                Some(m) => m,
                None => break,
            },
            _ = done.cancelled() => {
                while let Ok(m) = rx.try_recv() {
                    write_line(&mut w, &m).await?;
                }
                break;
            }
        };
        write_line(&mut w, &msg).await?;
    }
    w.shutdown().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::io::AsyncReadExt;

    struct Echo;

    #[async_trait]
    impl RequestHandler for Echo {
        async fn handle(&self, request: Request, cancel: CancellationToken) -> Result<Value, JsonRpcError> {
            match request.method.as_str() {
                "echo" => Ok(request.params),
                "wait" => {
                    cancel.cancelled().await;
                    Ok(json!("cancelled"))
                }
                other => Err(JsonRpcError::method_not_found(other)),
            }
        }
    }

    async fn run(input: &str) -> Vec<Value> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let (mut client, server_side) = tokio::io::duplex(64 * 1024);
        serve(
            Arc::new(Echo),
            input.as_bytes(),
            server_side,
            tx,
            rx,
            std::future::pending(),
        )
        .await
        .unwrap();
        let mut out = String::new();
        client.read_to_string(&mut out).await.unwrap();
        out.lines().map(|l| serde_json::from_str(l).unwrap()).collect()
    }

    #[tokio::test]
    async fn each_request_gets_one_response() {
        let out = run(concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"echo","params":{"a":1}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":"b","method":"nope"}"#,
            "\n"
        ))
        .await;
        assert_eq!(out.len(), 2);
        let ok = out.iter().find(|v| v["id"] == 1).unwrap();
        assert_eq!(ok["result"]["a"], 1);
        let err = out.iter().find(|v| v["id"] == "b").unwrap();
        assert_eq!(err["error"]["code"], JsonRpcError::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_lines_get_parse_errors() {
        let out = run("{oops\n").await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["error"]["code"], JsonRpcError::PARSE_ERROR);
        assert_eq!(out[0]["id"], Value::Null);
    }

    #[tokio::test]
    async fn cancellation_reaches_the_running_request() {
        let out = run(concat!(
            r#"{"jsonrpc":"2.0","id":9,"method":"wait"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/cancelled","params":{"requestId":9}}"#,
            "\n"
        ))
        .await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["result"], "cancelled");
    }
}
