//! Connection handler that answers newline-delimited JSON-RPC requests.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use super::DISPATCH_TARGET;
use super::dispatcher::Dispatcher;
use super::errors::{ErrorCode, RpcError};
use super::reply::ReplyEnvelope;
use crate::transport::{ConnectionHandler, ConnectionStream};

/// Maximum size of a single request line in bytes.
pub(crate) const MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// Count of requests read but not yet answered.
#[derive(Debug, Default)]
struct PendingReplies {
    count: Mutex<usize>,
    idle: Condvar,
}

impl PendingReplies {
    fn enter(self: &Arc<Self>) -> PendingReply {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        PendingReply(Arc::clone(self))
    }

    fn wait_idle(&self, timeout: Duration) -> bool {
        let count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        let (count, _) = self
            .idle
            .wait_timeout_while(count, timeout, |pending| *pending > 0)
            .unwrap_or_else(PoisonError::into_inner);
        *count == 0
    }
}

/// Held from reading a request until its reply is flushed.
struct PendingReply(Arc<PendingReplies>);

impl Drop for PendingReply {
    fn drop(&mut self) {
        let mut count = self.0.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.0.idle.notify_all();
        }
    }
}

/// Serves one request line at a time until the peer disconnects.
#[derive(Debug, Clone)]
pub(crate) struct RpcConnectionHandler {
    dispatcher: Arc<Dispatcher>,
    pending: Arc<PendingReplies>,
}

impl RpcConnectionHandler {
    pub(crate) fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            pending: Arc::default(),
        }
    }

    /// Waits up to `timeout` for every request already read to be answered.
    ///
    /// Idle connections do not count. Returns `false` on timeout.
    pub(crate) fn drain(&self, timeout: Duration) -> bool {
        self.pending.wait_idle(timeout)
    }

    fn serve(&self, stream: ConnectionStream) {
        let (peer, reader, mut writer) = stream.into_parts();
        let mut reader = BufReader::new(reader);
        loop {
            let line = match read_request_line(&mut reader) {
                Ok(Some(line)) => line,
                Ok(None) => {
                    debug!(target: DISPATCH_TARGET, %peer, "client disconnected");
                    return;
                }
                Err(RequestReadError::TooLarge) => {
                    let _pending = self.pending.enter();
                    warn!(
                        target: DISPATCH_TARGET,
                        %peer,
                        limit = MAX_REQUEST_BYTES,
                        "request exceeds maximum size"
                    );
                    let reply = oversized_reply();
                    if let Err(error) = write_reply(&mut writer, reply.as_bytes()) {
                        warn!(target: DISPATCH_TARGET, %peer, %error, "failed to write reply");
                    }
                    return;
                }
                Err(RequestReadError::Io(error)) => {
                    warn!(target: DISPATCH_TARGET, %peer, %error, "failed to read request");
                    return;
                }
            };

            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let _pending = self.pending.enter();
            let reply = self.dispatcher.handle_payload(&line);
            if let Err(error) = write_reply(&mut writer, reply.as_bytes()) {
                warn!(target: DISPATCH_TARGET, %peer, %error, "failed to write reply");
                return;
            }
        }
    }
}

impl ConnectionHandler for RpcConnectionHandler {
    fn handle(&self, stream: ConnectionStream) {
        self.serve(stream);
    }
}

#[derive(Debug)]
enum RequestReadError {
    TooLarge,
    Io(io::Error),
}

/// Reads one line, without its terminator, capped at [`MAX_REQUEST_BYTES`].
///
/// Returns `Ok(None)` at end of stream with nothing buffered. A final line
/// without a newline is still returned.
fn read_request_line<R: Read>(
    reader: &mut BufReader<R>,
) -> Result<Option<Vec<u8>>, RequestReadError> {
    let mut line = Vec::new();
    let limit = u64::try_from(MAX_REQUEST_BYTES).unwrap_or(u64::MAX);
    let read = reader
        .by_ref()
        .take(limit.saturating_add(1))
        .read_until(b'\n', &mut line)
        .map_err(RequestReadError::Io)?;
    if read == 0 {
        return Ok(None);
    }
    if line.last() == Some(&b'\n') {
        line.pop();
    } else if line.len() > MAX_REQUEST_BYTES {
        return Err(RequestReadError::TooLarge);
    }
    Ok(Some(line))
}

fn oversized_reply() -> String {
    let reply = ReplyEnvelope::failure(
        Value::Null,
        RpcError::new(
            ErrorCode::InvalidRequest,
            format!("Request exceeds {MAX_REQUEST_BYTES} bytes"),
        ),
    );
    let mut line = serde_json::to_string(&reply).unwrap_or_default();
    line.push('\n');
    line
}

fn write_reply(writer: &mut dyn Write, reply: &[u8]) -> io::Result<()> {
    writer.write_all(reply)?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Cursor, Write};
    use std::net::{SocketAddr, TcpListener, TcpStream};
    use std::thread::{self, JoinHandle};

    use rstest::{fixture, rstest};
    use serde_json::{Value, json};

    use super::*;
    use crate::dispatch::CommandTable;
    use crate::lifecycle::RunningFlag;

    struct HandlerHarness {
        client: TcpStream,
        server: JoinHandle<()>,
    }

    impl HandlerHarness {
        fn send(&mut self, request: &[u8]) {
            self.client.write_all(request).expect("write request");
            self.client.flush().expect("flush");
        }

        fn finish(mut self) -> Vec<Value> {
            self.client
                .shutdown(std::net::Shutdown::Write)
                .expect("half close");
            let reader = BufReader::new(&mut self.client);
            let replies = reader
                .lines()
                .map(|line| serde_json::from_str(&line.expect("read line")).expect("json reply"))
                .collect();
            self.server.join().expect("server join");
            replies
        }
    }

    fn create_listener() -> (TcpListener, SocketAddr) {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
        let addr = listener.local_addr().expect("addr");
        (listener, addr)
    }

    #[fixture]
    fn harness() -> HandlerHarness {
        let dispatcher = Dispatcher::new(CommandTable::new(RunningFlag::default()));
        dispatcher.warmup().finish().expect("finish warmup");
        let handler = RpcConnectionHandler::new(Arc::new(dispatcher));
        let (listener, addr) = create_listener();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            handler.handle(ConnectionStream::tcp(stream).expect("wrap stream"));
        });
        let client = TcpStream::connect(addr).expect("connect");
        HandlerHarness { client, server }
    }

    #[rstest]
    fn answers_each_line_in_order(mut harness: HandlerHarness) {
        harness.send(b"{\"id\":1,\"method\":\"nope\"}\n\n{\"id\":2,\"method\":\"nope\"}\n");
        let replies = harness.finish();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["id"], json!(1));
        assert_eq!(replies[1]["id"], json!(2));
        assert_eq!(replies[1]["error"]["code"], json!(-32601));
    }

    #[rstest]
    fn final_line_without_newline_is_answered(mut harness: HandlerHarness) {
        harness.send(b"[{\"id\":\"a\",\"method\":\"nope\"}]");
        let replies = harness.finish();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0][0]["id"], json!("a"));
    }

    #[rstest]
    fn garbage_gets_parse_error(mut harness: HandlerHarness) {
        harness.send(b"not json\n");
        let replies = harness.finish();
        assert_eq!(replies[0]["error"]["code"], json!(-32700));
        assert_eq!(replies[0]["id"], Value::Null);
    }

    #[test]
    fn oversized_lines_are_rejected() {
        let payload = vec![b'x'; MAX_REQUEST_BYTES + 10];
        let mut reader = BufReader::new(Cursor::new(payload));
        assert!(matches!(
            read_request_line(&mut reader),
            Err(RequestReadError::TooLarge)
        ));
    }

    #[test]
    fn line_at_limit_is_accepted() {
        let mut payload = vec![b' '; MAX_REQUEST_BYTES];
        payload.push(b'\n');
        let mut reader = BufReader::new(Cursor::new(payload));
        let line = read_request_line(&mut reader)
            .expect("read")
            .expect("line present");
        assert_eq!(line.len(), MAX_REQUEST_BYTES);
        assert!(read_request_line(&mut reader).expect("read").is_none());
    }

    #[test]
    fn drain_waits_for_pending_replies_only() {
        let pending = Arc::new(PendingReplies::default());
        assert!(pending.wait_idle(Duration::ZERO));

        let reply = pending.enter();
        assert!(!pending.wait_idle(Duration::from_millis(20)));

        let waiter = {
            let pending = Arc::clone(&pending);
            thread::spawn(move || pending.wait_idle(Duration::from_secs(5)))
        };
        thread::sleep(Duration::from_millis(20));
        drop(reply);
        assert!(waiter.join().expect("waiter join"));
    }

    #[test]
    fn oversized_reply_is_invalid_request() {
        let reply: Value = serde_json::from_str(&oversized_reply()).expect("json");
        assert_eq!(reply["error"]["code"], json!(-32600));
    }
}
