use crate::{parse::parse_sample, SampleHandler, SampleSource, StatusReporter};
use rssi_core::SourceState;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Longest bridge line accepted; anything longer is skipped up to its newline.
const MAX_LINE_LEN: usize = 256;

/// Reads newline-delimited RSSI readings from a TCP bridge.
///
/// The bridge is whatever process talks to the radio driver and forwards
/// each logged `radio.rssi` value as a text line (see [`parse_sample`]).
/// Automatically reconnects if the connection drops; while it is down the
/// window keeps its last samples.
#[derive(Debug, Clone)]
pub struct TcpLineSource {
    /// `host:port` of the bridge.
    address: String,
    /// Variable name accepted in `name=value` lines.
    variable: String,
    /// Pause between reconnect attempts.
    reconnect_delay: Duration,
}

impl TcpLineSource {
    pub fn new(
        address: impl Into<String>,
        variable: impl Into<String>,
        reconnect_delay: Duration,
    ) -> Self {
        Self {
            address: address.into(),
            variable: variable.into(),
            reconnect_delay,
        }
    }

    /// Forward readings from one connection until it closes or `cancel`
    /// fires. Returns the number of samples delivered.
    ///
    /// Lines that aren't valid UTF-8 or run past [`MAX_LINE_LEN`] are
    /// skipped; only EOF or an I/O error ends the connection.
    async fn pump(
        &self,
        stream: TcpStream,
        handler: &SampleHandler,
        cancel: &CancellationToken,
    ) -> u64 {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::with_capacity(64);
        let mut discarding = false;
        let mut delivered = 0;

        loop {
            buf.clear();
            let mut limited = (&mut reader).take(MAX_LINE_LEN as u64 + 1);
            let read = tokio::select! {
                _ = cancel.cancelled() => return delivered,
                read = limited.read_until(b'\n', &mut buf) => read,
            };

            match read {
                Ok(0) => return delivered,
                Ok(_) => {}
                Err(e) => {
                    warn!("Read error on RSSI bridge: {e}");
                    return delivered;
                }
            }

            let complete = buf.last() == Some(&b'\n');
            if discarding {
                // Tail of an overlong line.
                discarding = !complete;
                continue;
            }
            if !complete && buf.len() > MAX_LINE_LEN {
                debug!("Skipping bridge line longer than {MAX_LINE_LEN} bytes");
                discarding = true;
                continue;
            }

            let line = String::from_utf8_lossy(&buf);
            match parse_sample(&line, &self.variable) {
                Some(value) => {
                    handler(value);
                    delivered += 1;
                }
                None => debug!("Skipping bridge line: {line:?}"),
            }
        }
    }
}

impl SampleSource for TcpLineSource {
    fn describe(&self) -> String {
        format!("tcp bridge at {} ({})", self.address, self.variable)
    }

    async fn run(self, handler: SampleHandler, status: StatusReporter, cancel: CancellationToken) {
        loop {
            status.set(SourceState::Connecting);

            let connected = tokio::select! {
                _ = cancel.cancelled() => return,
                res = TcpStream::connect(&self.address) => res,
            };

            match connected {
                Ok(stream) => {
                    info!("Connected to RSSI bridge at {}", self.address);
                    status.set(SourceState::Connected);

                    let delivered = self.pump(stream, &handler, &cancel).await;
                    if cancel.is_cancelled() {
                        return;
                    }

                    status.set(SourceState::Disconnected);
                    warn!(
                        "RSSI bridge connection lost after {delivered} samples; reconnecting in {:?}…",
                        self.reconnect_delay
                    );
                }
                Err(e) => {
                    status.set(SourceState::Disconnected);
                    error!(
                        "Cannot connect to RSSI bridge at {}: {e}; retrying in {:?}…",
                        self.address, self.reconnect_delay
                    );
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{spawn_source, window_handler};
    use rssi_core::SlidingWindowBuffer;
    use std::sync::Arc;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    async fn wait_for_state(
        rx: &mut tokio::sync::watch::Receiver<rssi_core::SourceStatus>,
        want: SourceState,
    ) {
        tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| s.state == want))
            .await
            .expect("timed out waiting for source state")
            .expect("status channel closed");
    }

    #[tokio::test]
    async fn streams_lines_into_window_and_survives_disconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let buffer = Arc::new(SlidingWindowBuffer::new(4, -140.0));
        let cancel = CancellationToken::new();
        let source = TcpLineSource::new(addr, "radio.rssi", Duration::from_millis(200));
        let (task, mut status) =
            spawn_source(source, window_handler(Arc::clone(&buffer)), cancel.clone());

        let (mut conn, _) = listener.accept().await.unwrap();
        conn.write_all(b"-50\nradio.rssi=-60\npm.vbat=3.7\ngarbage\nradio.rssi>>-200\n")
            .await
            .unwrap();
        conn.shutdown().await.unwrap();
        drop(conn);

        wait_for_state(&mut status, SourceState::Disconnected).await;
        // Stale window is kept while the link is down.
        assert_eq!(buffer.snapshot().values(), &[-140.0, -50.0, -60.0, -140.0]);
        assert_eq!(buffer.push_count(), 3);

        // The source comes back on its own.
        let (mut conn, _) = listener.accept().await.unwrap();
        wait_for_state(&mut status, SourceState::Connected).await;
        conn.write_all(b"-42\n").await.unwrap();
        wait_for_latest(&buffer, -42.0).await;

        cancel.cancel();
        task.await.unwrap();
        assert_eq!(status.borrow().state, SourceState::Stopped);
    }

    async fn wait_for_latest(buffer: &SlidingWindowBuffer, want: f32) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while buffer.latest() != want {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("window never reached {want}"));
    }

    #[tokio::test]
    async fn bad_lines_are_skipped_without_dropping_the_link() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let buffer = Arc::new(SlidingWindowBuffer::new(4, -140.0));
        let cancel = CancellationToken::new();
        let source = TcpLineSource::new(addr, "radio.rssi", Duration::from_secs(60));
        let (task, mut status) =
            spawn_source(source, window_handler(Arc::clone(&buffer)), cancel.clone());

        let (mut conn, _) = listener.accept().await.unwrap();
        wait_for_state(&mut status, SourceState::Connected).await;

        conn.write_all(b"-50\n\xff\xfe\n-61\n").await.unwrap();
        wait_for_latest(&buffer, -61.0).await;

        let mut overlong = vec![b'7'; MAX_LINE_LEN * 4];
        overlong.extend_from_slice(b"\n-33\n");
        conn.write_all(&overlong).await.unwrap();
        wait_for_latest(&buffer, -33.0).await;

        assert_eq!(buffer.snapshot().values(), &[-140.0, -50.0, -61.0, -33.0]);
        assert_eq!(status.borrow().state, SourceState::Connected);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_bridge_reports_disconnected() {
        // Grab a free port, then close it so nothing is listening.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().to_string()
        };

        let cancel = CancellationToken::new();
        let source = TcpLineSource::new(addr, "radio.rssi", Duration::from_secs(60));
        let (task, mut status) = spawn_source(source, Arc::new(|_: f32| {}), cancel.clone());

        wait_for_state(&mut status, SourceState::Disconnected).await;

        // Cancellation interrupts the retry sleep.
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("source did not stop promptly")
            .unwrap();
    }
}
