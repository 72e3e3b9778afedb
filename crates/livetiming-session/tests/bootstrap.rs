//! Snapshot bootstrap against a real HTTP endpoint.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use livetiming_frame::{encode_packet, header_for, Catalog, Header, LengthRule};
use livetiming_session::{
    ClientConfig, Connection, Dispatcher, FrameDetail, FrameRecord, FrameSink, FrameSource, Session, POLL_PROBE,
};
use livetiming_transport::{AuthToken, FirebaseRef, HttpClient};
use tiny_http::{Response, Server};
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

type Log = Arc<Mutex<Vec<String>>>;

struct LogSink(Log);

impl FrameSink for LogSink {
    fn save_frame(&mut self, record: &FrameRecord) {
        let source = match record.source {
            FrameSource::Live => "live".to_string(),
            FrameSource::Snapshot { replayed_from } => format!("snapshot {replayed_from}"),
        };
        let detail = match &record.detail {
            FrameDetail::SnapshotMarker { snapshot_id } => format!("marker {snapshot_id}"),
            FrameDetail::Opaque => format!("opaque kind {}", record.kind),
            other => format!("{other:?}"),
        };
        self.0.lock().expect("lock").push(format!("{source}: {detail}"));
    }

    fn save_snapshot(&mut self, snapshot_id: u16, _blob: &Bytes) {
        self.0.lock().expect("lock").push(format!("blob {snapshot_id}"));
    }
}

fn packet(kind: u8, rule: LengthRule, payload: &[u8], wire: &mut BytesMut) {
    let header = header_for(0, kind, rule, payload.len(), 0).expect("header fits");
    encode_packet(header, payload, wire);
}

fn snapshot_blob() -> Vec<u8> {
    let mut blob = BytesMut::new();
    packet(12, LengthRule::Data, b"(c) FOM", &mut blob);
    blob.extend_from_slice(&Header::new(0, 15, 0).expect("header").to_bits().to_le_bytes());
    packet(2, LengthRule::Fixed(2), &9u16.to_le_bytes(), &mut blob);
    packet(3, LengthRule::Empty, &[], &mut blob);
    blob.to_vec()
}

/// Serve snapshot requests until none arrives for a while; returns the seen URLs.
fn serve_snapshots(blob: Vec<u8>) -> (String, thread::JoinHandle<Vec<String>>) {
    let server = Server::http("127.0.0.1:0").expect("test server should bind");
    let port = server
        .server_addr()
        .to_ip()
        .map(|addr| addr.port())
        .expect("test server should listen on ip");
    let handle = thread::spawn(move || {
        let mut seen = Vec::new();
        while let Ok(Some(request)) = server.recv_timeout(Duration::from_secs(2)) {
            seen.push(request.url().to_string());
            request
                .respond(Response::from_data(blob.clone()))
                .expect("response should send");
        }
        seen
    });
    (format!("http://127.0.0.1:{port}"), handle)
}

#[tokio::test]
async fn marker_bootstraps_once_and_arms_monitor_after_replay() {
    let (base, server) = serve_snapshots(snapshot_blob());
    let service = Arc::new(HttpClient::with_base_url(base));

    let log = Log::default();
    let dispatcher =
        Dispatcher::<FirebaseRef>::new(Box::new(LogSink(Arc::clone(&log))), None).expect("dispatcher starts");
    let config = ClientConfig {
        poll_window: Duration::from_millis(50),
        ..ClientConfig::default()
    };
    let connection = Connection::new(
        config,
        Arc::new(Catalog::v1()),
        service,
        Session::new(AuthToken::new("tok")),
        dispatcher,
    );

    let (client, mut stream) = duplex(1024);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(connection.run(client, cancel.clone()));

    let mut wire = BytesMut::new();
    packet(2, LengthRule::Fixed(2), &7u16.to_le_bytes(), &mut wire);
    packet(2, LengthRule::Fixed(2), &7u16.to_le_bytes(), &mut wire);
    stream.write_all(&wire).await.expect("write markers");

    let mut probe = [0u8; 1];
    tokio::time::timeout(Duration::from_secs(10), stream.read_exact(&mut probe))
        .await
        .expect("monitor should arm after bootstrap")
        .expect("probe should arrive");
    assert_eq!(probe[0], POLL_PROBE);

    // Everything in the blob was persisted before the first probe.
    let persisted = log.lock().expect("lock").clone();
    assert_eq!(
        persisted,
        vec![
            "live: marker 7".to_string(),
            "live: marker 7".to_string(),
            "blob 7".to_string(),
            "snapshot 7: opaque kind 12".to_string(),
            "snapshot 7: marker 9".to_string(),
            "snapshot 7: opaque kind 3".to_string(),
        ]
    );

    // A repeat of the bootstrapped id does not fetch again.
    stream.write_all(&wire[..4]).await.expect("write marker");
    while log.lock().expect("lock").len() < 7 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cancel.cancel();
    let stats = task.await.expect("join").expect("clean shutdown");
    assert_eq!(stats.snapshot_fetches, 1);
    assert_eq!(stats.snapshots, 1);

    assert_eq!(server.join().expect("server thread"), vec!["/keyframe_00007.bin".to_string()]);
}
