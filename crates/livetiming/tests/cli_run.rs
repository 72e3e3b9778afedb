#![cfg(feature = "cli")]

use std::io::Write;
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::Duration;

use bytes::BytesMut;
use livetiming::frame::{encode_packet, header_for, LengthRule};
use tiny_http::{Header, Response, Server};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "ltrun-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

/// Login endpoint answering every request with `status`; returns its base URL.
fn serve_login(status: u16) -> (String, thread::JoinHandle<usize>) {
    let server = Server::http("127.0.0.1:0").expect("test server should bind");
    let port = server
        .server_addr()
        .to_ip()
        .map(|addr| addr.port())
        .expect("test server should listen on ip");
    let handle = thread::spawn(move || {
        let mut requests = 0;
        while let Ok(Some(request)) = server.recv_timeout(Duration::from_secs(3)) {
            requests += 1;
            let cookie = Header::from_bytes("Set-Cookie", "USER=tok123; path=/").expect("valid header");
            request
                .respond(Response::empty(status).with_header(cookie))
                .expect("response should send");
        }
        requests
    });
    (format!("http://127.0.0.1:{port}"), handle)
}

fn run_client(base: &str, credentials: &PathBuf, extra: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_livetiming"))
        .arg("--log-level")
        .arg("error")
        .arg("--format")
        .arg("json")
        .arg("run")
        .arg("--http-base")
        .arg(base)
        .arg("--credentials")
        .arg(credentials)
        .args(extra)
        .stdin(Stdio::null())
        .output()
        .expect("run should start")
}

fn store_credentials(dir: &std::path::Path) -> PathBuf {
    let path = dir.join(".f1rc");
    std::fs::write(&path, "email=fan@example.com\npassword=hunter2\n").expect("credentials should be writable");
    path
}

#[test]
fn rejected_login_exits_2_and_removes_credentials() {
    let dir = unique_temp_dir("auth");
    let credentials = store_credentials(&dir);
    let (base, server) = serve_login(200);

    let output = run_client(&base, &credentials, &[]);

    assert_eq!(output.status.code(), Some(2));
    assert!(!credentials.exists());
    assert!(String::from_utf8_lossy(&output.stderr).contains("please try again"));
    assert_eq!(server.join().expect("server thread"), 1);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn unreachable_service_exits_3_and_keeps_credentials() {
    let dir = unique_temp_dir("unreachable");
    let credentials = store_credentials(&dir);
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);

    let output = run_client(&format!("http://127.0.0.1:{port}"), &credentials, &[]);

    assert_eq!(output.status.code(), Some(3));
    assert!(credentials.exists());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn closed_live_stream_exits_1_after_recording_frames() {
    let dir = unique_temp_dir("stream");
    let credentials = store_credentials(&dir);
    let record = dir.join("session.jsonl");
    let (base, _server) = serve_login(302);

    let live = TcpListener::bind("127.0.0.1:0").expect("live listener should bind");
    let live_port = live.local_addr().expect("addr").port();
    let feed = thread::spawn(move || {
        let (mut socket, _) = live.accept().expect("client should connect");
        let mut wire = BytesMut::new();
        encode_packet(
            header_for(0, 12, LengthRule::Data, 7, 0).expect("header fits"),
            b"(c) FOM",
            &mut wire,
        );
        encode_packet(
            header_for(0, 3, LengthRule::Empty, 0, 1).expect("header fits"),
            &[],
            &mut wire,
        );
        socket.write_all(&wire).expect("feed should send");
    });

    let port = live_port.to_string();
    let output = run_client(
        &base,
        &credentials,
        &[
            "--host",
            "127.0.0.1",
            "--port",
            &port,
            "--record",
            record.to_str().expect("utf8 path"),
        ],
    );
    feed.join().expect("feed thread");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("connection lost"));
    let recorded = std::fs::read_to_string(&record).expect("record file should exist");
    let lines: Vec<serde_json::Value> = recorded
        .lines()
        .map(|line| serde_json::from_str(line).expect("record line should be json"))
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["kind"], 12);
    assert_eq!(lines[1]["kind"], 3);
    assert!(lines.iter().all(|line| line["source"] == "live"));
    let _ = std::fs::remove_dir_all(&dir);
}
