#![cfg(all(target_os = "linux", feature = "cli"))]

use std::io::Write;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// A conntrack "new" message carrying only l4proto = 6.
const L4PROTO_TCP: [u8; 16] = [
    0x10, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x01, //
    0x00, 0x05, 0x00, 0x02, 0x06, 0x00, 0x00, 0x00,
];

const WAIT: Duration = Duration::from_secs(5);

/// Time for the listener to pick up what the previous peer did.
const SETTLE: Duration = Duration::from_millis(200);

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/ctsync-stream-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn free_tcp_addr() -> SocketAddr {
    TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .expect("ephemeral port should be available")
}

/// Start `listen --count 1` on a TCP channel; returns the child and the
/// address it accepts peers on.
fn spawn_tcp_listener(dir: &Path) -> (Child, SocketAddr) {
    let server = free_tcp_addr();
    let client = free_tcp_addr();
    let conf = dir.join("listen.toml");
    std::fs::write(
        &conf,
        format!(
            r#"
[[channel]]
type = "tcp"
ifname = "lo"
server = "{server}"
client = "{client}"
"#
        ),
    )
    .expect("config should be writable");

    let child = Command::new(env!("CARGO_BIN_EXE_ctsync"))
        .args(["--log-level", "error", "--format", "json", "listen"])
        .args(["--count", "1", "--config"])
        .arg(&conf)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("listen should start");
    (child, server)
}

fn connect_when_up(addr: SocketAddr) -> TcpStream {
    let start = Instant::now();
    loop {
        match TcpStream::connect(addr) {
            Ok(stream) => return stream,
            Err(_) if start.elapsed() < WAIT => {
                thread::sleep(Duration::from_millis(20));
            }
            Err(err) => panic!("listener never came up: {err}"),
        }
    }
}

fn wait_exit(child: &mut Child) -> ExitStatus {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().expect("listen should be waitable") {
            return status;
        }
        if start.elapsed() >= WAIT {
            let _ = child.kill();
            panic!("listen did not print a message");
        }
        thread::sleep(Duration::from_millis(20));
    }
}

fn first_message(child: Child) -> serde_json::Value {
    let output = child.wait_with_output().expect("listen output should be readable");
    let text = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(text.lines().next().unwrap_or_default()).expect("json line")
}

#[test]
fn partial_message_from_closed_peer_is_discarded() {
    let dir = unique_temp_dir("partial");
    let (mut child, addr) = spawn_tcp_listener(&dir);

    let mut first = connect_when_up(addr);
    first
        .write_all(&L4PROTO_TCP[..10])
        .expect("partial message should be written");
    thread::sleep(SETTLE);
    drop(first);
    thread::sleep(SETTLE);

    let mut second = connect_when_up(addr);
    second
        .write_all(&L4PROTO_TCP)
        .expect("message should be written");

    let status = wait_exit(&mut child);
    assert!(status.success(), "listen exited with {status}");
    let payload = first_message(child);
    assert_eq!(payload["kind"], "ct-new");
    assert_eq!(payload["seq"], 1);
    assert_eq!(payload["fields"]["l4proto"], "6");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn partial_message_from_replaced_peer_is_discarded() {
    let dir = unique_temp_dir("replaced");
    let (mut child, addr) = spawn_tcp_listener(&dir);

    let mut first = connect_when_up(addr);
    first
        .write_all(&L4PROTO_TCP[..10])
        .expect("partial message should be written");
    thread::sleep(SETTLE);

    // The new connection takes over while the first is still open.
    let mut second = connect_when_up(addr);
    thread::sleep(SETTLE);
    second
        .write_all(&L4PROTO_TCP)
        .expect("message should be written");

    let status = wait_exit(&mut child);
    assert!(status.success(), "listen exited with {status}");
    assert_eq!(first_message(child)["fields"]["l4proto"], "6");
    drop(first);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn reset_peer_does_not_stop_listen() {
    let dir = unique_temp_dir("reset");
    let (mut child, addr) = spawn_tcp_listener(&dir);

    let first = connect_when_up(addr);
    thread::sleep(SETTLE);
    // Linger zero turns the close into a reset.
    let first = socket2::Socket::from(first);
    first
        .set_linger(Some(Duration::ZERO))
        .expect("linger should be settable");
    drop(first);
    thread::sleep(SETTLE);

    let mut second = connect_when_up(addr);
    second
        .write_all(&L4PROTO_TCP)
        .expect("message should be written");

    let status = wait_exit(&mut child);
    assert_eq!(status.code(), Some(0));
    assert_eq!(first_message(child)["fields"]["l4proto"], "6");

    let _ = std::fs::remove_dir_all(&dir);
}
