#![cfg(all(unix, feature = "cli"))]

use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("ephemeral bind should work")
        .local_addr()
        .expect("local addr")
        .port()
}

fn wait_for_connect(addr: &str, timeout: Duration) -> TcpStream {
    let start = Instant::now();
    loop {
        if let Ok(stream) = TcpStream::connect(addr) {
            return stream;
        }
        if start.elapsed() >= timeout {
            panic!("connect timeout");
        }
        thread::sleep(Duration::from_millis(25));
    }
}

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_imubridge"))
        .arg("version")
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("imubridge {}", env!("CARGO_PKG_VERSION")));
}

#[test]
fn serve_with_missing_devices_runs_degraded() {
    let addr = format!("127.0.0.1:{}", free_port());

    let mut child = Command::new(env!("CARGO_BIN_EXE_imubridge"))
        .args(["--log-level", "error", "serve"])
        .args(["--channel0", "/dev/imubridge-missing-0"])
        .args(["--channel1", "/dev/imubridge-missing-1"])
        .args(["--bind", &addr])
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .expect("serve should start");

    // The relay accepts a client even though neither sensor opened.
    let _client = wait_for_connect(&addr, Duration::from_secs(5));
    thread::sleep(Duration::from_millis(200));
    assert!(child.try_wait().expect("poll child").is_none());

    let _ = child.kill();
    let output = child.wait_with_output().expect("collect serve output");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to open sensor stream"), "{stderr}");
    assert!(stderr.contains("/dev/imubridge-missing-0"), "{stderr}");
}

#[test]
fn serve_rejects_bad_write_timeout() {
    let output = Command::new(env!("CARGO_BIN_EXE_imubridge"))
        .args(["--log-level", "error", "serve", "--write-timeout", "soon"])
        .output()
        .expect("serve should run");

    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn serve_reports_bind_conflict() {
    let taken = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = taken.local_addr().expect("local addr").to_string();

    let output = Command::new(env!("CARGO_BIN_EXE_imubridge"))
        .args(["--log-level", "error", "serve", "--bind", &addr])
        .args(["--channel0", "/dev/imubridge-missing-0"])
        .args(["--channel1", "/dev/imubridge-missing-1"])
        .output()
        .expect("serve should run");

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("bridge start failed"), "{stderr}");
}

#[test]
fn listen_prints_requested_number_of_frames() {
    let relay = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = relay.local_addr().expect("local addr").to_string();

    let server = thread::spawn(move || {
        let (mut stream, _) = relay.accept().expect("accept");
        for fill in [0x01u8, 0x02, 0x03] {
            let mut wire = vec![fill; 20];
            wire.extend(vec![0xF0 | fill; 20]);
            stream.write_all(&wire).expect("write frame");
        }
    });

    let output = Command::new(env!("CARGO_BIN_EXE_imubridge"))
        .args(["--log-level", "error", "--format", "json", "listen", &addr])
        .args(["--count", "2"])
        .output()
        .expect("listen should run");
    server.join().expect("server thread should finish");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains(&"01".repeat(20)));
    assert!(lines[0].contains(&"f1".repeat(20)));
    assert!(lines[1].contains("\"index\":2"));
}

#[test]
fn listen_without_relay_is_transport_error() {
    let addr = format!("127.0.0.1:{}", free_port());

    let output = Command::new(env!("CARGO_BIN_EXE_imubridge"))
        .args(["--log-level", "error", "listen", &addr])
        .output()
        .expect("listen should run");

    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn ports_json_is_an_array() {
    let output = Command::new(env!("CARGO_BIN_EXE_imubridge"))
        .args(["--format", "json", "ports"])
        .output()
        .expect("ports should run");

    if output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.trim_start().starts_with('['), "{stdout}");
    } else {
        assert_eq!(output.status.code(), Some(3));
    }
}

#[test]
fn serve_replay_exits_when_captures_end() {
    let dir = std::env::temp_dir().join(format!("imubridge-cli-replay-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    let mut capture = b"noise".to_vec();
    capture.push(b'A');
    capture.extend([0x55; 20]);
    capture.push(b'Z');
    let path0 = dir.join("imu0.bin");
    let path1 = dir.join("imu1.bin");
    std::fs::write(&path0, &capture).expect("write capture");
    std::fs::write(&path1, &capture).expect("write capture");

    let mut child = Command::new(env!("CARGO_BIN_EXE_imubridge"))
        .args(["--log-level", "error", "serve", "--replay"])
        .args(["--channel0", path0.to_str().expect("utf-8 path")])
        .args(["--channel1", path1.to_str().expect("utf-8 path")])
        .args(["--bind", &format!("127.0.0.1:{}", free_port())])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("serve should start");

    let start = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait().expect("poll child") {
            break status;
        }
        if start.elapsed() >= Duration::from_secs(10) {
            let _ = child.kill();
            panic!("serve --replay did not exit after both captures ended");
        }
        thread::sleep(Duration::from_millis(25));
    };
    assert!(status.success());
    let _ = std::fs::remove_dir_all(&dir);
}
