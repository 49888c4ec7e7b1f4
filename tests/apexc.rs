#[test]
fn endpoints() {
    let mut cmd = assert_cmd::Command::cargo_bin("apexc").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd.arg("endpoints");
    let stdout = String::from_utf8(cmd.unwrap().stdout).unwrap();
    let names = stdout.lines().collect::<Vec<_>>();
    assert!(names.contains(&"GetInstruments"));
    assert!(names.contains(&"SubscribeLevel2"));
    let mut sorted = names.clone();
    sorted.sort_unstable();
    assert_eq!(names, sorted);
}

#[test]
fn call_unknown_endpoint() {
    let mut cmd = assert_cmd::Command::cargo_bin("apexc").unwrap();
    cmd.args(&["--url", "ws://127.0.0.1:1/WSGateway/", "call", "NoSuchThing"]);
    let output = cmd.assert().failure().get_output().clone();
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Unknown endpoint NoSuchThing"), "{}", stderr);
}

#[test]
fn call_connection_refused() {
    let mut cmd = assert_cmd::Command::cargo_bin("apexc").unwrap();
    cmd.args(&["--url", "ws://127.0.0.1:1/WSGateway/", "call", "GetProducts"]);
    let output = cmd.assert().failure().get_output().clone();
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(
        stderr.contains("Failed to connect to ws://127.0.0.1:1/WSGateway/"),
        "{}",
        stderr
    );
}

#[test]
fn watch_unknown_stream() {
    let mut cmd = assert_cmd::Command::cargo_bin("apexc").unwrap();
    cmd.args(&["watch", "orders"]);
    cmd.assert().failure();
}
