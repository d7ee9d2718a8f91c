use std::{
    fs,
    net::TcpListener,
    path::Path,
    process::{Command, Output},
};

fn noaa_etl(dir: &Path, args: &[&str]) -> Output {
    noaa_etl_logging(dir, "info", args)
}

fn noaa_etl_logging(dir: &Path, rust_log: &str, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_noaa-etl"))
        .args(args)
        .current_dir(dir)
        .env_remove("NOAA_TOKEN")
        .env_remove("NOAA_BUCKET")
        .env_remove("HTTP_PROXY")
        .env_remove("http_proxy")
        .env_remove("HTTPS_PROXY")
        .env_remove("https_proxy")
        .env_remove("ALL_PROXY")
        .env_remove("all_proxy")
        .env("NO_PROXY", "127.0.0.1")
        .env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join(".config"))
        .env("RUST_LOG", rust_log)
        .output()
        .expect("failed to spawn noaa-etl")
}

fn refused_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

#[test]
fn missing_token_fails_before_any_request() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(".env"), format!("NOAA_BASE_URL={}\n", refused_base_url())).unwrap();

    let out = noaa_etl(dir.path(), &["run", "--skip-probe"]);
    let stderr = String::from_utf8_lossy(&out.stderr);

    assert!(!out.status.success());
    assert!(stderr.contains("NOAA_TOKEN"), "stderr: {stderr}");
    assert!(!stderr.contains("Requesting"), "stderr: {stderr}");
}

#[test]
fn empty_token_fails_before_any_request() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(".env"), "NOAA_TOKEN=\n").unwrap();

    let out = noaa_etl(dir.path(), &["probe"]);

    assert!(!out.status.success());
    assert!(!String::from_utf8_lossy(&out.stderr).contains("Requesting"));
}

#[test]
fn fetch_failure_is_not_fatal_unless_strict() {
    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("raw");
    fs::write(
        dir.path().join(".env"),
        format!("NOAA_TOKEN=abc123secret\nNOAA_BASE_URL={}\n", refused_base_url()),
    )
    .unwrap();
    let local_dir = raw.to_str().unwrap();
    let args = ["run", "--skip-probe", "--timeout", "5", "--local-dir", local_dir];

    let out = noaa_etl(dir.path(), &args);
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(out.status.success(), "stderr: {stderr}");
    assert!(stderr.contains("Failed to fetch data."), "stderr: {stderr}");
    assert!(!stderr.contains("abc123secret"), "token leaked: {stderr}");
    assert!(!raw.join("noaa_raw").exists());

    let strict = noaa_etl(dir.path(), &[&args[..], &["--strict"][..]].concat());
    assert!(!strict.status.success());
}

#[test]
fn verbosity_flag_wins_over_rust_log() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(".env"), "NOAA_TOKEN=\n").unwrap();

    let quiet = noaa_etl_logging(dir.path(), "error", &["probe"]);
    assert!(!String::from_utf8_lossy(&quiet.stderr).contains("Current working directory"));

    let verbose = noaa_etl_logging(dir.path(), "error", &["-v", "probe"]);
    let stderr = String::from_utf8_lossy(&verbose.stderr);
    assert!(stderr.contains("Current working directory"), "stderr: {stderr}");
}
