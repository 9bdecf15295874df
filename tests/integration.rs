use assert_cmd::Command;
use assert_fs::TempDir;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

const PROBE: &str = "@@samplebench-memory";

/// Creates a temp workspace with a `samples/` directory holding the given scripts.
/// Returns the temp dir (must be kept alive).
fn setup_samples(scripts: &[(&str, &str)]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    let samples = tmp.path().join("samples");
    fs::create_dir_all(&samples).unwrap();
    for (name, body) in scripts {
        fs::write(samples.join(name), body).unwrap();
    }
    tmp
}

fn probe_line(used: u64, total: u64) -> String {
    format!(
        "echo '{} {{\"heap_used_bytes\":{},\"heap_total_bytes\":{}}}'\n",
        PROBE, used, total
    )
}

/// Base command: isolated from any user config, colors off, cwd inside the workspace.
fn bench_cmd(tmp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("samplebench").unwrap();
    cmd.current_dir(tmp.path());
    cmd.env("XDG_CONFIG_HOME", tmp.path().join("xdg"));
    cmd.env("NO_COLOR", "1");
    cmd.env_remove("RUST_LOG");
    cmd
}

/// Command running `sh` samples from `samples/` via a config file; the report goes to `report.csv`.
fn sh_cmd(tmp: &TempDir) -> Command {
    fs::write(
        tmp.path().join("samplebench.toml"),
        "[samples]\nextensions = [\"sh\"]\n\n[runner]\nruntime = \"exec\"\nprogram = \"sh\"\ntimeout = \"10s\"\n\n[output]\npath = \"report.csv\"\n",
    )
    .unwrap();
    bench_cmd(tmp)
}

fn read_report(tmp: &TempDir) -> Vec<Vec<String>> {
    let raw = fs::read_to_string(tmp.path().join("report.csv")).unwrap();
    raw.lines()
        .map(|l| l.split(',').map(|c| c.to_string()).collect())
        .collect()
}

// ---- Full runs ----

#[test]
fn writes_report_in_registry_order() {
    let second = probe_line(2048, 4096);
    let first = probe_line(1024, 8192);
    let tmp = setup_samples(&[
        ("b_second.sh", second.as_str()),
        ("a_first.sh", first.as_str()),
        ("c_third.sh", "true\n"),
    ]);

    sh_cmd(&tmp)
        .assert()
        .success()
        .stdout(predicate::str::contains("Benchmark results (3 samples):"))
        .stdout(predicate::str::contains("Report written to "))
        .stdout(predicate::str::contains("report.csv"));

    let rows = read_report(&tmp);
    assert_eq!(
        rows[0],
        vec![
            "sample",
            "wallClockMillis",
            "heapUsedBytes",
            "heapTotalBytes",
            "degraded",
            "exitStatus"
        ]
    );
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[1][0], "a_first.sh");
    assert_eq!(rows[1][2], "1024");
    assert_eq!(rows[1][3], "8192");
    assert_eq!(rows[1][4], "false");
    assert_eq!(rows[1][5], "success");
    assert_eq!(rows[2][0], "b_second.sh");
    assert_eq!(rows[3][0], "c_third.sh");
    // No probe line: heap unavailable rather than zero.
    assert_eq!(rows[3][2], "");
    assert_eq!(rows[3][3], "");
    assert_eq!(rows[3][4], "true");
}

#[test]
fn sample_failures_do_not_fail_the_run() {
    let good = probe_line(1, 2);
    let tmp = setup_samples(&[("bad.sh", "exit 4\n"), ("good.sh", good.as_str())]);

    sh_cmd(&tmp)
        .assert()
        .success()
        .stdout(predicate::str::contains("exited with code 4"));

    let rows = read_report(&tmp);
    assert_eq!(rows[1][0], "bad.sh");
    assert_eq!(rows[1][5], "failure");
    assert_eq!(rows[2][5], "success");
}

#[test]
fn timeout_reported_as_failure() {
    let tmp = setup_samples(&[("spin.sh", "while true; do :; done\n")]);

    let started = Instant::now();
    sh_cmd(&tmp)
        .arg("--timeout")
        .arg("100")
        .assert()
        .success()
        .stdout(predicate::str::contains("timed out"));
    assert!(started.elapsed() < Duration::from_secs(10));

    let rows = read_report(&tmp);
    assert_eq!(rows[1][0], "spin.sh");
    let millis: u64 = rows[1][1].parse().unwrap();
    assert!(millis >= 100);
    assert_eq!(rows[1][4], "true");
    assert_eq!(rows[1][5], "failure");
}

#[test]
fn status_fields_stable_across_runs() {
    let ok = probe_line(10, 20);
    let tmp = setup_samples(&[
        ("ok.sh", ok.as_str()),
        ("bad.sh", "exit 1\n"),
        ("plain.sh", "echo hi\n"),
    ]);

    sh_cmd(&tmp).assert().success();
    let first = read_report(&tmp);
    sh_cmd(&tmp).assert().success();
    let second = read_report(&tmp);

    let status = |rows: &Vec<Vec<String>>| {
        rows.iter()
            .map(|r| (r[0].clone(), r[4].clone(), r[5].clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(status(&first), status(&second));
}

// ---- Output formats ----

#[test]
fn json_output_valid() {
    let one = probe_line(100, 200);
    let tmp = setup_samples(&[("one.sh", one.as_str())]);

    let output = sh_cmd(&tmp).arg("--json").output().unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value =
        serde_json::from_str(&stdout).expect("Output should be valid JSON");
    assert_eq!(parsed["samples"], 1);
    let record = &parsed["records"][0];
    assert_eq!(record["sample"], "one.sh");
    assert_eq!(record["heap_used_bytes"], 100);
    assert_eq!(record["heap_total_bytes"], 200);
    assert_eq!(record["exit_status"], "success");
}

#[test]
fn short_format_one_line_per_sample() {
    let tmp = setup_samples(&[("a.sh", "true\n"), ("b.sh", "true\n")]);

    let output = sh_cmd(&tmp).arg("--format").arg("short").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("a.sh"));
    assert!(lines[1].starts_with("b.sh"));
}

// ---- Configuration errors ----

#[test]
fn missing_samples_directory_fails_without_report() {
    let tmp = TempDir::new().unwrap();

    bench_cmd(&tmp)
        .arg("--samples")
        .arg("does-not-exist")
        .arg("--out")
        .arg("report.csv")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Samples directory not found"));

    assert!(!tmp.path().join("report.csv").exists());
}

#[test]
fn empty_samples_directory_fails() {
    let tmp = setup_samples(&[("notes.txt", "hello")]);

    sh_cmd(&tmp)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No samples found"));

    assert!(!tmp.path().join("report.csv").exists());
}

#[test]
fn zero_timeout_rejected() {
    let tmp = setup_samples(&[("a.sh", "true\n")]);

    sh_cmd(&tmp)
        .arg("--timeout")
        .arg("0")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Timeout must be greater than zero"));
}

#[test]
fn explicit_config_must_exist() {
    let tmp = setup_samples(&[("a.sh", "true\n")]);

    bench_cmd(&tmp)
        .arg("--config")
        .arg("nope.toml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}

#[test]
fn static_sample_list_sets_order() {
    let tmp = setup_samples(&[("a.sh", "true\n"), ("b.sh", "true\n"), ("c.sh", "true\n")]);
    let config = tmp.path().join("custom.toml");
    fs::write(
        &config,
        "[samples]\ninclude = [\"c.sh\", \"a.sh\"]\n\n[runner]\nruntime = \"exec\"\nprogram = \"sh\"\n\n[output]\npath = \"custom.csv\"\n",
    )
    .unwrap();

    bench_cmd(&tmp)
        .arg("--config")
        .arg(&config)
        .assert()
        .success();

    let raw = fs::read_to_string(tmp.path().join("custom.csv")).unwrap();
    let names: Vec<&str> = raw
        .lines()
        .skip(1)
        .map(|l| l.split(',').next().unwrap())
        .collect();
    assert_eq!(names, vec!["c.sh", "a.sh"]);
}

#[test]
fn discovered_config_resolves_paths_from_its_own_directory() {
    let tmp = setup_samples(&[("a.sh", "true\n")]);
    let nested = tmp.path().join("sub").join("deeper");
    fs::create_dir_all(&nested).unwrap();

    sh_cmd(&tmp).current_dir(&nested).assert().success();

    let rows = read_report(&tmp);
    assert_eq!(rows[1][0], "a.sh");
    assert_eq!(rows[1][5], "success");
    assert!(!nested.join("report.csv").exists());
}

#[test]
fn command_line_paths_stay_relative_to_cwd() {
    let tmp = setup_samples(&[("a.sh", "true\n")]);
    let nested = tmp.path().join("sub");
    fs::create_dir_all(&nested).unwrap();

    sh_cmd(&tmp)
        .current_dir(&nested)
        .arg("--out")
        .arg("here.csv")
        .assert()
        .success();

    assert!(nested.join("here.csv").is_file());
    assert!(!tmp.path().join("report.csv").exists());
}

// ---- Environment and IO errors ----

#[test]
fn unspawnable_interpreter_aborts_without_report() {
    let tmp = setup_samples(&[("a.sh", "true\n")]);

    sh_cmd(&tmp)
        .arg("--program")
        .arg("/nonexistent/interpreter")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Failed to spawn"));

    assert!(!tmp.path().join("report.csv").exists());
}

#[test]
fn unwritable_destination_fails_before_running_samples() {
    let tmp = setup_samples(&[("touch.sh", "touch ran.marker\n")]);

    sh_cmd(&tmp)
        .arg("--out")
        .arg("missing-dir/report.csv")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Failed to write report"));

    assert!(!tmp.path().join("missing-dir").exists());
    assert!(!tmp.path().join("ran.marker").exists());
}

// ---- init ----

#[test]
fn init_prints_parseable_config() {
    let tmp = TempDir::new().unwrap();

    let output = bench_cmd(&tmp).arg("init").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[runner]"));
    let parsed: toml::Value = toml::from_str(&stdout).unwrap();
    assert_eq!(parsed["runner"]["runtime"].as_str(), Some("node"));
}

// ---- Cancellation ----

#[cfg(unix)]
fn wait_for_file(path: &Path, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if path.exists() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    false
}

#[cfg(unix)]
#[test]
fn interrupt_kills_in_flight_sample() {
    let tmp = setup_samples(&[(
        "hang.sh",
        "echo $$ > pid.tmp && mv pid.tmp pid\nsleep 30\n",
    )]);
    fs::write(
        tmp.path().join("samplebench.toml"),
        "[samples]\nextensions = [\"sh\"]\n\n[runner]\nruntime = \"exec\"\nprogram = \"sh\"\ntimeout = \"60s\"\n",
    )
    .unwrap();

    let mut child = std::process::Command::new(env!("CARGO_BIN_EXE_samplebench"))
        .current_dir(tmp.path())
        .env("XDG_CONFIG_HOME", tmp.path().join("xdg"))
        .arg("--out")
        .arg("report.csv")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .unwrap();

    let pid_file = tmp.path().join("pid");
    assert!(wait_for_file(&pid_file, Duration::from_secs(10)), "sample never started");
    let sample_pid: i32 = fs::read_to_string(&pid_file).unwrap().trim().parse().unwrap();

    unsafe {
        libc::kill(child.id() as libc::pid_t, libc::SIGINT);
    }

    let deadline = Instant::now() + Duration::from_secs(10);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            panic!("samplebench did not exit after SIGINT");
        }
        std::thread::sleep(Duration::from_millis(20));
    };

    assert_eq!(status.code(), Some(130));
    assert!(!tmp.path().join("report.csv").exists());

    // The sample was reaped by samplebench; its pid no longer exists.
    let alive = unsafe { libc::kill(sample_pid, 0) } == 0;
    assert!(!alive, "sample process {} outlived the harness", sample_pid);
}

// ---- Node runtime (skipped when node is not installed) ----

fn node_available() -> bool {
    std::process::Command::new("node")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[test]
fn node_samples_report_heap_from_child() {
    if !node_available() {
        eprintln!("node not found; skipping");
        return;
    }

    let tmp = setup_samples(&[(
        "functionCalls.js",
        "function add(a, b) { return a + b; }\nlet sum = 0;\nfor (let i = 0; i < 100000; i++) { sum += add(i, i + 1); }\nconsole.log(sum);\n",
    )]);

    bench_cmd(&tmp)
        .arg("--out")
        .arg("report.csv")
        .assert()
        .success();

    let rows = read_report(&tmp);
    assert_eq!(rows[1][0], "functionCalls.js");
    assert_eq!(rows[1][4], "false");
    assert_eq!(rows[1][5], "success");
    let used: u64 = rows[1][2].parse().unwrap();
    let total: u64 = rows[1][3].parse().unwrap();
    assert!(used > 0);
    assert!(used <= total);
}

#[test]
fn node_sample_runs_as_entry_module() {
    if !node_available() {
        eprintln!("node not found; skipping");
        return;
    }

    let tmp = setup_samples(&[(
        "main.js",
        "if (require.main === module) {\n  const end = Date.now() + 300;\n  while (Date.now() < end) {}\n  require('fs').writeFileSync('ran.marker', 'RAN');\n}\n",
    )]);

    bench_cmd(&tmp)
        .arg("--out")
        .arg("report.csv")
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(tmp.path().join("ran.marker")).unwrap(),
        "RAN"
    );
    let rows = read_report(&tmp);
    assert_eq!(rows[1][0], "main.js");
    assert_eq!(rows[1][4], "false");
    assert_eq!(rows[1][5], "success");
    let millis: u64 = rows[1][1].parse().unwrap();
    assert!(millis >= 300, "sample body skipped: {}ms", millis);
}
