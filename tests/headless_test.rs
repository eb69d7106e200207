use std::process::Command;

fn run(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_traffic_network"))
        .args(args)
        .env("RUST_LOG", "warn,traffic_network=info")
        .output()
        .expect("Failed to execute simulation")
}

/// Test that the simulation runs in headless mode without crashing
#[test]
fn test_headless_simulation_runs() {
    let output = run(&["--ticks", "300", "--check"]);

    assert!(
        output.status.success(),
        "Simulation failed to run in headless mode. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("SIMULATION COMPLETE"),
        "Simulation did not complete properly. stderr: {}",
        stderr
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("=== Final State ==="));
    assert!(stdout.contains("junction_a"));
}

/// Test that vehicles leave the network during a run
#[test]
fn test_vehicles_exit_during_simulation() {
    let output = run(&["--ticks", "400", "--controller", "cycle", "--cycle-ticks", "15"]);
    assert!(output.status.success(), "Simulation failed to run");

    let stderr = String::from_utf8_lossy(&output.stderr);
    let exited_line = stderr
        .lines()
        .find(|line| line.contains("Vehicles exited:"))
        .expect("Could not find 'Vehicles exited' line");

    let parts: Vec<&str> = exited_line.split("Vehicles exited:").collect();
    let exited: u64 = parts
        .get(1)
        .and_then(|s| s.trim().parse().ok())
        .expect("Could not parse exit count");

    assert!(exited > 0, "No vehicles exited during simulation");
}

/// Test that fixed phases and the map flag are accepted
#[test]
fn test_fixed_controller_with_map() {
    let output = run(&[
        "--ticks",
        "50",
        "--controller",
        "fixed",
        "--phases",
        "-1,3",
        "--report-every",
        "25",
        "--map",
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("=== Network Map ==="));
    assert!(stdout.contains("--- After tick 25 ---"));
}

/// Test that a network file is loaded and a malformed one is rejected
#[test]
fn test_network_file_loading() {
    let dir = std::env::temp_dir().join(format!("traffic_network_test_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    let good = dir.join("line.toml");
    std::fs::write(
        &good,
        r#"
[[edges]]
id = 0
name = "only_road"
start = [0, 0]
end = [100, 0]
capacity = 4
speed = 10
spawn_rate = 0.5
"#,
    )
    .unwrap();
    let output = run(&["--ticks", "100", "--check", "--network", good.to_str().unwrap()]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("only_road"));

    let bad = dir.join("bad.toml");
    std::fs::write(
        &bad,
        r#"
[[edges]]
id = 0
start = [0, 0]
end = [100, 0]
capacity = 4
speed = 10
next_edge = 7
"#,
    )
    .unwrap();
    let output = run(&["--network", bad.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown edge 7"));

    std::fs::remove_dir_all(&dir).ok();
}
