use portprobe_rs::report::{append_results, write_json, ScanReport};
use portprobe_rs::types::{PortResult, PortState, Protocol, ScanRequest};

fn results() -> Vec<PortResult> {
    vec![
        PortResult {
            port: 22,
            protocol: Protocol::Tcp,
            service: "SSH (Secure Shell)".into(),
            state: PortState::Open,
        },
        PortResult {
            port: 53,
            protocol: Protocol::Udp,
            service: "DNS (Domain Name System)".into(),
            state: PortState::OpenFiltered,
        },
    ]
}

#[test]
fn append_keeps_previous_lines() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("port_scan_results.txt");

    append_results(&path, &results()[..1]).expect("first append");
    append_results(&path, &results()).expect("second append");

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        content.lines().collect::<Vec<_>>(),
        vec![
            "Port 22 open - SSH (Secure Shell)",
            "Port 22 open - SSH (Secure Shell)",
            "Port 53 open - DNS (Domain Name System)",
        ]
    );
}

#[test]
fn append_to_missing_directory_errors() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nope").join("out.txt");
    assert!(append_results(&path, &results()).is_err());
}

#[test]
fn json_report_round_trips_as_value() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("report.json");
    let report = ScanReport::new(&ScanRequest::new("10.0.0.1", 20, 60), 1500, results());
    write_json(&path, &report).expect("write json");

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(value["host"], "10.0.0.1");
    assert_eq!(value["protocol"], "tcp");
    assert_eq!(value["open_count"], 2);
    assert_eq!(value["results"][1]["state"], "open|filtered");
}
