//! Integration tests for the `pact serve` HTTP API.
//!
//! Each test starts the server as a child process on a unique port with the
//! demo seed loaded, makes raw HTTP requests, and verifies the responses.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use serde_json::{json, Value};

/// Atomic port counter to avoid port conflicts between parallel tests.
/// Base port is derived from process ID so separate test binaries don't
/// collide on the same port range.
static NEXT_PORT: AtomicU16 = AtomicU16::new(0);
static PORT_INIT: std::sync::Once = std::sync::Once::new();

fn next_port() -> u16 {
    PORT_INIT.call_once(|| {
        let base = 20000 + (std::process::id() as u16 % 20000);
        NEXT_PORT.store(base, Ordering::SeqCst);
    });
    NEXT_PORT.fetch_add(1, Ordering::SeqCst)
}

/// A running `pact serve`; killed on drop.
struct Server {
    child: Child,
    port: u16,
}

impl Drop for Server {
    fn drop(&mut self) {
        self.child.kill().ok();
        self.child.wait().ok();
    }
}

fn start_server(extra_args: &[&str], env: &[(&str, &str)]) -> Server {
    let manifest_dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR"));
    let workspace_root = manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .expect("workspace root");

    let port = next_port();
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pact"));
    cmd.current_dir(workspace_root);
    cmd.args(["serve", "--seed", "demos/seed.json", "--port"])
        .arg(port.to_string())
        .args(extra_args);
    cmd.env_remove("PACT_API_KEY")
        .env_remove("PACT_RATE_LIMIT")
        .env_remove("PACT_PORT");
    for (k, v) in env {
        cmd.env(k, v);
    }
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::null());

    let child = cmd.spawn().expect("failed to start pact serve");
    for _ in 0..50 {
        if TcpStream::connect(format!("127.0.0.1:{}", port)).is_ok() {
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    Server { child, port }
}

const PARTNER: &[(&str, &str)] = &[("X-Pact-Subject", "p-full"), ("X-Pact-Role", "partner")];
const ADMIN: &[(&str, &str)] = &[("X-Pact-Subject", "admin-1"), ("X-Pact-Role", "admin")];

fn partner_with(extra: (&'static str, &'static str)) -> Vec<(&'static str, &'static str)> {
    let mut headers = PARTNER.to_vec();
    headers.push(extra);
    headers
}

/// Make an HTTP request and return (status, body).
fn http(
    port: u16,
    method: &str,
    path: &str,
    headers: &[(&str, &str)],
    body: Option<&Value>,
) -> (u16, String) {
    let mut stream = TcpStream::connect(format!("127.0.0.1:{}", port)).expect("failed to connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();

    let mut header_lines = String::new();
    for (name, value) in headers {
        header_lines.push_str(&format!("{}: {}\r\n", name, value));
    }
    let payload = body.map(|b| b.to_string()).unwrap_or_default();
    if body.is_some() {
        header_lines.push_str("Content-Type: application/json\r\n");
    }

    let request = format!(
        "{} {} HTTP/1.1\r\nHost: localhost:{}\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        method,
        path,
        port,
        header_lines,
        payload.len(),
        payload
    );
    stream.write_all(request.as_bytes()).expect("failed to write");

    let mut response = String::new();
    let _ = stream.read_to_string(&mut response);
    parse_http_response(&response)
}

fn json_of(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|e| panic!("invalid JSON ({}): {}", e, body))
}

/// Parse an HTTP response into (status_code, body).
fn parse_http_response(response: &str) -> (u16, String) {
    let (headers, body) = response.split_once("\r\n\r\n").unwrap_or((response, ""));
    let status = headers
        .lines()
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(0);

    let chunked = headers
        .to_ascii_lowercase()
        .contains("transfer-encoding: chunked");
    let body = if chunked {
        decode_chunked(body)
    } else {
        body.to_string()
    };
    (status, body)
}

/// Decode chunked transfer encoding.
fn decode_chunked(data: &str) -> String {
    let mut result = String::new();
    let mut remaining = data;

    while let Some(line_end) = remaining.find("\r\n") {
        let size = match usize::from_str_radix(remaining[..line_end].trim(), 16) {
            Ok(s) => s,
            Err(_) => break,
        };
        if size == 0 {
            break;
        }
        let chunk_start = line_end + 2;
        let chunk_end = (chunk_start + size).min(remaining.len());
        result.push_str(&remaining[chunk_start..chunk_end]);
        remaining = remaining.get(chunk_end + 2..).unwrap_or("");
    }
    result
}

fn selections() -> Value {
    let entry = |deliverable: &str, option: &str, baseline: &str| {
        json!({
            "deliverable_id": deliverable,
            "option_id": option,
            "baseline": {
                "baseline_percent": baseline,
                "source": "2024 annual report",
                "measured_on": "2025-03-31"
            }
        })
    };
    json!([
        entry("full-d1", "full-d1-o1", "93.7"),
        entry("full-d2", "full-d2-o1", "51"),
        entry("full-d3", "full-d3-o2", "0"),
    ])
}

fn signature() -> Value {
    json!({
        "signatory_name": "Ada Lovelace",
        "signatory_title": "Executive Director",
        "signature": "/s/ Ada Lovelace",
        "signed_on": "2025-05-01"
    })
}

// ──────────────────────────────────────────────
// Health and routing
// ──────────────────────────────────────────────

#[test]
fn health_returns_200_with_version() {
    let server = start_server(&[], &[]);
    let (status, body) = http(server.port, "GET", "/health", &[], None);
    assert_eq!(status, 200);
    let json = json_of(&body);
    assert_eq!(json["status"], "ok");
    assert!(json.get("version").is_some());
}

#[test]
fn unknown_route_is_json_404() {
    let server = start_server(&[], &[]);
    let (status, body) = http(server.port, "GET", "/nope", PARTNER, None);
    assert_eq!(status, 404);
    assert_eq!(json_of(&body)["error"], "not_found");
}

#[test]
fn catalog_lists_seeded_deliverables() {
    let server = start_server(&[], &[]);
    let (status, body) = http(server.port, "GET", "/catalog/full", PARTNER, None);
    assert_eq!(status, 200);
    let json = json_of(&body);
    let ids: Vec<&str> = json["deliverables"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["full-d1", "full-d2", "full-d3"]);

    let (status, body) = http(server.port, "GET", "/catalog/observer", PARTNER, None);
    assert_eq!(status, 404);
    assert_eq!(json_of(&body)["details"]["unsupported"], true);
}

// ──────────────────────────────────────────────
// Partner flow
// ──────────────────────────────────────────────

#[test]
fn full_agreement_flow_over_http() {
    let server = start_server(&[], &[]);
    let port = server.port;

    let (status, _) = http(port, "POST", "/partners/p-full/read", PARTNER, None);
    assert_eq!(status, 200);
    let (status, body) = http(port, "POST", "/partners/p-full/sign", PARTNER, None);
    assert_eq!(status, 200);
    assert_eq!(json_of(&body)["has_signed"], true);

    let (status, body) = http(
        port,
        "POST",
        "/partners/p-full/configuration/finalize",
        PARTNER,
        None,
    );
    assert_eq!(status, 409);
    assert_eq!(
        json_of(&body)["details"]["missing_deliverables"],
        json!(["full-d1", "full-d2", "full-d3"])
    );

    let (status, body) = http(
        port,
        "PUT",
        "/partners/p-full/selections",
        PARTNER,
        Some(&selections()),
    );
    assert_eq!(status, 200, "{}", body);
    assert_eq!(json_of(&body)[0]["option_target"]["target"], "95");

    let (status, body) = http(
        port,
        "POST",
        "/partners/p-full/configuration/finalize",
        PARTNER,
        None,
    );
    assert_eq!(status, 200);
    assert_eq!(json_of(&body)["state"], "configured");

    let (status, body) = http(
        port,
        "POST",
        "/partners/p-full/submit",
        PARTNER,
        Some(&signature()),
    );
    assert_eq!(status, 200, "{}", body);
    assert_eq!(json_of(&body)["state"], "submitted");

    let (status, body) = http(
        port,
        "POST",
        "/partners/p-full/reconfiguration",
        PARTNER,
        Some(&json!({ "reason": "baseline was corrected" })),
    );
    assert_eq!(status, 201);
    let request_id = json_of(&body)["id"].as_str().unwrap().to_string();

    let (status, body) = http(
        port,
        "POST",
        "/partners/p-full/reconfiguration",
        PARTNER,
        Some(&json!({ "reason": "again" })),
    );
    assert_eq!(status, 409);
    assert_eq!(json_of(&body)["error"], "duplicate_request");

    let own = format!("/reconfiguration/{}", request_id);
    let (status, body) = http(port, "GET", &own, PARTNER, None);
    assert_eq!(status, 200);
    assert_eq!(json_of(&body)["partner_id"], "p-full");

    // Another partner cannot tell this id from one that never existed.
    let other: &[(&str, &str)] = &[("X-Pact-Subject", "p-partial"), ("X-Pact-Role", "partner")];
    let (status, foreign) = http(port, "GET", &own, other, None);
    assert_eq!(status, 404);
    assert_eq!(json_of(&foreign)["error"], "not_found");
    let (status, unknown) = http(port, "GET", "/reconfiguration/no-such-request", other, None);
    assert_eq!(status, 404);
    assert_eq!(json_of(&unknown)["error"], json_of(&foreign)["error"]);

    let approve = format!("/reconfiguration/{}/approve", request_id);
    let (status, _) = http(port, "POST", &approve, PARTNER, None);
    assert_eq!(status, 403);

    let (status, body) = http(port, "GET", "/reconfiguration", ADMIN, None);
    assert_eq!(status, 200);
    assert_eq!(json_of(&body).as_array().unwrap().len(), 1);

    let (status, body) = http(port, "POST", &approve, ADMIN, None);
    assert_eq!(status, 200);
    assert_eq!(json_of(&body)["status"], "approved");

    let (_, body) = http(port, "GET", "/partners/p-full/status", PARTNER, None);
    assert_eq!(json_of(&body)["state"], "configuring");
    let (_, body) = http(port, "GET", "/partners/p-full/selections", PARTNER, None);
    assert_eq!(json_of(&body).as_array().unwrap().len(), 3);
}

#[test]
fn invalid_selections_return_every_violation() {
    let server = start_server(&[], &[]);
    let port = server.port;
    http(port, "POST", "/partners/p-full/read", PARTNER, None);
    http(port, "POST", "/partners/p-full/sign", PARTNER, None);

    let mut payload = selections();
    payload[0]["option_id"] = json!("full-d2-o1");
    payload[2]["baseline"]["measured_on"] = json!("31/03/2025");

    let (status, body) = http(
        port,
        "PUT",
        "/partners/p-full/selections",
        PARTNER,
        Some(&payload),
    );
    assert_eq!(status, 422);
    let json = json_of(&body);
    assert_eq!(json["error"], "validation");
    let failing: Vec<&str> = json["details"]["violations"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v["deliverable_id"].as_str())
        .collect();
    assert!(failing.contains(&"full-d1"));
    assert!(failing.contains(&"full-d3"));

    let (_, body) = http(port, "GET", "/partners/p-full/selections", PARTNER, None);
    assert_eq!(json_of(&body), json!([]));
}

#[test]
fn signing_before_reading_conflicts() {
    let server = start_server(&[], &[]);
    let headers = &[("X-Pact-Subject", "p-partial")];
    let (status, body) = http(server.port, "POST", "/partners/p-partial/sign", headers, None);
    assert_eq!(status, 409);
    assert_eq!(json_of(&body)["error"], "state_conflict");
}

// ──────────────────────────────────────────────
// Identity and authorization
// ──────────────────────────────────────────────

#[test]
fn missing_identity_is_401() {
    let server = start_server(&[], &[]);
    let (status, _) = http(server.port, "GET", "/partners/p-full/status", &[], None);
    assert_eq!(status, 401);
}

#[test]
fn partner_cannot_act_for_another_partner() {
    let server = start_server(&[], &[]);
    let (status, body) = http(server.port, "POST", "/partners/p-partial/read", PARTNER, None);
    assert_eq!(status, 403);
    assert_eq!(json_of(&body)["error"], "permission");
}

#[test]
fn admin_only_routes_refuse_partners() {
    let server = start_server(&[], &[]);
    let (status, _) = http(
        server.port,
        "POST",
        "/partners",
        PARTNER,
        Some(&json!({ "id": "p-new", "contract_type": "full" })),
    );
    assert_eq!(status, 403);

    let (status, body) = http(
        server.port,
        "POST",
        "/partners",
        ADMIN,
        Some(&json!({ "id": "p-new", "contract_type": "full" })),
    );
    assert_eq!(status, 201);
    assert_eq!(json_of(&body)["state"], "unread");
}

#[test]
fn api_key_required_when_configured() {
    let server = start_server(&[], &[("PACT_API_KEY", "s3cret")]);
    let port = server.port;

    let (status, _) = http(port, "GET", "/health", &[], None);
    assert_eq!(status, 200);

    let (status, _) = http(port, "GET", "/catalog/full", PARTNER, None);
    assert_eq!(status, 401);

    let wrong = partner_with(("X-API-Key", "nope"));
    let (status, _) = http(port, "GET", "/catalog/full", &wrong, None);
    assert_eq!(status, 403);

    let bearer = partner_with(("Authorization", "Bearer s3cret"));
    let (status, _) = http(port, "GET", "/catalog/full", &bearer, None);
    assert_eq!(status, 200);
}

#[test]
fn rate_limit_returns_429() {
    let server = start_server(&["--rate-limit", "2"], &[]);
    let port = server.port;
    assert_eq!(http(port, "GET", "/health", &[], None).0, 200);
    assert_eq!(http(port, "GET", "/health", &[], None).0, 200);
    let (status, body) = http(port, "GET", "/health", &[], None);
    assert_eq!(status, 429);
    assert!(json_of(&body)["retry_after"].as_u64().unwrap() >= 1);
}

// ──────────────────────────────────────────────
// Indicators
// ──────────────────────────────────────────────

#[test]
fn evaluate_indicator_examples() {
    let server = start_server(&[], &[]);
    let port = server.port;
    let evaluate = |indicator: &str, baseline: &str| {
        let (status, body) = http(
            port,
            "POST",
            &format!("/indicators/{}/evaluate", indicator),
            PARTNER,
            Some(&json!({ "baseline": baseline })),
        );
        assert_eq!(status, 200, "{}", body);
        json_of(&body)["target"].as_str().unwrap().to_string()
    };

    assert_eq!(evaluate("completion-rate", "93.7"), "95");
    assert_eq!(evaluate("completion-rate", "93.6"), "94.9");
    assert_eq!(evaluate("completion-rate", "96"), "96");
    assert_eq!(evaluate("wait-share", "51"), "46");
    assert_eq!(evaluate("wait-share", "60"), "55");
    assert_eq!(evaluate("wait-share", "40"), "40");
}

#[test]
fn rule_gap_detail_is_hidden_from_partners() {
    let server = start_server(&[], &[]);
    let body = json!({ "baseline": "94.1" });

    let (status, partner_body) = http(
        server.port,
        "POST",
        "/indicators/completion-rate/evaluate",
        PARTNER,
        Some(&body),
    );
    assert_eq!(status, 500);
    let partner_json = json_of(&partner_body);
    assert_eq!(partner_json["error"], "no_matching_rule");
    assert!(!partner_json["message"].as_str().unwrap().contains("94.1"));

    let (status, admin_body) = http(
        server.port,
        "POST",
        "/indicators/completion-rate/evaluate",
        ADMIN,
        Some(&body),
    );
    assert_eq!(status, 500);
    assert!(json_of(&admin_body)["message"]
        .as_str()
        .unwrap()
        .contains("94.1"));
}

#[test]
fn patched_rules_close_the_gap() {
    let server = start_server(&[], &[]);
    let rules = json!([
        {
            "condition": { "comparison": "less_than", "threshold": "93.7" },
            "outcome": { "kind": "increase_by", "amount": "1.3" },
            "description": { "primary": "below", "secondary": "sous" }
        },
        {
            "condition": { "comparison": "less_than", "threshold": "95" },
            "outcome": { "kind": "increase_to", "amount": "95" },
            "description": { "primary": "between", "secondary": "entre" }
        },
        {
            "condition": { "comparison": "greater_or_equal", "threshold": "95" },
            "outcome": { "kind": "maintain" },
            "description": { "primary": "above", "secondary": "au-dessus" }
        }
    ]);

    let (status, _) = http(
        server.port,
        "PUT",
        "/indicators/completion-rate/rules",
        PARTNER,
        Some(&rules),
    );
    assert_eq!(status, 403);

    let (status, body) = http(
        server.port,
        "PUT",
        "/indicators/completion-rate/rules",
        ADMIN,
        Some(&rules),
    );
    assert_eq!(status, 200, "{}", body);
    assert_eq!(json_of(&body)["version"], 1);

    let (status, body) = http(
        server.port,
        "POST",
        "/indicators/completion-rate/evaluate",
        PARTNER,
        Some(&json!({ "baseline": "94.1" })),
    );
    assert_eq!(status, 200);
    assert_eq!(json_of(&body)["target"], "95");
}
