//! End-to-end tests against the demo host binary.

use std::process::{Child, Command};
use std::time::Duration;

/// Kills the spawned host when the test ends, pass or fail.
struct HostProcess(Child);

impl Drop for HostProcess {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

async fn spawn_host(addr: &str, extra_args: &[&str]) -> HostProcess {
    let templates = std::env::temp_dir().join(format!("rewrite-host-{}", addr.replace(':', "-")));
    std::fs::create_dir_all(&templates).unwrap();
    std::fs::write(templates.join("login.html"), "<h1>Sign in</h1>\n").unwrap();

    let mut command = Command::new(env!("CARGO_BIN_EXE_rewrite-host"));
    command
        .arg("--bind")
        .arg(addr)
        .arg("--templates")
        .arg(&templates)
        .args(extra_args);
    let host = HostProcess(command.spawn().expect("Host binary failed to start"));

    for _ in 0..50 {
        if tokio::net::TcpStream::connect(addr).await.is_ok() {
            return host;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("Host at {addr} never came up");
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .unwrap()
}

#[tokio::test]
async fn anonymous_visitors_walk_the_builtin_rules() {
    let addr = "127.0.0.1:28481";
    let _host = spawn_host(addr, &[]).await;
    let client = client();

    // Decorated section page.
    let res = client
        .get(format!("http://{addr}/people"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(
        res.headers()["x-page-title"].to_str().unwrap(),
        "Rewrite Host | People"
    );
    assert_eq!(
        res.headers()["x-body-classes"].to_str().unwrap(),
        "rewrite-host people"
    );
    assert_eq!(
        res.headers()["x-canonical-redirect"].to_str().unwrap(),
        "/people/"
    );

    // Wrong method gets the JSON rejection.
    let res = client
        .post(format!("http://{addr}/api/ping"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(
        body,
        serde_json::json!({"status": "error", "message": "Invalid request method"})
    );

    // The ping callback bails with its own payload.
    let res = client
        .get(format!("http://{addr}/api/ping"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["message"], "pong");

    // The login template renders for visitors.
    let res = client
        .get(format!("http://{addr}/login"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.text().await.unwrap().contains("Sign in"));

    // The members-only page turns the visitor away.
    let res = client
        .get(format!("http://{addr}/account"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 307);
    assert_eq!(res.headers()["location"].to_str().unwrap(), "/");

    let res = client
        .get(format!("http://{addr}/account?redirect_to=%2Fwelcome"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 307);
    assert_eq!(res.headers()["location"].to_str().unwrap(), "/welcome");

    // Unknown paths never reach the engine.
    let res = client
        .get(format!("http://{addr}/nope"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
}

#[tokio::test]
async fn signed_in_users_see_the_other_side_of_the_access_rules() {
    let addr = "127.0.0.1:28482";
    let _host = spawn_host(addr, &["--user", "alice"]).await;
    let client = client();

    // The login page now redirects away.
    let res = client
        .get(format!("http://{addr}/login"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 307);
    assert_eq!(res.headers()["location"].to_str().unwrap(), "/");

    // The account page renders, with its canonical redirect suppressed.
    let res = client
        .get(format!("http://{addr}/account"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers().get("x-canonical-redirect").is_none());

    // Other pages keep the host's canonical target.
    let res = client
        .get(format!("http://{addr}/people"))
        .send()
        .await
        .unwrap();
    assert_eq!(
        res.headers()["x-canonical-redirect"].to_str().unwrap(),
        "/people/"
    );
}

#[tokio::test]
async fn rule_files_extend_the_builtin_set() {
    let addr = "127.0.0.1:28483";
    let rules = std::env::temp_dir().join("rewrite-host-28483-rules.toml");
    std::fs::write(
        &rules,
        r#"
[[rules]]
regex = "^docs/([^/]+)/?$"
id = "doc-page"
query = "section=docs&doc=$1"

[[rules]]
regex = "^beta/?$"
id = "beta"
access_rule = "logged_in_only"
"#,
    )
    .unwrap();
    let _host = spawn_host(addr, &["--rules", rules.to_str().unwrap()]).await;
    let client = client();

    let res = client
        .get(format!("http://{addr}/docs/setup"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    let res = client
        .get(format!("http://{addr}/beta"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 307);
    assert_eq!(res.headers()["location"].to_str().unwrap(), "/");
}
