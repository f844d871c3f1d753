//! Demo HTTP host for the rewrite engine.
//!
//! Compiles the registry's pattern table with `regex`, matches each
//! incoming path against it, seeds an in-memory query from the matched
//! rule's query spec, runs the dispatch lifecycle, and maps the outcome
//! onto an HTTP response. Decoration results ride along as `x-page-*`
//! headers so they stay visible from curl.
//!
//! A built-in rule set makes the binary useful out of the box; `--rules`
//! layers a TOML rule file on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Router;
use clap::Parser;
use regex::{Captures, Regex};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rewrite_engine::config;
use rewrite_engine::dispatch::StatusReply;
use rewrite_engine::host::memory::{MemoryQuery, MemoryRequest};
use rewrite_engine::host::{HostEnv, HostProps};
use rewrite_engine::rule::query_spec;
use rewrite_engine::{
    add_rewrite_rule, dispatch_with_page, AccessPolicy, DispatchOutcome, Flow, PageState,
    RuleOptions, RuleRegistry,
};

#[derive(Parser)]
#[command(name = "rewrite-host")]
#[command(about = "Demo HTTP host for the rewrite engine", long_about = None)]
struct Cli {
    /// Address to serve on.
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    bind: String,

    /// TOML rule file loaded on top of the built-in rules.
    #[arg(short, long)]
    rules: Option<PathBuf>,

    /// Directory for relative template lookups.
    #[arg(short, long, default_value = "templates")]
    templates: PathBuf,

    /// Identity to treat as the logged-in user.
    #[arg(short, long)]
    user: Option<String>,

    /// Prometheus exposition address; metrics stay off without it.
    #[arg(short, long)]
    metrics_address: Option<String>,
}

/// Environment capabilities the demo hands to the engine.
#[derive(Debug, Clone)]
struct DemoEnv {
    user: Option<String>,
    site_root: String,
    templates: PathBuf,
}

impl HostEnv for DemoEnv {
    fn current_user(&self) -> Option<String> {
        self.user.clone()
    }

    fn site_root(&self) -> String {
        self.site_root.clone()
    }

    fn locate_template(&self, name: &str) -> Option<PathBuf> {
        let candidate = self.templates.join(name);
        candidate.is_file().then_some(candidate)
    }
}

/// One pattern-table entry with its compiled matcher.
struct CompiledEntry {
    regex: Regex,
    pattern: String,
    query_spec: String,
}

struct AppState {
    registry: RuleRegistry,
    table: Vec<CompiledEntry>,
    env: DemoEnv,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rewrite_engine=debug,rewrite_host=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    tracing::info!("rewrite-host v0.1.0 starting");

    let mut registry = RuleRegistry::new();
    builtin_rules(&mut registry)?;

    if let Some(path) = &cli.rules {
        let file = config::load_rules(path)?;
        let ids = file.register_all(&mut registry)?;
        tracing::info!(file = %path.display(), rules = ids.len(), "Rule file loaded");
    }

    let table = compile_table(&registry);
    tracing::info!(rules = registry.len(), compiled = table.len(), "Pattern table ready");

    if let Some(raw) = &cli.metrics_address {
        if let Ok(addr) = raw.parse() {
            rewrite_engine::observability::metrics::init_metrics(addr);
        } else {
            tracing::error!(metrics_address = %raw, "Failed to parse metrics address");
        }
    }

    let env = DemoEnv {
        user: cli.user.clone(),
        site_root: "/".to_owned(),
        templates: cli.templates.clone(),
    };
    let state = Arc::new(AppState {
        registry,
        table,
        env,
    });

    let app = Router::new()
        .fallback(handle)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&cli.bind).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Rules the host ships with, exercising each lifecycle path.
fn builtin_rules(registry: &mut RuleRegistry) -> Result<(), rewrite_engine::RewriteError> {
    // Decorated section page rendered by the host default.
    add_rewrite_rule(
        registry,
        RuleOptions::new("^people/?$")
            .with_id("people-index")
            .with_query("section=people")
            .with_body_class("people")
            .on_title(|title, sep| format!("{title} {sep} People")),
    )?;

    // Profile page fed by a capture group.
    add_rewrite_rule(
        registry,
        RuleOptions::new("^people/([^/]+)/?$")
            .with_id("person")
            .with_query("section=people&author_name=$1")
            .with_body_class("person-profile")
            .on_title(|title, sep| format!("{title} {sep} Profile")),
    )?;

    // Login page for visitors; signed-in users get redirected away.
    add_rewrite_rule(
        registry,
        RuleOptions::new("^login/?$")
            .with_id("login")
            .with_query("section=login")
            .with_access_rule(AccessPolicy::LoggedOutOnly)
            .with_template("login.html"),
    )?;

    // Account page for signed-in users, canonical rewriting off.
    add_rewrite_rule(
        registry,
        RuleOptions::new("^account/?$")
            .with_id("account")
            .with_query("section=account")
            .with_access_rule(AccessPolicy::LoggedInOnly)
            .with_disabled_canonical(),
    )?;

    // JSON ping handled entirely by its request callback.
    add_rewrite_rule(
        registry,
        RuleOptions::new("^api/ping/?$")
            .with_id("api-ping")
            .with_query("section=api")
            .with_request_methods(["GET"])
            .on_request(|request, _| {
                request.set_prop(
                    "payload",
                    json!({"status": "success", "message": "pong"}),
                );
                Flow::Bail
            }),
    )?;

    Ok(())
}

fn compile_table(registry: &RuleRegistry) -> Vec<CompiledEntry> {
    let mut table = Vec::new();
    for (pattern, query_spec) in registry.pattern_table(&[]) {
        match Regex::new(&pattern) {
            Ok(regex) => table.push(CompiledEntry {
                regex,
                pattern,
                query_spec,
            }),
            Err(error) => {
                tracing::warn!(%error, pattern = %pattern, "Skipping uncompilable pattern");
            }
        }
    }
    table
}

async fn handle(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let path = uri.path().trim_start_matches('/');

    // 1. Consult the pattern table, first match wins.
    let Some((entry, caps)) = state
        .table
        .iter()
        .find_map(|entry| entry.regex.captures(path).map(|caps| (entry, caps)))
    else {
        return (StatusCode::NOT_FOUND, "no rule matched\n").into_response();
    };

    // 2. Assemble the host objects the engine works against.
    let mut request = MemoryRequest::new(method.as_str());
    for (name, value) in params {
        request = request.with_param(name, value);
    }
    let mut query = seed_query(&entry.query_spec, &caps);
    let page = PageState {
        title: "Rewrite Host".to_owned(),
        title_separator: "|".to_owned(),
        body_classes: vec!["rewrite-host".to_owned()],
        canonical_redirect: canonical_target(path),
        ..PageState::default()
    };

    // 3. Run the lifecycle and apply the outcome.
    let report = dispatch_with_page(
        &state.registry,
        &entry.pattern,
        &mut request,
        &mut query,
        &state.env,
        page,
    );
    tracing::info!(
        method = %method,
        path,
        outcome = report.outcome.metric_label(),
        "Request dispatched"
    );

    match report.outcome {
        DispatchOutcome::Unmatched => (StatusCode::NOT_FOUND, "no rule matched\n").into_response(),
        DispatchOutcome::MethodNotAllowed { reply } => status_reply_response(&reply),
        DispatchOutcome::Bailed => match request.prop("payload") {
            Some(payload) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                payload.to_string(),
            )
                .into_response(),
            None => StatusCode::NO_CONTENT.into_response(),
        },
        DispatchOutcome::Redirect { location } => Redirect::temporary(&location).into_response(),
        DispatchOutcome::Render { template } => render_template(&template, &report.page).await,
        DispatchOutcome::RenderNotFound => (StatusCode::NOT_FOUND, "not found\n").into_response(),
        DispatchOutcome::Continue => default_render(&report.page),
    }
}

/// Turn the matched rule's query spec into host query properties,
/// substituting `$1`-style capture references.
fn seed_query(query_spec: &str, caps: &Captures<'_>) -> MemoryQuery {
    let mut query = MemoryQuery::new();
    for (name, value) in query_spec::parse_pairs(query_spec) {
        let mut expanded = String::new();
        caps.expand(&value, &mut expanded);
        query.set_prop(&name, Value::String(expanded));
    }
    query
}

/// The host's own canonicalization: trailing-slash normalization.
fn canonical_target(path: &str) -> Option<String> {
    (!path.is_empty() && !path.ends_with('/')).then(|| format!("/{path}/"))
}

fn status_reply_response(reply: &StatusReply) -> Response {
    let status =
        StatusCode::from_u16(reply.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = serde_json::to_string(reply).unwrap_or_default();
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response()
}

async fn render_template(template: &Path, page: &PageState) -> Response {
    match tokio::fs::read_to_string(template).await {
        Ok(content) => with_page_headers(Html(content).into_response(), page),
        Err(error) => {
            tracing::error!(%error, template = %template.display(), "Template read failed");
            (StatusCode::NOT_FOUND, "not found\n").into_response()
        }
    }
}

/// Stand-in for the host's own page render.
fn default_render(page: &PageState) -> Response {
    let body = format!(
        "<!doctype html><html><head><title>{}</title></head><body class=\"{}\"><h1>{}</h1></body></html>\n",
        page.title,
        page.body_classes.join(" "),
        page.title,
    );
    with_page_headers(Html(body).into_response(), page)
}

/// Surface decoration results as response headers.
fn with_page_headers(mut response: Response, page: &PageState) -> Response {
    let headers = response.headers_mut();
    if let Ok(value) = header::HeaderValue::from_str(&page.title) {
        headers.insert("x-page-title", value);
    }
    if let Ok(value) = header::HeaderValue::from_str(&page.body_classes.join(" ")) {
        headers.insert("x-body-classes", value);
    }
    if let Some(target) = &page.canonical_redirect {
        if let Ok(value) = header::HeaderValue::from_str(target) {
            headers.insert("x-canonical-redirect", value);
        }
    }
    response
}
