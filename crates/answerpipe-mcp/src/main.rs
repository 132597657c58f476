use anyhow::Result;
use answerpipe_core::search::NO_ANSWER;
use answerpipe_core::{
    Effort, Error as AnswerpipeError, SearchArgs, Searcher, Verbosity, WebSearchMode,
    DEFAULT_MODEL,
};
use answerpipe_openai::{
    api_key_from_env, endpoint_from_env, validate_endpoint, ResponsesClient, API_KEY_ENV,
    API_KEY_ENV_FALLBACK, ENDPOINT_ENV,
};
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

mod logging;
#[cfg(feature = "stdio")]
mod mcp;

const QUESTION_ENV: &str = "ANSWERPIPE_QUESTION";
const ENV_FILE_ENV: &str = "ANSWERPIPE_ENV_FILE";
const DOTENV_ENV: &str = "ANSWERPIPE_DOTENV";

/// Hard failure: configuration, transport, remote status, decode, bad arguments.
const EXIT_FAILURE: u8 = 2;
/// The call succeeded but the response carried no answer text.
const EXIT_NO_ANSWER: u8 = 3;

#[derive(Parser, Debug)]
#[command(name = "answerpipe")]
#[command(about = "Ask a GPT model with optional live web search (CLI + MCP server)", long_about = None)]
struct Cli {
    /// Debug logs on stderr (ANSWERPIPE_LOG / RUST_LOG take precedence).
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask one question and print the answer.
    Ask(AskCmd),
    /// Run as an MCP stdio server (for Cursor / MCP clients).
    #[cfg(feature = "stdio")]
    McpStdio(McpStdioCmd),
    /// Run as an MCP server over streamable HTTP (`/mcp`), with `/health`.
    #[cfg(feature = "http")]
    McpHttp(McpHttpCmd),
    /// Diagnose configuration/launch issues (json; no secrets).
    Doctor(DoctorCmd),
    /// Print version info.
    Version(VersionCmd),
}

#[derive(clap::Args, Debug)]
struct AskCmd {
    /// Question to ask. `--question` wins over this; both win over ANSWERPIPE_QUESTION.
    #[arg(value_name = "QUESTION")]
    question_pos: Option<String>,
    #[arg(short = 'q', long = "question")]
    question: Option<String>,
    /// Model name.
    #[arg(long, env = "ANSWERPIPE_MODEL", default_value = DEFAULT_MODEL)]
    model: String,
    /// Reasoning effort: minimal|low|medium|high (also picks the timeout).
    #[arg(long, env = "ANSWERPIPE_EFFORT", default_value = "medium")]
    effort: String,
    /// Answer verbosity: low|medium|high
    #[arg(long, env = "ANSWERPIPE_VERBOSITY", default_value = "medium")]
    verbosity: String,
    /// Web search: auto|always|never
    #[arg(long, env = "ANSWERPIPE_WEB_SEARCH", default_value = "auto")]
    web_search: String,
    /// Continue from an earlier response id.
    #[arg(long)]
    previous_response_id: Option<String>,
    /// Override the effort-derived timeout (ms).
    #[arg(long, env = "ANSWERPIPE_TIMEOUT_MS")]
    timeout_ms: Option<u64>,
    /// Print the raw JSON response body instead of the answer.
    #[arg(long, env = "ANSWERPIPE_SHOW_ALL")]
    show_all: bool,
    /// Output format: text|json
    #[arg(long = "output", alias = "format", default_value = "text")]
    output: String,
    /// Responses endpoint (default: ANSWERPIPE_OPENAI_ENDPOINT, else api.openai.com).
    #[arg(long)]
    endpoint: Option<String>,
}

#[cfg(feature = "stdio")]
#[derive(clap::Args, Debug)]
struct McpStdioCmd {
    /// Responses endpoint (default: ANSWERPIPE_OPENAI_ENDPOINT, else api.openai.com).
    #[arg(long)]
    endpoint: Option<String>,
    /// Override the effort-derived timeout (ms) for every tool call.
    #[arg(long, env = "ANSWERPIPE_TIMEOUT_MS")]
    timeout_ms: Option<u64>,
}

#[cfg(feature = "http")]
#[derive(clap::Args, Debug)]
struct McpHttpCmd {
    /// Listen address.
    #[arg(long, env = "ANSWERPIPE_MCP_BIND", default_value = "127.0.0.1:8080")]
    bind: String,
    /// Responses endpoint (default: ANSWERPIPE_OPENAI_ENDPOINT, else api.openai.com).
    #[arg(long)]
    endpoint: Option<String>,
    /// Override the effort-derived timeout (ms) for every tool call.
    #[arg(long, env = "ANSWERPIPE_TIMEOUT_MS")]
    timeout_ms: Option<u64>,
}

#[derive(clap::Args, Debug)]
struct DoctorCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
    /// Spawn a child `answerpipe mcp-stdio` and call `list_tools`. No search is performed.
    #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
    check_stdio: bool,
    /// Timeout for the stdio handshake (ms).
    #[arg(long, default_value_t = 3000)]
    timeout_ms: u64,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

/// Blank values count as unset.
pub(crate) fn env_nonempty(k: &str) -> Option<String> {
    std::env::var(k)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn nonblank(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Load `ANSWERPIPE_ENV_FILE` if set, else a `.env` from the working directory
/// upwards (unless `ANSWERPIPE_DOTENV=0`). Never overrides the process env.
/// Returns a warning to log once logging is up.
fn load_env_files() -> Option<String> {
    if let Some(p) = env_nonempty(ENV_FILE_ENV) {
        return dotenvy::from_path(&p)
            .err()
            .map(|e| format!("could not load {ENV_FILE_ENV}={p}: {e}"));
    }
    if env_nonempty(DOTENV_ENV).as_deref() == Some("0") {
        return None;
    }
    match dotenvy::dotenv() {
        Ok(_) => None,
        Err(e) if e.not_found() => None,
        Err(e) => Some(format!("could not load .env: {e}")),
    }
}

fn resolve_endpoint(flag: Option<&str>) -> Result<String, AnswerpipeError> {
    match flag.map(str::trim).filter(|s| !s.is_empty()) {
        Some(e) => validate_endpoint(e),
        None => endpoint_from_env(),
    }
}

fn build_client(endpoint_flag: Option<&str>) -> Result<ResponsesClient, AnswerpipeError> {
    ResponsesClient::from_env(answerpipe_openai::http_client()?, endpoint_flag)
}

fn report_error(e: &AnswerpipeError) -> ExitCode {
    eprintln!("{e}");
    if let Some(body) = e.raw_body() {
        eprintln!("raw={body}");
    }
    ExitCode::from(EXIT_FAILURE)
}

async fn run_ask(args: AskCmd, cancel: CancellationToken) -> Result<ExitCode> {
    let Some(question) = nonblank(args.question)
        .or_else(|| nonblank(args.question_pos))
        .or_else(|| env_nonempty(QUESTION_ENV))
    else {
        eprintln!("no question given: pass QUESTION, --question, or set {QUESTION_ENV}");
        return Ok(ExitCode::from(EXIT_FAILURE));
    };
    let json = args.output.trim().eq_ignore_ascii_case("json");

    let client = match build_client(args.endpoint.as_deref()) {
        Ok(c) => c,
        Err(e) => return Ok(report_error(&e)),
    };
    let searcher =
        Searcher::new(client).with_timeout_override(args.timeout_ms.map(Duration::from_millis));
    let search_args = SearchArgs {
        query: Some(question),
        model: Some(args.model),
        reasoning_effort: Some(args.effort),
        verbosity: Some(args.verbosity),
        previous_response_id: args.previous_response_id,
        web_search: Some(args.web_search),
    };

    if args.show_all {
        let plan = match searcher.plan(&search_args) {
            Ok(p) => p,
            Err(rejected) => {
                eprintln!("{}", rejected.error.unwrap_or_default());
                return Ok(ExitCode::from(EXIT_FAILURE));
            }
        };
        return Ok(
            match searcher.send_raw(&plan.request, plan.timeout, &cancel).await {
                Ok(body) => {
                    println!("{body}");
                    ExitCode::SUCCESS
                }
                Err(e) => report_error(&e),
            },
        );
    }

    let r = match searcher.run(search_args, &cancel).await {
        Ok(r) => r,
        Err(e) => return Ok(report_error(&e)),
    };
    if json {
        println!("{}", serde_json::to_string(&r)?);
    } else if let Some(answer) = r.answer.as_deref() {
        println!("{answer}");
    }
    if r.success {
        return Ok(ExitCode::SUCCESS);
    }
    match r.error.as_deref() {
        Some(NO_ANSWER) => {
            eprintln!("no output_text found in response");
            Ok(ExitCode::from(EXIT_NO_ANSWER))
        }
        other => {
            eprintln!("{}", other.unwrap_or("search failed"));
            Ok(ExitCode::from(EXIT_FAILURE))
        }
    }
}

async fn run_doctor(args: DoctorCmd) -> Result<()> {
    let t0 = std::time::Instant::now();
    let key_configured = api_key_from_env().is_some();
    let endpoint = resolve_endpoint(None);

    let mut checks: Vec<serde_json::Value> = Vec::new();

    checks.push(serde_json::json!({
        "name": "endpoint_valid",
        "ok": endpoint.is_ok(),
        "message": match &endpoint {
            Ok(_) => "endpoint is a valid http(s) URL".to_string(),
            Err(e) => e.to_string(),
        },
        "hint": if endpoint.is_ok() { "" } else { "Fix or unset ANSWERPIPE_OPENAI_ENDPOINT." },
    }));

    checks.push(serde_json::json!({
        "name": "api_key_configured",
        "ok": key_configured,
        "message": if key_configured { "API key is set" } else { "API key is missing" },
        "hint": if key_configured {
            String::new()
        } else {
            format!("Set {API_KEY_ENV} (or {API_KEY_ENV_FALLBACK}), or put it in a .env file / {ENV_FILE_ENV}.")
        },
    }));

    let mut stdio_ok: Option<bool> = None;
    let mut stdio_tool_count: Option<usize> = None;
    let mut stdio_error: Option<serde_json::Value> = None;
    let mut stdio_elapsed_ms: Option<u128> = None;

    #[cfg(feature = "stdio")]
    if args.check_stdio {
        use rmcp::service::ServiceExt;
        use rmcp::transport::{ConfigureCommandExt, TokioChildProcess};
        use tokio::process::Command;

        let exe = std::env::current_exe()
            .unwrap_or_else(|_| std::path::PathBuf::from("answerpipe"));
        let child = TokioChildProcess::new(Command::new(exe).configure(|cmd| {
            cmd.args(["mcp-stdio"]);
            // The handshake never searches; keep credentials out of the child.
            cmd.env_remove(API_KEY_ENV);
            cmd.env_remove(API_KEY_ENV_FALLBACK);
            cmd.env(DOTENV_ENV, "0");
            cmd.env_remove(ENV_FILE_ENV);
            cmd.env(logging::LOG_ENV, "error");
        }))?;

        let service = ().serve(child).await?;
        let check_t0 = std::time::Instant::now();
        let res = tokio::time::timeout(
            Duration::from_millis(args.timeout_ms),
            service.list_tools(Default::default()),
        )
        .await;
        stdio_elapsed_ms = Some(check_t0.elapsed().as_millis());

        match res {
            Ok(Ok(tools)) => {
                let has_search = tools.tools.iter().any(|t| t.name == "gpt_websearch");
                stdio_ok = Some(has_search);
                stdio_tool_count = Some(tools.tools.len());
                if !has_search {
                    stdio_error = Some(serde_json::json!({
                        "code": "tool_missing",
                        "message": "gpt_websearch is not listed",
                        "hint": "The binary on PATH may be a different program. Reinstall answerpipe."
                    }));
                }
            }
            Ok(Err(e)) => {
                stdio_ok = Some(false);
                stdio_error = Some(serde_json::json!({
                    "code": "handshake_failed",
                    "message": e.to_string(),
                    "hint": "The child closed the stdio transport early. Common causes: logs on stdout, wrong args (not mcp-stdio), or a crash on startup."
                }));
            }
            Err(_elapsed) => {
                stdio_ok = Some(false);
                stdio_error = Some(serde_json::json!({
                    "code": "timeout",
                    "message": format!("stdio handshake timed out after {}ms", args.timeout_ms),
                    "hint": "The child did not answer list_tools in time. Check for a stuck startup."
                }));
            }
        }

        let _ = service.cancel().await;
    }

    #[cfg(not(feature = "stdio"))]
    if args.check_stdio {
        stdio_ok = Some(false);
    }

    checks.push(serde_json::json!({
        "name": "mcp_stdio_handshake",
        "ok": if args.check_stdio { stdio_ok.unwrap_or(false) } else { true },
        "skipped": !args.check_stdio,
        "message": if !args.check_stdio {
            "stdio MCP handshake skipped"
        } else if stdio_ok.unwrap_or(false) {
            "stdio MCP handshake succeeded"
        } else {
            "stdio MCP handshake failed"
        },
        "tool_count": stdio_tool_count,
        "elapsed_ms": stdio_elapsed_ms,
        "error": stdio_error,
    }));

    let ok = checks.iter().all(|c| c["ok"].as_bool().unwrap_or(false));
    let efforts: Vec<serde_json::Value> = Effort::ALL
        .iter()
        .map(|e| serde_json::json!({ "effort": e.as_str(), "timeout_s": e.timeout().as_secs() }))
        .collect();
    let payload = serde_json::json!({
        "schema_version": 1,
        "kind": "doctor",
        "ok": ok,
        "name": "answerpipe",
        "version": env!("CARGO_PKG_VERSION"),
        "platform": {
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        },
        "features": {
            "stdio": cfg!(feature = "stdio"),
        },
        "elapsed_ms": t0.elapsed().as_millis(),
        "configured": {
            "openai_api_key": key_configured,
            "endpoint": endpoint.as_ref().ok(),
            "endpoint_overridden": env_nonempty(ENDPOINT_ENV).is_some(),
            "env_file": env_nonempty(ENV_FILE_ENV).is_some(),
        },
        "defaults": {
            "model": DEFAULT_MODEL,
            "effort": Effort::DEFAULT.as_str(),
            "verbosity": Verbosity::DEFAULT.as_str(),
            "web_search": WebSearchMode::Auto.as_str(),
        },
        "efforts": efforts,
        "checks": checks,
    });

    match args.output.to_ascii_lowercase().as_str() {
        "text" => {
            println!("answerpipe {} (ok={})", env!("CARGO_PKG_VERSION"), ok);
            println!(
                "endpoint: {}",
                payload["configured"]["endpoint"].as_str().unwrap_or("<invalid>")
            );
            println!("openai_api_key: {key_configured}");
            println!("checks:");
            for c in &checks {
                let name = c["name"].as_str().unwrap_or("?");
                if c["skipped"].as_bool().unwrap_or(false) {
                    println!("- {name}: skipped");
                } else if c["ok"].as_bool().unwrap_or(false) {
                    println!("- {name}: ok");
                } else {
                    println!("- {name}: fail");
                }
            }
        }
        _ => println!("{payload}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let env_warning = load_env_files();
    let cli = Cli::parse();
    logging::init(cli.verbose);
    if let Some(w) = env_warning {
        tracing::warn!(target: "answerpipe", "{w}");
    }

    // Ctrl-C cancels in-flight requests instead of killing the process mid-write.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Commands::Ask(args) => return run_ask(args, cancel).await,
        #[cfg(feature = "stdio")]
        Commands::McpStdio(args) => {
            let config = mcp::ServerConfig {
                endpoint: nonblank(args.endpoint),
                timeout_override: args.timeout_ms.map(Duration::from_millis),
            };
            tokio::select! {
                r = mcp::serve_stdio(config, cancel.clone()) => {
                    r.map_err(|e| anyhow::anyhow!(e.to_string()))?;
                }
                _ = cancel.cancelled() => {
                    tracing::info!(target: "answerpipe::mcp", "interrupted; shutting down");
                }
            }
        }
        #[cfg(feature = "http")]
        Commands::McpHttp(args) => {
            let config = mcp::ServerConfig {
                endpoint: nonblank(args.endpoint),
                timeout_override: args.timeout_ms.map(Duration::from_millis),
            };
            // Ctrl-C cancels `cancel`, which also drives the graceful shutdown.
            mcp::serve_http(&args.bind, config, cancel.clone())
                .await
                .map_err(|e| anyhow::anyhow!(e.to_string()))?;
        }
        Commands::Doctor(args) => run_doctor(args).await?,
        Commands::Version(args) => {
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "version",
                "ok": true,
                "name": "answerpipe",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!("answerpipe {}", env!("CARGO_PKG_VERSION")),
                _ => println!("{v}"),
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
