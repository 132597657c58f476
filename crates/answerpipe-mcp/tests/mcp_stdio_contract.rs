use axum::{
    http::{header, StatusCode},
    routing::post,
    Router,
};
use rmcp::{
    model::{CallToolRequestParam, GetPromptRequestParam, ReadResourceRequestParam},
    service::{RoleClient, RunningService, ServiceExt},
    transport::{ConfigureCommandExt, TokioChildProcess},
};
use std::collections::BTreeSet;
use std::net::SocketAddr;

const PARIS: &str = r#"{"id":"resp_paris","model":"gpt-5-mini-2025-08-07","reasoning":{"effort":"medium"},"output":[{"type":"message","content":[{"type":"output_text","text":"Paris"}]}]}"#;
const UNAUTHORIZED: &str = r#"{"error":{"message":"Incorrect API key provided"}}"#;

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn fixture() -> Router {
    Router::new().route(
        "/v1/responses",
        post(|raw: String| async move {
            let v: serde_json::Value =
                serde_json::from_str(&raw).unwrap_or(serde_json::Value::Null);
            let (status, body) = if v["input"].as_str().unwrap_or("").contains("unauthorized") {
                (StatusCode::UNAUTHORIZED, UNAUTHORIZED)
            } else {
                (StatusCode::OK, PARIS)
            };
            (status, [(header::CONTENT_TYPE, "application/json")], body)
        }),
    )
}

async fn call(
    service: &RunningService<RoleClient, ()>,
    name: &'static str,
    args: serde_json::Value,
) -> serde_json::Value {
    let r = service
        .call_tool(CallToolRequestParam {
            name: name.to_string().into(),
            arguments: Some(args.as_object().cloned().unwrap()),
        })
        .await
        .expect("call_tool");
    if let Some(v) = r.structured_content.clone() {
        return v;
    }
    for c in &r.content {
        if let Some(t) = c.as_text() {
            if let Ok(v) = serde_json::from_str::<serde_json::Value>(&t.text) {
                return v;
            }
        }
    }
    serde_json::json!({})
}

#[test]
fn gpt_websearch_over_stdio() {
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
    rt.block_on(async {
        let addr = serve(fixture()).await;

        let bin = assert_cmd::cargo::cargo_bin!("answerpipe");
        let service = ()
            .serve(TokioChildProcess::new(
                tokio::process::Command::new(bin).configure(|cmd| {
                    cmd.args(["mcp-stdio"]);
                    cmd.env("ANSWERPIPE_DOTENV", "0");
                    cmd.env_remove("ANSWERPIPE_ENV_FILE");
                    cmd.env_remove("OPENAI_API_KEY");
                    cmd.env("ANSWERPIPE_OPENAI_API_KEY", "sk-test");
                    cmd.env(
                        "ANSWERPIPE_OPENAI_ENDPOINT",
                        format!("http://{addr}/v1/responses"),
                    );
                }),
            )?)
            .await?;

        let tools = service.list_tools(Default::default()).await?;
        let names: BTreeSet<String> = tools
            .tools
            .iter()
            .map(|t| t.name.clone().into_owned())
            .collect();
        assert!(names.contains("gpt_websearch"), "tools={names:?}");
        assert!(names.contains("answerpipe_meta"), "tools={names:?}");

        let v = call(
            &service,
            "gpt_websearch",
            serde_json::json!({ "query": "What is the capital of France?" }),
        )
        .await;
        assert_eq!(v["success"].as_bool(), Some(true), "{v}");
        assert_eq!(v["answer"].as_str(), Some("Paris"));
        assert_eq!(v["id"].as_str(), Some("resp_paris"));
        assert_eq!(v["web_search_mode"].as_str(), Some("auto"));
        assert_eq!(v["web_search_used"].as_bool(), Some(false));
        assert_eq!(v["kind"].as_str(), Some("gpt_websearch"));
        assert_eq!(v["schema_version"].as_u64(), Some(1));
        assert!(v.get("elapsed_ms").is_some());

        let v = call(
            &service,
            "gpt_websearch",
            serde_json::json!({ "query": "What is the capital of France?", "web_search": true }),
        )
        .await;
        assert_eq!(v["web_search_mode"].as_str(), Some("always"));
        assert_eq!(v["web_search_used"].as_bool(), Some(true));

        let v = call(&service, "gpt_websearch", serde_json::json!({})).await;
        assert_eq!(v["success"].as_bool(), Some(false));
        assert_eq!(
            v["error"].as_str(),
            Some("Please provide a query to search for")
        );
        assert_eq!(v["error_info"]["code"].as_str(), Some("invalid_params"));

        let v = call(
            &service,
            "gpt_websearch",
            serde_json::json!({ "query": "q", "web_search": "sometimes" }),
        )
        .await;
        assert_eq!(v["success"].as_bool(), Some(false));
        assert!(v["error"]
            .as_str()
            .unwrap_or("")
            .starts_with("Invalid web_search mode: sometimes"));

        // Wrong JSON types are treated as absent instead of failing the call.
        let v = call(&service, "gpt_websearch", serde_json::json!({ "query": 42 })).await;
        assert_eq!(v["success"].as_bool(), Some(false));
        assert_eq!(
            v["error"].as_str(),
            Some("Please provide a query to search for")
        );

        let v = call(
            &service,
            "gpt_websearch",
            serde_json::json!({
                "query": "What is the capital of France?",
                "reasoning_effort": 5,
                "web_search": 3,
            }),
        )
        .await;
        assert_eq!(v["success"].as_bool(), Some(true));
        assert_eq!(v["requested_effort"].as_str(), Some("medium"));
        assert_eq!(v["web_search_mode"].as_str(), Some("auto"));

        let v = call(
            &service,
            "gpt_websearch",
            serde_json::json!({ "query": "unauthorized request" }),
        )
        .await;
        assert_eq!(v["success"].as_bool(), Some(false));
        assert_eq!(v["status"].as_u64(), Some(401));
        assert_eq!(v["body"].as_str(), Some(UNAUTHORIZED));
        assert_eq!(v["error_info"]["code"].as_str(), Some("remote_error"));
        assert_eq!(v["error_info"]["retryable"].as_bool(), Some(false));

        let meta = call(&service, "answerpipe_meta", serde_json::json!({})).await;
        assert_eq!(meta["name"].as_str(), Some("answerpipe"));
        assert_eq!(meta["configured"]["openai_api_key"].as_bool(), Some(true));
        assert!(!meta.to_string().contains("sk-test"));

        let prompts: BTreeSet<String> = service
            .list_prompts(Default::default())
            .await?
            .prompts
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert!(prompts.contains("web_search"), "{prompts:?}");
        assert!(prompts.contains("gpt_websearch_guide"), "{prompts:?}");

        let mut topic = serde_json::Map::new();
        topic.insert("topic".into(), serde_json::json!("rust editions"));
        let prompt = service
            .get_prompt(GetPromptRequestParam {
                name: "web_search".into(),
                arguments: Some(topic),
            })
            .await?;
        let msg = serde_json::to_value(&prompt.messages[0])?;
        assert_eq!(msg["content"]["text"], "Search the web for: rust editions");

        let info = service
            .read_resource(ReadResourceRequestParam {
                uri: "server-info".into(),
            })
            .await?;
        let text = serde_json::to_value(&info.contents[0])?;
        assert!(text["text"]
            .as_str()
            .unwrap_or("")
            .contains(&format!("Endpoint: http://{addr}/v1/responses")));

        service.cancel().await?;
        Ok::<(), Box<dyn std::error::Error>>(())
    })
    .expect("mcp stdio contract");
}

#[test]
fn gpt_websearch_without_key_is_not_configured() {
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
    rt.block_on(async {
        let bin = assert_cmd::cargo::cargo_bin!("answerpipe");
        let service = ()
            .serve(TokioChildProcess::new(
                tokio::process::Command::new(bin).configure(|cmd| {
                    cmd.args(["mcp-stdio"]);
                    cmd.env("ANSWERPIPE_DOTENV", "0");
                    cmd.env_remove("ANSWERPIPE_ENV_FILE");
                    cmd.env_remove("ANSWERPIPE_OPENAI_API_KEY");
                    cmd.env_remove("OPENAI_API_KEY");
                }),
            )?)
            .await?;

        let v = call(
            &service,
            "gpt_websearch",
            serde_json::json!({ "query": "What is the capital of France?" }),
        )
        .await;
        assert_eq!(v["success"].as_bool(), Some(false));
        assert_eq!(v["error_info"]["code"].as_str(), Some("not_configured"));
        assert!(v["error_info"]["hint"]
            .as_str()
            .unwrap_or("")
            .contains("ANSWERPIPE_OPENAI_API_KEY"));

        service.cancel().await?;
        Ok::<(), Box<dyn std::error::Error>>(())
    })
    .expect("mcp not configured contract");
}
