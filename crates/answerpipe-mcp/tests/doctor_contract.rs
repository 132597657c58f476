#[test]
fn answerpipe_doctor_contract_json_and_bool_flags() {
    let bin = assert_cmd::cargo::cargo_bin!("answerpipe");

    let out = std::process::Command::new(bin)
        .args(["doctor", "--check-stdio=false", "--timeout-ms", "1"])
        .env("ANSWERPIPE_DOTENV", "0")
        .env_remove("ANSWERPIPE_ENV_FILE")
        .env_remove("ANSWERPIPE_OPENAI_API_KEY")
        .env_remove("OPENAI_API_KEY")
        .env_remove("ANSWERPIPE_OPENAI_ENDPOINT")
        .output()
        .expect("run answerpipe doctor");

    assert!(out.status.success(), "answerpipe doctor failed");
    let s = String::from_utf8_lossy(&out.stdout);
    let v: serde_json::Value = serde_json::from_str(&s).expect("parse doctor json");

    assert_eq!(v["schema_version"].as_u64(), Some(1));
    assert_eq!(v["kind"].as_str(), Some("doctor"));
    assert_eq!(v["name"].as_str(), Some("answerpipe"));
    assert!(v.get("elapsed_ms").is_some());
    assert_eq!(v["features"]["stdio"].as_bool(), Some(true));

    // Booleans only for secrets.
    assert_eq!(v["configured"]["openai_api_key"].as_bool(), Some(false));
    assert_eq!(
        v["configured"]["endpoint"].as_str(),
        Some("https://api.openai.com/v1/responses")
    );
    assert_eq!(v["ok"].as_bool(), Some(false), "missing key must fail a check");
    assert_eq!(v["defaults"]["model"].as_str(), Some("gpt-5-mini"));

    let checks = v["checks"].as_array().expect("checks array");
    let find = |name: &str| {
        checks
            .iter()
            .find(|c| c["name"].as_str() == Some(name))
            .unwrap_or_else(|| panic!("missing check {name}"))
            .clone()
    };
    assert_eq!(find("api_key_configured")["ok"].as_bool(), Some(false));
    assert_eq!(find("endpoint_valid")["ok"].as_bool(), Some(true));
    let handshake = find("mcp_stdio_handshake");
    assert_eq!(handshake["skipped"].as_bool(), Some(true));
    assert_eq!(handshake["ok"].as_bool(), Some(true));
    assert!(handshake.get("error").is_some());
}

#[test]
fn answerpipe_doctor_never_prints_the_key() {
    let bin = assert_cmd::cargo::cargo_bin!("answerpipe");
    let out = std::process::Command::new(bin)
        .args(["doctor", "--check-stdio=true", "--timeout-ms", "10000"])
        .env("ANSWERPIPE_DOTENV", "0")
        .env_remove("ANSWERPIPE_ENV_FILE")
        .env("ANSWERPIPE_OPENAI_API_KEY", "sk-doctor-secret")
        .output()
        .expect("run answerpipe doctor");

    assert!(out.status.success());
    let s = String::from_utf8_lossy(&out.stdout);
    assert!(!s.contains("sk-doctor-secret"));
    let v: serde_json::Value = serde_json::from_str(&s).expect("parse doctor json");
    assert_eq!(v["configured"]["openai_api_key"].as_bool(), Some(true));

    let handshake = v["checks"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["name"].as_str() == Some("mcp_stdio_handshake"))
        .unwrap()
        .clone();
    assert_eq!(handshake["ok"].as_bool(), Some(true), "{handshake}");
    assert_eq!(handshake["tool_count"].as_u64(), Some(2));
}
