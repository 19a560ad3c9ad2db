// tests/seed_scenarios.rs
// End-to-end scenarios exercising the full Supervisor + Discovery +
// Strategy stack together, using a fake stdio tool server (a tiny POSIX
// shell script) and a scripted LLM provider, in the same spirit as the
// teacher's own `agents/registry.rs` and MCP health monitor tests.

use std::collections::HashMap;
use std::sync::Arc;

use mira_orchestrator::config::ServerConfigEntry;
use mira_orchestrator::discovery::cache::ToolSelectionCache;
use mira_orchestrator::llm::mock::ScriptedProvider;
use mira_orchestrator::llm::GenerateResponse;
use mira_orchestrator::observer::Observer;
use mira_orchestrator::strategy::{DirectStrategy, ReactStrategy, ReflectionStrategy, Strategy};
use mira_orchestrator::supervisor::Supervisor;

/// Write an executable POSIX shell script that answers `initialize` and
/// `listTools` with the given JSON-RPC envelopes, and `callTool` by
/// branching on the raw request line via `body`. `body` is spliced
/// directly into a `case "$line" in ... esac` block.
fn write_fake_server(name: &str, list_tools_result: &str, call_tool_body: &str) -> std::path::PathBuf {
    let script = format!(
        "#!/bin/sh\n\
         while IFS= read -r line; do\n\
         case \"$line\" in\n\
         *'\"method\":\"initialize\"'*) echo '{{\"id\":1,\"result\":{{}}}}' ;;\n\
         *'\"method\":\"listTools\"'*) echo '{{\"id\":2,\"result\":{list_tools_result}}}' ;;\n\
         *'\"method\":\"callTool\"'*)\n\
         {call_tool_body}\n\
         ;;\n\
         esac\n\
         done\n"
    );

    let path = std::env::temp_dir().join(format!("fake-tool-server-{name}-{}.sh", std::process::id()));
    std::fs::write(&path, script).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
    }
    path
}

fn server_cfg(command: std::path::PathBuf, args: Vec<String>, domain: &str) -> ServerConfigEntry {
    ServerConfigEntry {
        description: "test server".to_string(),
        command: command.to_string_lossy().into_owned(),
        args,
        env: HashMap::new(),
        priority: 0,
        enabled: true,
        domain: Some(domain.to_string()),
    }
}

// Scenario 1: servers `{time, fs}` both up; query asks for the time in
// UTC; exactly one call to `time.get_current_time`, final answer
// contains the returned time text.
#[tokio::test]
async fn seed_scenario_1_single_tool_query_makes_exactly_one_call() {
    let time_script = write_fake_server(
        "time",
        r#"{"tools":[{"name":"get_current_time","description":"Current time","inputSchema":{"properties":{"timezone":{"type":"string"}},"required":["timezone"]}}]}"#,
        r#"echo '{"id":3,"result":{"content":[{"type":"text","text":"2026-07-27T12:00:00Z"}],"isError":false}}'"#,
    );
    let fs_script = write_fake_server(
        "fs",
        r#"{"tools":[{"name":"write_file","description":"Write a file","inputSchema":{"properties":{"path":{"type":"string"},"content":{"type":"string"}},"required":["path","content"]}}]}"#,
        r#"echo '{"id":3,"result":{"content":[{"type":"text","text":"wrote"}],"isError":false}}'"#,
    );

    let supervisor = Supervisor::new(3000, 3000);
    assert!(supervisor.connect_server("time", server_cfg(time_script, vec![], "time")).await);
    assert!(supervisor.connect_server("fs", server_cfg(fs_script, vec![], "filesystem")).await);

    let llm = ScriptedProvider::new(vec![
        GenerateResponse::ok(r#"{"intent": "SINGLE_TOOL", "reasoning": "needs the time tool"}"#),
        GenerateResponse::ok(r#"{"tool": "get_current_time", "arguments": {"timezone": "UTC"}}"#),
        GenerateResponse::ok("It is 2026-07-27T12:00:00Z in UTC."),
    ]);

    let strategy = DirectStrategy {
        supervisor: Arc::new(supervisor),
        llm: Arc::new(llm),
        rules: HashMap::new(),
        domains: Vec::new(),
        cache: Arc::new(ToolSelectionCache::new()),
        cache_options_hash: "test".to_string(),
        observer: Observer::new(),
    };

    let answer = strategy.process_query("what time is it in UTC", &Vec::new()).await;
    assert!(answer.contains("2026-07-27T12:00:00Z"), "answer was: {answer}");
}

// Scenario 2: `fs` up; MULTI_TOOL plan chaining weather -> fs with a
// `{{RESULT_1}}` placeholder; step 2 must receive the literal content
// returned by step 1.
#[tokio::test]
async fn seed_scenario_2_multi_step_plan_propagates_placeholder_result() {
    let weather_script = write_fake_server(
        "weather",
        r#"{"tools":[{"name":"get_forecast","description":"Forecast","inputSchema":{"properties":{"city":{"type":"string"}},"required":["city"]}}]}"#,
        r#"echo '{"id":3,"result":{"content":[{"type":"text","text":"NYC forecast: sunny, 72F"}],"isError":false}}'"#,
    );
    let fs_script = write_fake_server(
        "fs",
        r#"{"tools":[{"name":"write_file","description":"Write a file","inputSchema":{"properties":{"path":{"type":"string"},"content":{"type":"string"}},"required":["path","content"]}}]}"#,
        r#"case "$line" in
             *'NYC forecast: sunny'*) echo '{"id":3,"result":{"content":[{"type":"text","text":"wrote nyc.txt"}],"isError":false}}' ;;
             *) echo '{"id":3,"result":{"content":[{"type":"text","text":"placeholder not substituted"}],"isError":true}}' ;;
           esac"#,
    );

    let supervisor = Supervisor::new(3000, 3000);
    assert!(supervisor.connect_server("weather", server_cfg(weather_script, vec![], "weather")).await);
    assert!(supervisor.connect_server("fs", server_cfg(fs_script, vec![], "filesystem")).await);

    let llm = ScriptedProvider::new(vec![
        GenerateResponse::ok(r#"{"intent": "MULTI_TOOL", "reasoning": "fetch then save"}"#),
        GenerateResponse::ok(
            r#"[{"tool": "get_forecast", "arguments": {"city": "NYC"}}, {"tool": "write_file", "arguments": {"path": "nyc.txt", "content": "{{RESULT_1}}"}}]"#,
        ),
        GenerateResponse::ok("Saved the NYC forecast to nyc.txt."),
    ]);

    let strategy = DirectStrategy {
        supervisor: Arc::new(supervisor),
        llm: Arc::new(llm),
        rules: HashMap::new(),
        domains: Vec::new(),
        cache: Arc::new(ToolSelectionCache::new()),
        cache_options_hash: "test".to_string(),
        observer: Observer::new(),
    };

    let answer = strategy
        .process_query("get the NYC weather and save it to nyc.txt", &Vec::new())
        .await;
    assert_eq!(answer, "Saved the NYC forecast to nyc.txt.");
}

// Scenario 3: the weather subprocess exits mid-session; the next
// `callTool` exhausts both attempts, returns an error naming the server,
// and leaves it marked unhealthy.
#[tokio::test]
async fn seed_scenario_3_dead_subprocess_fails_both_attempts_and_marks_unhealthy() {
    let script = write_fake_server(
        "weather-dies",
        r#"{"tools":[{"name":"get_forecast","description":"Forecast","inputSchema":{"properties":{"city":{"type":"string"}},"required":["city"]}}]}"#,
        "exit 0",
    );

    let supervisor = Supervisor::new(3000, 3000);
    assert!(supervisor.connect_server("weather", server_cfg(script, vec![], "weather")).await);

    let result = supervisor
        .call_tool("weather", "get_forecast", serde_json::json!({"city": "NYC"}))
        .await;

    assert!(!result.is_success());
    if let mira_orchestrator::supervisor::ToolExecutionResult::Error { message, .. } = &result {
        assert!(message.contains("weather"), "message was: {message}");
        assert!(message.contains("2 attempts"), "message was: {message}");
    } else {
        panic!("expected an error result");
    }

    // The exhausted retry budget marks the server unhealthy, which drops
    // its tools out of the connected set until an explicit reconnect.
    let tools = supervisor.get_all_available_tools().await;
    assert!(tools.iter().all(|t| t.server_id != "weather"));
}

// Scenario 4: plain "hello" query classified as DIRECT_ANSWER never
// touches a tool and returns the LLM's text verbatim.
#[tokio::test]
async fn seed_scenario_4_direct_answer_makes_no_tool_calls() {
    let supervisor = Supervisor::new(1000, 1000);
    let llm = ScriptedProvider::new(vec![
        GenerateResponse::ok(r#"{"intent": "DIRECT_ANSWER", "reasoning": "a greeting"}"#),
        GenerateResponse::ok("Hello! How can I help?"),
    ]);

    let strategy = DirectStrategy {
        supervisor: Arc::new(supervisor),
        llm: Arc::new(llm),
        rules: HashMap::new(),
        domains: Vec::new(),
        cache: Arc::new(ToolSelectionCache::new()),
        cache_options_hash: "test".to_string(),
        observer: Observer::new(),
    };

    let answer = strategy.process_query("hello", &Vec::new()).await;
    assert_eq!(answer, "Hello! How can I help?");
}

// Scenario 5: Reflection with maxIterations = 3; the critique reports
// NEEDS_IMPROVEMENT but with confidence above the early-exit threshold,
// so the loop stops after one iteration without refining.
#[tokio::test]
async fn seed_scenario_5_reflection_confidence_gate_stops_after_one_iteration() {
    let strategy = ReflectionStrategy::new(
        Arc::new(Supervisor::new(1000, 1000)),
        Arc::new(ScriptedProvider::new(vec![
            GenerateResponse::ok(r#"{"intent": "DIRECT_ANSWER", "reasoning": "open question"}"#),
            GenerateResponse::ok("The initial response."),
            GenerateResponse::ok("ISSUES: a bit terse\nSUGGESTIONS: add detail\nCONFIDENCE: 0.9\nNEEDS_IMPROVEMENT: true"),
            GenerateResponse::ok(r#"{"completeness":0.9,"accuracy":0.9,"relevance":0.9,"clarity":0.9}"#),
        ])),
        HashMap::new(),
        Observer::new(),
    );

    let answer = strategy.process_query("explain the plan", &Vec::new()).await;
    assert_eq!(answer, "The initial response.");
}

// Scenario 6: ReAct's `search` tool returns a generic-success (empty)
// observation on iterations 1-3, hitting the per-tool use cap; iteration
// 4 must not invoke `search` again.
#[tokio::test]
async fn seed_scenario_6_react_stops_reusing_a_tool_past_the_cap() {
    let counter_path = std::env::temp_dir().join(format!("search-call-count-{}.txt", std::process::id()));
    let _ = std::fs::remove_file(&counter_path);

    let script = write_fake_server(
        "search",
        r#"{"tools":[{"name":"search","description":"Search","inputSchema":{"properties":{"query":{"type":"string"}},"required":["query"]}}]}"#,
        &format!(r#"echo x >> "{}"; echo '{{"id":3,"result":{{"content":[],"isError":false}}}}'"#, counter_path.display()),
    );

    let supervisor = Supervisor::new(3000, 3000);
    assert!(supervisor.connect_server("search", server_cfg(script, vec![], "search")).await);

    let use_search = r#"{"action": "USE_TOOL", "tool_name": "search", "parameters": {"query": "q"}}"#;
    let strategy = ReactStrategy::new(
        Arc::new(supervisor),
        Arc::new(ScriptedProvider::new(vec![
            GenerateResponse::ok(r#"{"intent": "MULTI_TOOL", "reasoning": "needs repeated search"}"#),
            GenerateResponse::ok(use_search),
            GenerateResponse::ok(use_search),
            GenerateResponse::ok(use_search),
            // The loop stops as soon as `search` hits its use cap on the
            // third call, so no fourth USE_TOOL is ever generated; this
            // entry is consumed by the post-loop synthesis call instead.
            GenerateResponse::ok("done searching"),
        ])),
        HashMap::new(),
        Observer::new(),
    );

    let answer = strategy.process_query("look this up repeatedly", &Vec::new()).await;
    assert_eq!(answer, "done searching");

    let calls = std::fs::read_to_string(&counter_path).unwrap_or_default();
    assert_eq!(calls.lines().count(), 3, "search should be invoked exactly 3 times, log: {calls:?}");

    let _ = std::fs::remove_file(&counter_path);
}
