//! Configuration file integration tests

use std::sync::Arc;

use convene::{
    ChatLog, Config, ConveneError, InterruptPolicy, Outcome, ProviderType, Route,
    SchedulerBuilder, ScriptedProvider,
};

const TEAM: &str = r#"
[defaults]
provider = "anthropic"
max_rounds = 12

[agents.client]
role = "You have a math problem."
interrupt = "always"

[agents.mathematician]
role = "You solve math problems."

[agents.reviewer]
role = "You check solutions."

[channels.team]
members = ["mathematician", "reviewer", "client"]
role = "Math study group"
max_rounds = 4
"#;

#[test]
fn test_load_roster_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, TEAM).unwrap();

    let config = Config::load_from_file(&path).unwrap();
    assert_eq!(config.defaults.provider, ProviderType::Anthropic);
    assert_eq!(config.agents.len(), 3);
    assert_eq!(config.agents["client"].interrupt, InterruptPolicy::Always);
    assert_eq!(config.channels["team"].max_rounds, 4);
}

#[test]
fn test_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let config = Config::from_toml_str(TEAM).unwrap();
    config.save(&path).unwrap();
    let reloaded = Config::load_from_file(&path).unwrap();

    assert_eq!(reloaded.defaults.max_rounds, 12);
    assert_eq!(
        reloaded.channels["team"].members,
        vec!["mathematician", "reviewer", "client"]
    );
}

#[test]
fn test_explicit_file_reads_dotenv() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".env"), "CONVENE_DOTENV_MARKER=loaded\n").unwrap();
    let path = dir.path().join("team.toml");
    std::fs::write(&path, TEAM).unwrap();

    let previous = std::env::current_dir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();
    let loaded = Config::load_from_file(&path);
    std::env::set_current_dir(previous).unwrap();

    assert!(loaded.is_ok());
    assert_eq!(std::env::var("CONVENE_DOTENV_MARKER").as_deref(), Ok("loaded"));
}

#[test]
fn test_invalid_roster_is_rejected() {
    let config = Config::from_toml_str(
        r#"
[agents.a]

[channels.team]
members = ["a", "missing"]
"#,
    )
    .unwrap();
    let result = SchedulerBuilder::from_config(&config).build();
    assert!(matches!(result, Err(ConveneError::UnknownAgent(n)) if n == "missing"));
}

#[tokio::test]
async fn test_configured_team_runs_and_exports() {
    let config = Config::from_toml_str(TEAM).unwrap();
    let backend = Arc::new(ScriptedProvider::new("everyone"));
    backend.push_text("mathematician");
    backend.push_text("x = 4");

    let mut scheduler = SchedulerBuilder::from_config(&config)
        .default_instance(backend.clone())
        .build()
        .unwrap();

    let outcome = scheduler
        .start(Route::new("client", "team"), "Solve 2x = 8")
        .await
        .unwrap();
    // After the mathematician, the selector call fails on the exhausted
    // script, which is recorded instead of raised
    assert!(matches!(outcome, Outcome::Failed { .. }));
    assert_eq!(backend.request_count(), 3);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json");
    std::fs::write(&path, scheduler.log().to_json().unwrap()).unwrap();
    let restored = ChatLog::from_json(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(restored.entries(), scheduler.log().entries());
    assert_eq!(restored.entries()[1].content, "x = 4");
}
