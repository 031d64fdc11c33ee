//! Channel integration tests
//!
//! Group conversations where a selector backend picks the next member.

use std::sync::Arc;

use convene::{
    AgentConfig, ChannelConfig, ChatEntry, ChatState, HistoryFilter, InterruptPolicy, Outcome,
    Route, Scheduler, SchedulerBuilder, ScriptedProvider,
};

struct Team {
    x: Arc<ScriptedProvider>,
    y: Arc<ScriptedProvider>,
    z: Arc<ScriptedProvider>,
    selector: Arc<ScriptedProvider>,
}

impl Team {
    fn new() -> Self {
        Self {
            x: Arc::new(ScriptedProvider::repeating("x", "x here")),
            y: Arc::new(ScriptedProvider::repeating("y", "y here")),
            z: Arc::new(ScriptedProvider::repeating("z", "z here")),
            selector: Arc::new(ScriptedProvider::new("g")),
        }
    }

    fn builder(&self, channel: ChannelConfig) -> SchedulerBuilder {
        Scheduler::builder()
            .agent("client", AgentConfig::new("You bring the task"))
            .agent("x", AgentConfig::new("First").with_instance(self.x.clone()))
            .agent("y", AgentConfig::new("Second").with_instance(self.y.clone()))
            .agent("z", AgentConfig::new("Third").with_instance(self.z.clone()))
            .channel("g", channel.with_instance(self.selector.clone()))
            .default_instance(Arc::new(ScriptedProvider::new("client")))
    }
}

fn members() -> ChannelConfig {
    ChannelConfig::new(["x", "y", "z"]).with_role("A small team")
}

#[tokio::test]
async fn test_channel_budget_terminates_destination() {
    let team = Team::new();
    team.selector.push_text("x");
    team.selector.push_text("y");
    team.selector.push_text("z");
    let mut scheduler = team.builder(members().with_max_rounds(2)).build().unwrap();

    let outcome = scheduler.start(Route::new("client", "g"), "the task").await.unwrap();

    // x and y used the two rounds; z is selected but never speaks
    assert_eq!(outcome, Outcome::Terminated { node: "y".into() });
    let speakers: Vec<_> = scheduler
        .history(HistoryFilter::to("g"))
        .iter()
        .map(|e| e.from.clone())
        .collect();
    assert_eq!(speakers, vec!["client", "x", "y"]);
    assert_eq!(team.z.request_count(), 0);
}

#[tokio::test]
async fn test_spent_channel_terminates_without_new_speaker() {
    let team = Team::new();
    team.selector.push_text("z");
    let history = vec![
        ChatEntry::success(&Route::new("x", "g"), "first"),
        ChatEntry::success(&Route::new("y", "g"), "second"),
    ];
    let mut scheduler = team
        .builder(members().with_max_rounds(2))
        .history(history)
        .build()
        .unwrap();

    let outcome = scheduler.chat(Route::new("g", "client")).await.unwrap();
    assert_eq!(outcome, Outcome::Terminated { node: "client".into() });
    assert_eq!(scheduler.log().len(), 2);
    assert_eq!(team.z.request_count(), 0);
}

#[tokio::test]
async fn test_selection_never_repeats_last_speaker() {
    let team = Team::new();
    let selector = Arc::new(ScriptedProvider::repeating("g", "@x"));
    let mut scheduler = Scheduler::builder()
        .agent("client", AgentConfig::default())
        .agent("x", AgentConfig::default().with_instance(team.x.clone()))
        .agent("y", AgentConfig::default().with_instance(team.y.clone()))
        .agent("z", AgentConfig::default().with_instance(team.z.clone()))
        .channel("g", members().with_max_rounds(8).with_instance(selector))
        .default_instance(Arc::new(ScriptedProvider::new("client")))
        .build()
        .unwrap();

    scheduler.start(Route::new("client", "g"), "go").await.unwrap();

    let speakers: Vec<_> = scheduler
        .history(HistoryFilter::to("g"))
        .iter()
        .skip(1)
        .map(|e| e.from.clone())
        .collect();
    assert!(speakers.len() >= 2);
    assert_eq!(speakers[0], "x");
    for pair in speakers.windows(2) {
        assert_ne!(pair[0], pair[1]);
    }
}

#[tokio::test]
async fn test_unrecognised_answer_falls_back_to_member() {
    let team = Team::new();
    team.selector.push_text("I think the best choice is nobody");
    team.selector.push_text("TERMINATE");
    let mut scheduler = team
        .builder(members().with_max_rounds(1))
        .build()
        .unwrap();

    scheduler.start(Route::new("client", "g"), "go").await.unwrap();

    let spoke = team.x.request_count() + team.y.request_count() + team.z.request_count();
    assert_eq!(spoke, 1);
}

#[tokio::test]
async fn test_member_interrupt_in_channel() {
    let team = Team::new();
    team.selector.push_text("y");
    let mut scheduler = team
        .builder(members())
        .agent(
            "y",
            AgentConfig::new("Second")
                .with_interrupt(InterruptPolicy::Always)
                .with_instance(team.y.clone()),
        )
        .build()
        .unwrap();

    let outcome = scheduler.start(Route::new("client", "g"), "task").await.unwrap();
    assert_eq!(
        outcome,
        Outcome::Interrupted {
            route: Route::new("y", "g")
        }
    );
    assert_eq!(team.y.request_count(), 0);

    // Operator speaks for y; the channel moves on until y is picked again
    team.selector.push_text("z");
    team.selector.push_text("x");
    team.selector.push_text("y");
    let outcome = scheduler.resume(Some("y via operator")).await.unwrap();
    assert_eq!(
        outcome,
        Outcome::Interrupted {
            route: Route::new("y", "g")
        }
    );
    assert_eq!(team.y.request_count(), 0);
    assert_eq!(team.z.request_count(), 1);
    assert_eq!(team.x.request_count(), 1);

    let from_y = scheduler.history(HistoryFilter::from("y"));
    assert_eq!(from_y.len(), 1);
    assert_eq!(from_y[0].content, "y via operator");
    assert_eq!(from_y[0].state, ChatState::Success);
}

#[tokio::test]
async fn test_selector_failure_is_recorded_on_channel_route() {
    let team = Team::new();
    team.selector
        .push_error(convene::ProviderError::RateLimited("selector busy".into()));
    team.selector.push_text("x");
    team.selector.push_text("y");
    let mut scheduler = team.builder(members().with_max_rounds(1)).build().unwrap();

    let outcome = scheduler.start(Route::new("client", "g"), "task").await.unwrap();
    assert_eq!(
        outcome,
        Outcome::Failed {
            route: Route::new("g", "client"),
            retryable: true
        }
    );

    let outcome = scheduler.retry().await.unwrap();
    assert!(outcome.is_terminated());
    assert_eq!(team.x.request_count(), 1);
}
