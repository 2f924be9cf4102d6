use std::io::{self, Read};

use heilkreis_bandits::{ActionCatalog, EpsilonGreedy, LearningConfig, PolicyStore, RemediationAgent};
use heilkreis_core::issue::IssueRecord;
use heilkreis_core::{Policy, HEALTHY};
use serde::Serialize;
use serde_json::Value;

#[derive(Serialize)]
struct DecisionRecord {
    policy: String,
    state: String,
    decision: Option<heilkreis_core::Decision>,
}

/// Accepts an issue record, a JSON string or a bare state label on stdin.
fn state_from_input(input: &str) -> String {
    let input = input.trim();
    if input.is_empty() {
        return HEALTHY.to_string();
    }
    if let Ok(issue) = serde_json::from_str::<IssueRecord>(input) {
        return issue.state_label();
    }
    match serde_json::from_str::<Value>(input) {
        Ok(Value::String(state)) => state,
        _ => input.to_string(),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;
    let state = state_from_input(&input);

    let config = LearningConfig::default();
    let mut agent = RemediationAgent::new(
        ActionCatalog::default(),
        PolicyStore::in_memory(&config),
        EpsilonGreedy::new(config.epsilon),
    );
    let decision = agent.decide(&state);

    let record = DecisionRecord {
        policy: "heilkreis-bandits".to_string(),
        state,
        decision,
    };

    serde_json::to_writer_pretty(io::stdout(), &record)?;
    println!();

    Ok(())
}
