use heilkreis_bandits::{ActionCatalog, EpsilonGreedy, LearningConfig, PolicyStore, RemediationAgent};
use heilkreis_core::Policy;
use std::time::Instant;

fn main() {
    let config = LearningConfig::default();
    let mut agent = RemediationAgent::new(
        ActionCatalog::default(),
        PolicyStore::in_memory(&config),
        EpsilonGreedy::seeded(config.epsilon, 0),
    );

    let iterations: u32 = 1_000_000;
    let state = "connection_failed";

    // Warmup
    for _ in 0..1000 {
        agent.feedback(state, "restart_deployment", 1.0);
    }

    let start = Instant::now();
    for _ in 0..iterations {
        agent.feedback(state, "restart_deployment", 1.0);
    }
    let duration = start.elapsed();
    println!("Feedback for EXISTING pair took: {:?}", duration);
    println!("Average per call: {:?}", duration / iterations);

    let start = Instant::now();
    for _ in 0..iterations {
        if let Some(d) = agent.decide(state) {
            std::hint::black_box(d);
        }
    }
    let duration = start.elapsed();
    println!("Decide took: {:?}", duration);
    println!("Average per call: {:?}", duration / iterations);
}
