use quoria_consensus::validation::IntervalValidator;
use std::time::Duration;

#[tokio::main]
async fn main() {
    let validator = IntervalValidator::new(5);
    validator.record_vote(0, true);
    validator.record_vote(0, true);
    validator.record_vote(0, false);
    validator.record_vote(1, true);
    validator.record_vote(1, true);
    println!("votes recorded, waiting...");
    let r = validator.wait_complete(Duration::from_millis(500)).await;
    println!("{:?}", r.is_ok());
}
