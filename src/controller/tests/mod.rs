use super::test_helpers::{Script, ScriptedRunner, create_test_downloader};
use super::*;
use crate::hub::Subscription;
use crate::types::{
    CANCELLED_EXIT_CODE, CredentialContext, JobEvent, JobStatus, Outcome, TerminalEvent,
};
use std::time::Duration;


const SOURCE: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

fn progress_line(pct: f32) -> String {
    format!("[download] {pct:5.1}% of ~10.00MiB at  2.50MiB/s ETA 00:03")
}

/// Drain a subscription until it ends
async fn collect_events(subscription: &mut Subscription) -> Vec<JobEvent> {
    tokio::time::timeout(Duration::from_secs(5), async {
        let mut events = Vec::new();
        while let Some(event) = subscription.recv().await {
            events.push(event);
        }
        events
    })
    .await
    .expect("subscription did not end")
}

fn terminal_of(events: &[JobEvent]) -> TerminalEvent {
    let terminals: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            JobEvent::Terminal(t) => Some(t.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(terminals.len(), 1, "expected exactly one terminal event: {events:?}");
    assert!(events.last().unwrap().is_terminal(), "terminal event must come last");
    terminals.into_iter().next().unwrap()
}

/// Poll until `check` holds or a second has passed
async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
