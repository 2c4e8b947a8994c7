use std::time::Duration;

use posthog_rs::Event;
use tracing::warn;

const CAPTURE_TIMEOUT: Duration = Duration::from_secs(5);

fn capture_async(event: Event) {
    tokio::spawn(async move {
        match tokio::time::timeout(CAPTURE_TIMEOUT, posthog_rs::capture(event)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to capture analytics event: {e}"),
            Err(_) => warn!("Analytics event capture timed out"),
        }
    });
}

pub fn track_donation_created(service: &str, recurring: bool) {
    let mut event = Event::new_anon("donation_created");
    event.insert_prop("service", service).ok();
    event.insert_prop("recurring", recurring).ok();
    capture_async(event);
}

pub fn track_donation_failed(service: &str, error_kind: &str) {
    let mut event = Event::new_anon("donation_failed");
    event.insert_prop("service", service).ok();
    event.insert_prop("error_kind", error_kind).ok();
    capture_async(event);
}

pub fn track_redirect_flow_initiated(recurring: bool) {
    let mut event = Event::new_anon("redirect_flow_initiated");
    event.insert_prop("recurring", recurring).ok();
    capture_async(event);
}

pub fn track_redirect_flow_completed(recurring: bool) {
    let mut event = Event::new_anon("redirect_flow_completed");
    event.insert_prop("recurring", recurring).ok();
    capture_async(event);
}
