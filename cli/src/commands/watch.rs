//! Polling reader: prints solutions as they appear.
//!
//! Newly registered solutions show up within one poll interval; that interval
//! is the staleness window other readers live with.

use std::collections::HashSet;
use std::time::Duration;

use crate::util::{RequestParts, exit_code_for_status, pretty, raw_api_request};

const FALLBACK_INTERVAL_SECS: u64 = 10;

/// Records in `list` (newest first) not seen before, oldest first.
fn unseen(seen: &mut HashSet<String>, list: &[serde_json::Value]) -> Vec<serde_json::Value> {
    let mut fresh: Vec<serde_json::Value> = list
        .iter()
        .filter(|record| {
            record
                .get("id")
                .and_then(|id| id.as_str())
                .is_some_and(|id| seen.insert(id.to_string()))
        })
        .cloned()
        .collect();
    fresh.reverse();
    fresh
}

async fn advertised_interval(api_url: &str) -> Option<u64> {
    let (status, body) = raw_api_request(
        api_url,
        reqwest::Method::GET,
        "/v1/system/config",
        RequestParts::default(),
    )
    .await
    .ok()?;
    if exit_code_for_status(status) != 0 {
        return None;
    }
    body.get("poll_interval_secs")?.as_u64().filter(|s| *s > 0)
}

pub async fn run(api_url: &str, interval: Option<u64>, only_new: bool) -> i32 {
    let secs = match interval {
        Some(s) => s.max(1),
        None => advertised_interval(api_url)
            .await
            .unwrap_or(FALLBACK_INTERVAL_SECS),
    };
    tracing::info!(interval_secs = secs, "watching solutions");

    let mut seen = HashSet::new();
    let mut first = true;
    let mut ticker = tokio::time::interval(Duration::from_secs(secs));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return 0,
            _ = ticker.tick() => {}
        }

        let (status, body) = match raw_api_request(
            api_url,
            reqwest::Method::GET,
            "/v1/solutions",
            RequestParts::default(),
        )
        .await
        {
            Ok(r) => r,
            Err(e) => {
                // Keep polling through transient outages.
                tracing::warn!(error = ?e, "poll failed");
                continue;
            }
        };
        if exit_code_for_status(status) != 0 {
            tracing::warn!(status, body = %body, "poll rejected");
            if (400..500).contains(&status) && status != 429 {
                eprintln!("{}", pretty(&body));
                return 1;
            }
            continue;
        }

        let list = body
            .get("data")
            .and_then(|d| d.as_array())
            .cloned()
            .unwrap_or_default();
        let fresh = unseen(&mut seen, &list);
        if !(first && only_new) {
            for record in fresh {
                println!("{}", serde_json::to_string(&record).unwrap_or_default());
            }
        }
        first = false;
    }
}
