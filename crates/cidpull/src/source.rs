//! Loading the identifier list.

use cidpull_api::*;
use std::time::Duration;

/// Split newline-delimited identifier text into tokens.
///
/// Surrounding whitespace is trimmed and blank lines are dropped.
/// Tokens are not validated here; a malformed identifier is reported
/// when its fetch is attempted.
pub fn parse_identifier_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

/// Returns true if `location` should be fetched over http.
fn is_http(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Note the `blocking_` prefix. This must be run on a blocking task.
fn blocking_fetch_text(url: &str, timeout: Duration) -> PullResult<String> {
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(timeout)
        .timeout(timeout)
        .build();
    let resp = agent.get(url).call().map_err(|e| {
        PullError::other_src(format!("could not fetch cid list from {url}"), e)
    })?;

    if resp.status() != 200 {
        return Err(PullError::other(format!(
            "could not fetch cid list from {url}: {} {}",
            resp.status(),
            resp.status_text(),
        )));
    }

    resp.into_string().map_err(|e| {
        PullError::other_src(format!("could not read cid list from {url}"), e)
    })
}

/// Load the identifier list from an `http(s)://` url or a file path.
///
/// A download that has not completed within `timeout` is an error.
pub async fn load_identifiers(
    location: &str,
    timeout: Duration,
) -> PullResult<Vec<String>> {
    let text = if is_http(location) {
        let url = location.to_string();
        tokio::task::spawn_blocking(move || blocking_fetch_text(&url, timeout))
            .await
            .map_err(|e| PullError::other_src("cid list task failed", e))??
    } else {
        tokio::fs::read_to_string(location).await.map_err(|e| {
            PullError::other_src(
                format!("could not read cid list {location}"),
                e,
            )
        })?
    };

    let list = parse_identifier_list(&text);
    tracing::info!(count = list.len(), %location, "loaded cid list");
    Ok(list)
}
