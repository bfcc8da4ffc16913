use std::sync::Arc;
use std::time::Duration;

use workboard_api::{DebouncedSearch, SearchState, UserSummary, WorkboardApi};
use workboard_common::WorkboardError;

use super::stdin_lines;
use crate::context::Context;

pub async fn search(
    ctx: &Context,
    keyword: Option<String>,
    exclude: Vec<String>,
    interactive: bool,
) -> Result<(), WorkboardError> {
    let search = DebouncedSearch::with_limit(
        Arc::clone(&ctx.api),
        Duration::from_millis(ctx.config.search.debounce_ms),
        ctx.config.search.max_results as usize,
    );
    search.set_excluded(exclude);

    if interactive {
        return interactive_search(search, keyword).await;
    }

    let keyword = keyword
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| WorkboardError::Other("a keyword is required".to_string()))?;
    let mut state = search.subscribe();
    search.on_input(&keyword);
    let settled = state
        .wait_for(|s| !s.loading && (s.open || s.error.is_some()))
        .await
        .map_err(|_| WorkboardError::Other("search ended unexpectedly".to_string()))?
        .clone();
    print_results(&settled)
}

/// Every stdin line replaces the query; results print once a lookup settles.
async fn interactive_search(
    search: DebouncedSearch<Arc<WorkboardApi>>,
    initial: Option<String>,
) -> Result<(), WorkboardError> {
    let mut lines = stdin_lines();
    let mut state = search.subscribe();
    if let Some(initial) = initial {
        search.on_input(&initial);
    }
    let mut shown: Option<(Vec<String>, Option<String>)> = None;

    loop {
        tokio::select! {
            line = lines.recv() => match line {
                Some(line) => search.on_input(line.trim()),
                None => break,
            },
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = state.borrow_and_update().clone();
                if snapshot.loading || !(snapshot.open || snapshot.error.is_some()) {
                    continue;
                }
                // Keystrokes alone change only the input text.
                let key = (
                    snapshot.results.iter().map(|u| u.user_id.as_str().to_string()).collect(),
                    snapshot.error.clone(),
                );
                if shown.as_ref() == Some(&key) {
                    continue;
                }
                shown = Some(key);
                println!("-- {:?}", snapshot.input);
                if let Err(e) = print_results(&snapshot) {
                    eprintln!("{e}");
                }
            }
        }
    }
    Ok(())
}

fn print_results(state: &SearchState<UserSummary>) -> Result<(), WorkboardError> {
    if let Some(error) = &state.error {
        return Err(WorkboardError::Other(error.clone()));
    }
    if state.results.is_empty() {
        println!("no matching users");
    }
    for user in &state.results {
        match &user.email {
            Some(email) => println!("{:<16} {} <{email}>", user.user_id.as_str(), user.name),
            None => println!("{:<16} {}", user.user_id.as_str(), user.name),
        }
    }
    Ok(())
}
