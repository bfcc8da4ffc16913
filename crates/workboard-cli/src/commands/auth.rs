use std::io::BufRead;

use tracing::info;
use workboard_common::{ApiError, WorkboardError};

use crate::context::Context;

pub async fn login(ctx: &Context, user_id: &str, password: Option<String>) -> Result<(), WorkboardError> {
    let password = match password {
        Some(p) => p,
        None => {
            eprint!("password: ");
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };

    let outcome = ctx.session.login(user_id, &password).await?;
    if !outcome.success {
        let message = if outcome.message.is_empty() {
            "login refused".to_string()
        } else {
            outcome.message
        };
        return Err(WorkboardError::Other(message));
    }
    match outcome.user_id {
        Some(user) => println!("signed in as {user}"),
        None => println!("signed in"),
    }
    if !outcome.message.is_empty() {
        println!("{}", outcome.message);
    }
    Ok(())
}

pub fn logout(ctx: &Context) -> Result<(), WorkboardError> {
    ctx.session.logout();
    info!("credential cleared");
    println!("signed out");
    Ok(())
}

pub async fn whoami(ctx: &Context) -> Result<(), WorkboardError> {
    match ctx.session.guard().check().await {
        Ok(()) => {}
        Err(ApiError::AuthInvalid) => {
            return Err(WorkboardError::Other(
                "not signed in; run `workboard login <user>`".to_string(),
            ))
        }
        Err(e) => return Err(e.into()),
    }
    let info = ctx.api.user_info().await?;
    let rendered = serde_json::to_string_pretty(&info)
        .map_err(|e| WorkboardError::Other(format!("cannot render user info: {e}")))?;
    println!("{rendered}");
    Ok(())
}
