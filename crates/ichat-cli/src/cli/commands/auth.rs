//! Auth command handlers.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use ichat_core::auth::{self, TokenStore};

use crate::cli::AppContext;

pub async fn login(
    ctx: &AppContext,
    user_id: Option<String>,
    password: Option<String>,
) -> Result<()> {
    let user_id = match user_id {
        Some(id) => id,
        None => prompt("User ID: ")?,
    };
    let password = match password {
        Some(pw) => pw,
        None => prompt("Password: ")?,
    };
    if user_id.trim().is_empty() || password.is_empty() {
        anyhow::bail!("User ID and password are required");
    }

    let credentials = auth::login(&ctx.client, user_id.trim(), &password)
        .await
        .context("Login failed")?;

    let store = TokenStore::default();
    store.save(&credentials)?;

    println!(
        "✓ Logged in as {} (token: {})",
        user_id.trim(),
        credentials.mask_token()
    );
    println!("  Credentials saved to: {}", store.path().display());

    Ok(())
}

pub fn logout() -> Result<()> {
    let store = TokenStore::default();
    if store.clear()? {
        println!("✓ Logged out");
        println!("  Credentials removed from: {}", store.path().display());
    } else {
        println!("Not logged in (no credentials found).");
    }
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin()
        .lock()
        .read_line(&mut input)
        .context("read input")?;
    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}
