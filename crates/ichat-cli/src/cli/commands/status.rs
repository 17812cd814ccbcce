//! Status command.

use anyhow::Result;
use ichat_core::auth::TokenStore;
use ichat_core::config::paths;

use crate::cli::AppContext;

pub fn run(ctx: &AppContext) -> Result<()> {
    println!("Backend:       {}", ctx.client.base_url);
    println!("Chat endpoint: {}", ctx.client.chat_url());
    println!("Response mode: {:?}", ctx.config.response_mode);
    println!("Config:        {}", paths::config_path().display());

    let store = TokenStore::default();
    match store.load()? {
        Some(creds) => {
            let who = creds.user_id.as_deref().unwrap_or("unknown user");
            println!("Logged in as {who} (token: {})", creds.mask_token());
            match creds.remaining() {
                Some(left) if left.is_zero() => println!("  Token expired"),
                Some(left) => println!("  Expires in {} min", left.as_secs().div_ceil(60)),
                None => println!("  No expiry recorded"),
            }
        }
        None => println!("Not logged in."),
    }

    Ok(())
}
