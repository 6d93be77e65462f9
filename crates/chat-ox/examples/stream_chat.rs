//! Stream one reply to stdout; Ctrl-C cancels the request.
//!
//! ```sh
//! OPENAI_API_KEY=sk-... cargo run -p chat-ox --example stream_chat -- "Tell me a joke"
//! ```

use std::io::Write;

use chat_ox::{ChatClient, ChatError};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let prompt = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Hello!".to_string());
    let client = ChatClient::from_env()?;

    println!("prompt is ~{} tokens", client.estimate_tokens(&prompt));

    let canceller = client.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = canceller.cancel();
        }
    });

    let mut printed = 0;
    let result = client
        .send_message(prompt, None, None, |text, _frame| {
            print!("{}", &text[printed..]);
            let _ = std::io::stdout().flush();
            printed = text.len();
        })
        .await;

    match result {
        Ok(_) => println!(),
        Err(ChatError::Cancelled) => println!("\n[cancelled]"),
        Err(err) => return Err(err.into()),
    }

    Ok(())
}
