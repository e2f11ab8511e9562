use anyhow::{Context, Result};
use clap::Args;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use toolhost_protocol::{ClientRequest, ClientResponse};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Script source to run. Reads from stdin when omitted.
    pub script: Option<String>,

    /// Session id to associate the run with.
    #[arg(long)]
    pub session: Option<String>,

    /// Pipe stdin through to the script as a `stdin` helper binding.
    /// Conflicts with reading the script itself from stdin.
    #[arg(long)]
    pub pipe_stdin: bool,
}

pub async fn run(args: RunArgs, config: &Config) -> Result<()> {
    let (script, piped) = match args.script {
        Some(s) if args.pipe_stdin => {
            use std::io::Read;
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read piped input from stdin")?;
            (s, Some(buf))
        }
        Some(s) => (s, None),
        None if args.pipe_stdin => {
            anyhow::bail!("--pipe-stdin requires the script to be passed as an argument")
        }
        None => {
            use std::io::Read;
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read script from stdin")?;
            (buf, None)
        }
    };

    let url = config.client_base_url();
    let (mut socket, _) = tokio_tungstenite::connect_async(&url)
        .await
        .with_context(|| format!("failed to connect to toolhost server at {url}"))?;

    // Drain the welcome frame before submitting the request.
    let _ = socket.next().await;

    let id = uuid::Uuid::new_v4().to_string();
    let request = ClientRequest::RunScript {
        script,
        session_id: args.session,
        stdin: piped,
        id: id.clone(),
    };
    socket
        .send(Message::Text(serde_json::to_string(&request)?))
        .await
        .context("failed to send script to server")?;

    while let Some(message) = socket.next().await {
        let message = message.context("websocket error while waiting for script result")?;
        let Message::Text(text) = message else {
            continue;
        };
        let response: ClientResponse = serde_json::from_str(&text)
            .context("failed to parse server response")?;
        match response {
            ClientResponse::Result { result, id: reply_id } if reply_id == id => {
                println!("{}", serde_json::to_string_pretty(&result)?);
                return Ok(());
            }
            ClientResponse::Error { error, id: reply_id } if reply_id.as_deref() == Some(id.as_str()) => {
                anyhow::bail!("script failed: {error}");
            }
            _ => continue,
        }
    }

    anyhow::bail!("server closed the connection before returning a result")
}
