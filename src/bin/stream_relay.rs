//! stream-relay: 流式中继服务与命令行客户端
//!
//! Usage:
//!   stream-relay serve [--config <path>] [--bind <addr>]     Run the HTTP relay
//!   stream-relay ask <message> [--image <path>]              Stream one answer to stdout
//!   stream-relay chat [--transcript <path>]                  Interactive session on stdin

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use stream_relay::session::{
    ChatSession, InMemoryTranscriptStore, JsonlTranscriptStore, TranscriptStore,
};
use stream_relay::types::message::image_data_uri;
use stream_relay::{CancelHandle, ChatRequest, RelayConfig, StreamRelay};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "stream-relay", version, about = "Streaming chat relay")]
struct Cli {
    /// YAML configuration file (environment variables still override it)
    #[arg(long, global = true, env = "STREAM_RELAY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP relay
    Serve {
        /// Listen address, overrides configuration
        #[arg(long)]
        bind: Option<String>,
    },
    /// Ask one question and stream the answer to stdout
    Ask {
        message: String,
        /// Image file attached to the question
        #[arg(long)]
        image: Option<PathBuf>,
        /// Use the non-streaming fallback
        #[arg(long)]
        no_stream: bool,
    },
    /// Interactive conversation; one question per line, empty line or EOF quits
    Chat {
        /// Append finished exchanges to this JSON Lines file
        #[arg(long)]
        transcript: Option<PathBuf>,
        /// Tag stored exchanges with this user id
        #[arg(long)]
        user: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,stream_relay=debug".into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = RelayConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Command::Serve { bind } => {
            let addr = bind.unwrap_or_else(|| config.bind_addr.clone());
            let relay = StreamRelay::new(config).context("initializing relay")?;
            stream_relay::server::serve(relay, &addr).await?;
        }
        Command::Ask {
            message,
            image,
            no_stream,
        } => {
            let relay = StreamRelay::new(config).context("initializing relay")?;
            let mut request = ChatRequest::new(message);
            if let Some(path) = image {
                let uri = image_data_uri(&path)
                    .with_context(|| format!("reading image {}", path.display()))?;
                request = request.with_image(uri);
            }

            if no_stream {
                let answer = relay.complete(&request).await?;
                writeln!(io::stdout(), "{}", answer).context("writing answer to stdout")?;
                return Ok(());
            }

            let stream = relay.open(&request).await?;
            let mut sink = FragmentSink::new(io::stdout()).cancelling(stream.cancel_handle());
            let answer =
                stream_relay::session::collect_answer_with(stream, |f| sink.write(f)).await;
            writeln!(sink.finish()?).context("writing answer to stdout")?;
            if let Some(err) = answer.error {
                anyhow::bail!("stream ended early: {}", err);
            }
        }
        Command::Chat { transcript, user } => {
            let relay = StreamRelay::new(config).context("initializing relay")?;
            let store: Box<dyn TranscriptStore> = match transcript {
                Some(path) => Box::new(JsonlTranscriptStore::new(path)),
                None => Box::new(InMemoryTranscriptStore::new()),
            };
            let history = store.history(user.as_deref()).await?;
            let mut session = ChatSession::resume(user, &history);
            run_chat(&relay, store.as_ref(), &mut session).await?;
        }
    }

    Ok(())
}

/// Writes answer fragments as they arrive and remembers the first write failure.
///
/// After a failure further fragments are dropped and the attached stream, if
/// any, is cancelled.
struct FragmentSink<W: Write> {
    out: W,
    failed: Option<io::Error>,
    cancel: Option<CancelHandle>,
}

impl<W: Write> FragmentSink<W> {
    fn new(out: W) -> Self {
        Self {
            out,
            failed: None,
            cancel: None,
        }
    }

    fn cancelling(mut self, handle: CancelHandle) -> Self {
        self.cancel = Some(handle);
        self
    }

    fn write(&mut self, fragment: &str) {
        if self.failed.is_some() {
            return;
        }
        let res = self
            .out
            .write_all(fragment.as_bytes())
            .and_then(|_| self.out.flush());
        if let Err(e) = res {
            if let Some(cancel) = &self.cancel {
                cancel.cancel();
            }
            self.failed = Some(e);
        }
    }

    fn finish(self) -> io::Result<W> {
        match self.failed {
            Some(e) => Err(e),
            None => Ok(self.out),
        }
    }
}

async fn run_chat(
    relay: &StreamRelay,
    store: &dyn TranscriptStore,
    session: &mut ChatSession,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("> ");
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim().to_string();
        if line.is_empty() {
            break;
        }

        let mut sink = FragmentSink::new(io::stdout());
        let asked = session.ask(relay, store, line, None, |f| sink.write(f)).await;
        writeln!(sink.finish()?)?;

        match asked {
            Ok(answer) => {
                if answer.is_empty() {
                    eprintln!("(no answer received, please try again)");
                }
            }
            Err(e) => eprintln!("request failed: {}", e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stream_relay::RelayStream;

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "reader went away"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn sink_writes_fragments_in_order() {
        let mut sink = FragmentSink::new(Vec::new());
        sink.write("Stay ");
        sink.write("warm.");
        assert_eq!(sink.finish().unwrap(), b"Stay warm.");
    }

    #[test]
    fn write_failure_is_reported_and_cancels_stream() {
        let handle = RelayStream::terminated(None).cancel_handle();
        let mut sink = FragmentSink::new(BrokenPipe).cancelling(handle.clone());

        sink.write("first");
        sink.write("second");

        assert!(handle.is_cancelled());
        let err = sink.finish().err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
