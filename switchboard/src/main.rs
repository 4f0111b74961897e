#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;
mod output;
mod wiring;

use std::future::Future;

use args::{Args, Command};
use clap::Parser;
use futures_util::stream::{self, Stream};
use indexmap::IndexMap;
use output::StdoutSink;
use switchboard_config::Config;
use switchboard_core::{IndexedContent, Message, RequestContext};
use switchboard_gateway::{ChatRequest, EmbeddingRequest, Gateway, RerankingRequest, VerifyCredentialRequest};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::load(&args.config)?;

    switchboard_telemetry::init(&config.telemetry)?;

    tracing::debug!(config_path = %args.config.display(), "configuration loaded");

    let gateway = wiring::build_gateway(&config);

    // Ctrl+C cancels the request in flight
    let shutdown = CancellationToken::new();
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown_clone.cancel();
    });

    let context = RequestContext {
        cancellation: shutdown,
        client: wiring::client_source(&config),
        ..Default::default()
    };

    let mut sink = StdoutSink::new();
    let outcome = run(&gateway, &config, args.command, &context, &mut sink).await;

    // Audit writes are detached from the request; let them land before exit
    if let Some(audit) = gateway.audit() {
        audit.shutdown().await;
    }

    outcome?;
    if sink.failures() > 0 {
        anyhow::bail!("{} request(s) failed", sink.failures());
    }
    Ok(())
}

async fn run(
    gateway: &Gateway,
    config: &Config,
    command: Command,
    context: &RequestContext,
    sink: &mut StdoutSink,
) -> anyhow::Result<()> {
    let target = command.target();
    let tag = target.provider.clone();
    let parameters = target.model_parameters();
    let credential = wiring::credential(config, &tag)?;

    match command {
        Command::Verify(_) => {
            let request = VerifyCredentialRequest {
                credential,
                model_parameters: parameters,
            };
            let envelope = cancellable(context, gateway.verify_credential(&tag, request, context)).await?;
            sink.write(&envelope).await
        }
        Command::Chat {
            system, stream, prompt, ..
        } => {
            let conversations = system
                .map(Message::system)
                .into_iter()
                .chain([Message::user(prompt)])
                .collect();
            let mut request = ChatRequest::new(credential, conversations);
            request.model_parameters = parameters;

            if stream {
                gateway.stream_chat(&tag, request, context, sink).await?;
                Ok(())
            } else {
                let envelope = cancellable(context, gateway.chat(&tag, request, context)).await?;
                sink.write(&envelope).await
            }
        }
        Command::Session(_) => {
            let requests = stdin_requests(credential, parameters);
            gateway.chat_session(&tag, Box::pin(requests), context, sink).await?;
            Ok(())
        }
        Command::Embed { texts, .. } => {
            let request = EmbeddingRequest {
                credential,
                content: indexed(texts),
                model_parameters: parameters,
                additional_data: IndexMap::new(),
            };
            let envelope = cancellable(context, gateway.embedding(&tag, request, context)).await?;
            sink.write(&envelope).await
        }
        Command::Rerank {
            query, top_n, documents, ..
        } => {
            let mut parameters = parameters;
            if let Some(top_n) = top_n {
                parameters.insert(switchboard_core::params::keys::TOP_N, top_n);
            }
            let request = RerankingRequest {
                credential,
                query,
                content: indexed(documents),
                model_parameters: parameters,
                additional_data: IndexMap::new(),
            };
            let envelope = cancellable(context, gateway.reranking(&tag, request, context)).await?;
            sink.write(&envelope).await
        }
    }
}

/// Race a unary call against Ctrl+C
async fn cancellable<T>(context: &RequestContext, call: impl Future<Output = T>) -> anyhow::Result<T> {
    tokio::select! {
        biased;
        () = context.cancellation.cancelled() => anyhow::bail!("request cancelled"),
        result = call => Ok(result),
    }
}

fn indexed(texts: Vec<String>) -> IndexedContent {
    (0u32..).zip(texts).collect()
}

/// One single-turn chat request per non-empty stdin line
fn stdin_requests(
    credential: switchboard_core::Credential,
    parameters: switchboard_core::ModelParameters,
) -> impl Stream<Item = anyhow::Result<ChatRequest>> + Send {
    let lines = BufReader::new(tokio::io::stdin()).lines();
    stream::unfold(lines, move |mut lines| {
        let credential = credential.clone();
        let parameters = parameters.clone();
        async move {
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => {}
                    Ok(Some(line)) => {
                        let mut request = ChatRequest::new(credential, vec![Message::user(line)]);
                        request.model_parameters = parameters;
                        return Some((Ok(request), lines));
                    }
                    Ok(None) => return None,
                    Err(e) => return Some((Err(e.into()), lines)),
                }
            }
        }
    })
}

/// Wait for a shutdown signal (`SIGINT` or `SIGTERM`)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    tracing::info!("shutdown signal received");
}
