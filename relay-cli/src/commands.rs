use anyhow::Context;
use relay_core::client::PeerClient;
use relay_core::queue::{QueueStore, RedisQueueStore};
use relay_core::trace::Tracer;
use relay_protocol::prelude::*;
use relay_protocol::routes;
use serde_json::json;

use crate::{Commands, ProductArgs, ProductCommands};

pub(crate) struct Clients {
    pub tracer: Tracer,
    pub submission: PeerClient,
    pub moderation: PeerClient,
    pub redis_url: String,
}

/// Result of a command, rendered by [`crate::output::render`].
#[derive(Debug)]
pub(crate) enum Outcome {
    Reply { peer: &'static str, body: String },
    Messages { queue: QueueName, messages: Vec<String> },
    Products(Vec<Product>),
}

/// Runs one command. Every service call starts a new trace.
pub(crate) async fn execute(command: Commands, clients: &Clients) -> anyhow::Result<Outcome> {
    match command {
        Commands::Submit { message } => {
            post(
                clients,
                &clients.submission,
                "submit",
                routes::SEND_MESSAGE,
                &SendMessageForm { message },
            )
            .await
        }
        Commands::Approve { message } => {
            post(
                clients,
                &clients.moderation,
                "approve",
                routes::APPROVE_MESSAGE,
                &ApproveMessageForm { message },
            )
            .await
        }
        Commands::Like { product_id } => {
            post(
                clients,
                &clients.submission,
                "like",
                routes::LIKE_PRODUCT,
                &LikeProductForm { product_id },
            )
            .await
        }
        Commands::Product(ProductCommands::Add(args)) => {
            post(
                clients,
                &clients.moderation,
                "product.add",
                routes::ADD_PRODUCT,
                &product_form(args),
            )
            .await
        }
        Commands::Product(ProductCommands::Update(args)) => {
            post(
                clients,
                &clients.moderation,
                "product.update",
                routes::UPDATE_PRODUCT,
                &product_form(args),
            )
            .await
        }
        Commands::Product(ProductCommands::Delete { id }) => {
            post(
                clients,
                &clients.moderation,
                "product.delete",
                routes::DELETE_PRODUCT,
                &ProductIdForm { id },
            )
            .await
        }
        Commands::Pending => {
            let pending: PendingMessages = get(clients, &clients.moderation, "pending").await?;
            Ok(Outcome::Messages {
                queue: QueueName::Pending,
                messages: pending.messages,
            })
        }
        Commands::Products => {
            let products: Vec<Product> = get(clients, &clients.submission, "products").await?;
            Ok(Outcome::Products(products))
        }
        Commands::Queue { queue } => {
            let store = RedisQueueStore::connect(&clients.redis_url)
                .await
                .context("failed to connect to the queue store")?;
            let messages = store.read_all(queue).await?;
            Ok(Outcome::Messages { queue, messages })
        }
    }
}

async fn post<T: serde::Serialize>(
    clients: &Clients,
    peer: &PeerClient,
    operation: &str,
    path: &str,
    form: &T,
) -> anyhow::Result<Outcome> {
    let body = peer
        .post_form_traced(&clients.tracer, None, operation, path, form)
        .await?;
    Ok(Outcome::Reply {
        peer: peer.peer(),
        body,
    })
}

async fn get<T: serde::de::DeserializeOwned>(
    clients: &Clients,
    peer: &PeerClient,
    operation: &str,
) -> anyhow::Result<T> {
    let mut span = clients.tracer.start_span(operation, None);
    span.set_tag("span.kind", "client");
    span.set_tag("peer.service", peer.peer());
    let carrier = clients.tracer.inject(&span);

    let result = peer.get_json(routes::INDEX, &carrier).await;
    if let Err(err) = &result {
        span.set_tag("error", true);
        span.log_kv([("event", json!("error")), ("message", json!(err.to_string()))]);
    }
    span.finish();
    Ok(result?)
}

fn product_form(args: ProductArgs) -> ProductForm {
    ProductForm {
        id: args.id,
        name: args.name,
        like_count: args.like_count,
    }
}
