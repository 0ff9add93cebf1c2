//! Event Router - example of routing JSON envelopes to typed handlers.
//!
//! This example demonstrates:
//! - Registering factories and handlers with `Registry::builder()`
//! - Sealing the registry before the hot path
//! - Create-then-dispatch with `route`
//! - Cross-cutting middleware from `typemux::middleware`
//!
//! # Running
//!
//! ```sh
//! printf '%s\n' \
//!   '{"type":"user_created","data":{"id":"u1","name":"Alice"}}' \
//!   '{"type":"order_placed","data":{"order_id":"o1","amount":4200}}' \
//!   '{"type":"payment_received","data":{"order_id":"o1","amount":4200}}' \
//!   | RUST_LOG=debug cargo run --example events
//! ```

use bytes::Bytes;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use typemux::{middleware, Context, Error, Middleware, Registry, Router};

/// Wire envelope: a routing key plus the payload for its factory.
#[derive(Deserialize, Debug)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    data: serde_json::Value,
}

#[derive(Deserialize, Debug)]
struct UserCreated {
    id: String,
    name: String,
}

#[derive(Deserialize, Debug)]
struct OrderPlaced {
    order_id: String,
    amount: u64,
}

#[derive(Deserialize, Debug)]
struct PaymentReceived {
    order_id: String,
    amount: u64,
}

/// Source of the current input line, available to every handler.
#[derive(Debug, Clone, Copy)]
struct LineNo(usize);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let registry = Registry::builder()
        .json_factory::<UserCreated, _>("user_created")
        .json_factory::<OrderPlaced, _>("order_placed")
        .json_factory::<PaymentReceived, _>("payment_received")
        .handle(|_ctx, e: &UserCreated| {
            println!("User created: {} ({})", e.name, e.id);
            Ok(())
        })
        .handle_with(
            |_ctx, e: &OrderPlaced| {
                println!("Order placed: {} for {}", e.order_id, e.amount);
                Ok(())
            },
            [
                middleware::instrument(),
                Middleware::guard(|_ctx, e: &OrderPlaced| {
                    if e.order_id.is_empty() {
                        return Err(Error::custom("order without id"));
                    }
                    Ok(e.amount > 0)
                }),
            ],
        )
        .handle(|ctx, e: &PaymentReceived| {
            let line = ctx.value::<LineNo>().map_or(0, |l| l.0);
            println!(
                "Payment received: {} for order {} (line {})",
                e.amount, e.order_id, line
            );
            Ok(())
        })
        .seal();

    let chain = [middleware::logging(), middleware::timing()];
    let base = Context::new();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut line_no = 0;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }

        let envelope: Envelope = match serde_json::from_str(&line) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!("Line {}: invalid envelope: {}", line_no, e);
                continue;
            }
        };

        let data = Bytes::from(serde_json::to_vec(&envelope.data)?);
        let ctx = base.with_value(LineNo(line_no));

        match registry.route(&ctx, &envelope.kind, data, &chain) {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::warn!("Line {}: no route: {}", line_no, e)
            }
            Err(e @ Error::DataTypeNotSupported { .. }) => {
                tracing::error!("Line {}: factory misconfigured: {}", line_no, e)
            }
            Err(Error::Json(e)) => {
                tracing::warn!("Line {}: bad payload for {}: {}", line_no, envelope.kind, e)
            }
            Err(e) => tracing::error!("Line {}: {}", line_no, e),
        }
    }

    Ok(())
}
