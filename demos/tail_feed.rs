//! Tail the combined feed of a gateway
//!
//! Reads `FACILITY_STREAM_*` variables for the gateway address and tuning,
//! then prints the latest event of every flush and every status change until Ctrl-C.
//!
//! ```text
//! FACILITY_STREAM_BASE_URL=http://localhost:8080 RUST_LOG=facility_stream=debug \
//!     cargo run --example tail_feed -- greenhouse-1
//! ```

use anyhow::Context;
use facility_stream::{FacilityStream, StreamEvent};
use futures::StreamExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let facility = std::env::args().nth(1);
    let streams = FacilityStream::from_env().context("invalid FACILITY_STREAM_* configuration")?;
    let feed = streams.combined(facility.as_deref())?;

    println!("Tailing {}", feed.endpoint().url());
    feed.connect().await?;

    let mut updates = feed.updates().skip(1);
    let mut statuses = feed.status_updates();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some(status) = statuses.next() => {
                match &status.error {
                    Some(error) => println!("[{}] {}", status.label(), error),
                    None => println!("[{}] attempt {}", status.label(), status.attempt),
                }
            }
            Some(snapshot) = updates.next() => {
                if let Some(latest) = &snapshot.latest {
                    print!("flush #{} ({} buffered) ", snapshot.flush_count, snapshot.items.len());
                    print_event(latest);
                }
            }
        }
    }

    feed.disconnect().await?;
    Ok(())
}

fn print_event(event: &StreamEvent) {
    match event {
        StreamEvent::Measurement(m) => println!(
            "measurement {} {} = {:?} {}",
            m.sensor_name.as_deref().unwrap_or("?"),
            m.parameter_type.as_deref().unwrap_or("?"),
            m.value,
            m.unit.as_deref().unwrap_or("")
        ),
        StreamEvent::Alert(a) => {
            println!("alert [{}] {}", a.severity, a.message.as_deref().unwrap_or(""))
        }
        StreamEvent::EquipmentStatus(e) => println!(
            "equipment {} {} -> {}",
            e.equipment_name.as_deref().unwrap_or("?"),
            e.previous_status.as_deref().unwrap_or("?"),
            e.status.as_deref().unwrap_or("?")
        ),
    }
}
