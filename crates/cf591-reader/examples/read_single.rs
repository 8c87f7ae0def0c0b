//! Read one tag through the full controller stack.
//!
//! Uses the scripted mock driver so it runs without hardware; swap in the
//! vendor-backed driver implementation to talk to a real reader.
//!
//! ```sh
//! RUST_LOG=cf591_reader=debug cargo run -p cf591-reader --example read_single
//! ```

use std::time::Duration;

use cf591_driver::Endpoint;
use cf591_driver::mock::MockDriver;
use cf591_reader::{ReadRange, Reader, ReaderOptions};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> cf591_core::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let (driver, control) = MockDriver::new();
    // Script the field: quiet for two polls, then a tag walks in.
    control.push_poll_timeouts(2);
    control.push_tag(
        &[0xE2, 0x00, 0x42, 0x17, 0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF],
        -412,
        1,
        7,
    );

    let mut reader = Reader::connect(
        driver,
        Endpoint::serial("/dev/ttyUSB0"),
        ReaderOptions::default(),
    )
    .await?;

    reader.set_range(ReadRange::Medium).await?;

    match reader.read_single(Duration::from_secs(5)).await? {
        Some(tag) => println!(
            "tag {} at {:.1} dBm (antenna {}, channel {})",
            tag.epc_hex(),
            tag.rssi_dbm,
            tag.antenna,
            tag.channel
        ),
        None => println!("no tag within the timeout"),
    }

    reader.disconnect().await;
    Ok(())
}
