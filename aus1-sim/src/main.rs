// AUS1 loopback demo: one controller and one peripheral on an in-memory bus.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{bail, Result};
use aus1_core::{Controller, Crc32, Peripheral};
use aus1_sim::{config, step, Link, SimClock};
use tracing::info;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Upper bound on sim ticks before a run is declared stuck.
const MAX_TICKS: u64 = 10_000;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    for arg in std::env::args().skip(1) {
        if arg == "--version" || arg == "-V" {
            println!("aus1-sim {VERSION}");
            return Ok(());
        }
    }

    let cfg = config::load();
    info!(
        payload_size = cfg.payload_size,
        timeout_ms = cfg.timeout_ms,
        "starting loopback run"
    );

    let link = Link::new();
    let clock = SimClock::new();

    let mut controller: Controller<_, Crc32, _> =
        Controller::new(link.controller_port(), clock.clone());
    controller.set_timeout_period(Duration::from_millis(cfg.timeout_ms));

    let payload: Vec<u8> = (0..cfg.payload_size).map(|i| i as u8).collect();
    let served = payload.clone();
    let mut peripheral: Peripheral<_, Crc32> = Peripheral::new(
        link.peripheral_port(),
        0x0000_0007,
        0x0003,
        Box::new(move || served.clone()),
    );

    // Let the heartbeat discover the peripheral.
    let mut ticks = 0u64;
    while !controller.connected() {
        if ticks >= MAX_TICKS {
            bail!("peripheral never answered a ping");
        }
        step(&link, &clock, &mut controller, &mut peripheral);
        ticks += 1;
    }
    info!(
        device_type = controller.device_type(),
        device_version = controller.device_version(),
        "peripheral detected"
    );

    let result = Rc::new(RefCell::new(None));
    let sink = result.clone();
    controller.request_data(Box::new(move |buf, logical, physical| {
        *sink.borrow_mut() = Some((buf, logical, physical));
    }));

    let (buf, logical, physical) = loop {
        if let Some(outcome) = result.borrow_mut().take() {
            break outcome;
        }
        if ticks >= MAX_TICKS {
            bail!("transfer never completed");
        }
        step(&link, &clock, &mut controller, &mut peripheral);
        ticks += 1;
    };
    let Some(buf) = buf else {
        bail!("transfer failed checksum verification");
    };
    if &buf[..logical] != payload.as_slice() {
        bail!("received payload does not match what the peripheral served");
    }
    info!(logical, physical, ticks, "transfer verified");
    Ok(())
}
