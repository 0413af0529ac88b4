//! Bike dock controller binary.
//!
//! Wires the sensor pollers, the dock controller and the status lights
//! together and runs until Ctrl+C or SIGTERM.

mod config;
mod console;

use anyhow::{Context, Result};
use bikedock_controller::DockController;
use bikedock_core::DockId;
use bikedock_core::constants::EVENT_QUEUE_CAPACITY;
use bikedock_hardware::devices::{AnyBikeSensor, AnyCardReader, AnyOutputLine};
use bikedock_hardware::evdev::EvdevKeyboard;
use bikedock_hardware::mock::{MockBikeSensor, MockCardReader, MockOutputHandle, MockOutputLine};
use bikedock_hardware::sysfs::SysfsGpioLine;
use bikedock_hardware::{ActuatorBank, ChannelId, SensorKind, SensorManager, identity};
use bikedock_network::HttpAuthority;
use bikedock_storage::StateStore;
use clap::Parser;
use std::path::PathBuf;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::DockConfig;

/// Bike dock controller.
#[derive(Debug, Parser)]
#[command(name = "bikedock", version, about)]
struct Cli {
    /// Configuration file (JSON); defaults are used if it does not exist
    #[arg(short, long, default_value = "bikedock.json")]
    config: PathBuf,

    /// Use simulated devices driven from stdin instead of real hardware
    #[arg(long)]
    simulate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = DockConfig::load(&cli.config)?;

    let dock_id = match &config.dock_id {
        Some(id) => DockId::new(id.as_str()).context("invalid dock_id in configuration")?,
        None => identity::hardware_dock_id().context("deriving dock id from hardware")?,
    };

    info!(
        dock_id = %dock_id,
        authority = %config.authority.base_url,
        state_file = %config.state.path.display(),
        simulate = cli.simulate,
        "Bike dock starting"
    );

    let cancel = CancellationToken::new();

    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, initiating graceful shutdown");
        cancel_on_signal.cancel();
    });

    if let Err(e) = run(cli.simulate, config, dock_id, cancel).await {
        error!(error = %e, "Bike dock error");
        return Err(e);
    }

    info!("Bike dock shutdown complete");
    Ok(())
}

async fn run(
    simulate: bool,
    config: DockConfig,
    dock_id: DockId,
    cancel: CancellationToken,
) -> Result<()> {
    let authority = HttpAuthority::new(config.authority.clone(), dock_id.clone())
        .context("configuring authority client")?;
    let store = StateStore::new(config.state.clone()).context("configuring state store")?;

    let bank = if simulate {
        simulated_outputs(&config, &cancel)
    } else {
        gpio_outputs(&config)?
    };
    let actuators = bank.start(cancel.clone());

    let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    let mut sensors = SensorManager::new(events_tx, config.sensors.clone());
    if simulate {
        let (reader, reader_handle) = MockCardReader::new();
        let (sensor, sensor_handle) = MockBikeSensor::new();
        sensors.register_card_reader(reader.into());
        sensors.register_bike_sensor(sensor.into());

        let console_cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = console::run(reader_handle, sensor_handle, console_cancel).await {
                warn!(error = %e, "Simulation console stopped");
            }
        });
    } else {
        register_hardware_sensors(&mut sensors, &config).await;
    }
    let sensors = sensors.start(cancel.clone());

    let controller =
        DockController::restore(authority, store, actuators.panel(), config.controller.clone())
            .await;

    // the dock keeps serving with its persisted state if registration fails
    controller.register(&dock_id).await;

    let worker = tokio::spawn(controller.run(events_rx, cancel.clone()));

    cancel.cancelled().await;

    if let Err(e) = sensors.shutdown().await {
        warn!(error = %e, "Sensor shutdown reported an error");
    }
    let controller = worker.await.context("dock controller task failed")?;
    info!(state = %controller.state(), "Final dock state");

    actuators
        .shutdown()
        .await
        .context("shutting down actuators")?;

    Ok(())
}

/// Open one sysfs GPIO line per channel.
fn gpio_outputs(config: &DockConfig) -> Result<ActuatorBank> {
    let mut bank = ActuatorBank::new(config.actuators.clone());
    for channel in ChannelId::ALL {
        let pin = config.pins.pin(channel);
        let line = SysfsGpioLine::open_at(&config.pins.gpio_root, pin, channel.name())
            .with_context(|| format!("opening GPIO {pin} for {channel} channel"))?;
        bank.register(channel, AnyOutputLine::Sysfs(line));
    }
    Ok(bank)
}

/// Mock output lines whose level changes are logged.
fn simulated_outputs(config: &DockConfig, cancel: &CancellationToken) -> ActuatorBank {
    let mut bank = ActuatorBank::new(config.actuators.clone());
    for channel in ChannelId::ALL {
        let (line, handle) = MockOutputLine::new(channel.name());
        bank.register(channel, line.into());
        tokio::spawn(log_output(channel, handle, cancel.clone()));
    }
    bank
}

async fn log_output(channel: ChannelId, mut handle: MockOutputHandle, cancel: CancellationToken) {
    loop {
        for level in [true, false] {
            tokio::select! {
                _ = cancel.cancelled() => return,
                changed = handle.wait_for(level) => {
                    if changed.is_err() {
                        return;
                    }
                    info!(channel = %channel, on = level, "Output changed");
                }
            }
        }
    }
}

/// Open the configured input devices. A device that cannot be opened is
/// logged and left out.
async fn register_hardware_sensors(sensors: &mut SensorManager, config: &DockConfig) {
    let settings = &config.sensors;

    if sensors.is_enabled(SensorKind::CardReader) {
        match EvdevKeyboard::open(&settings.card_reader_path).await {
            Ok(reader) => sensors.register_card_reader(AnyCardReader::Evdev(reader)),
            Err(e) => error!(
                path = %settings.card_reader_path,
                error = %e,
                "Card reader unavailable"
            ),
        }
    }

    if sensors.is_enabled(SensorKind::BikeSensor) {
        match open_bike_sensor(&settings.bike_sensor_path, settings.bike_sensor_baud) {
            Ok(sensor) => sensors.register_bike_sensor(sensor),
            Err(e) => error!(
                path = %settings.bike_sensor_path,
                error = %e,
                "Bike sensor unavailable"
            ),
        }
    }
}

#[cfg(feature = "hardware-serial")]
fn open_bike_sensor(path: &str, baud_rate: u32) -> Result<AnyBikeSensor> {
    use bikedock_hardware::serial::SerialBikeSensor;

    Ok(AnyBikeSensor::Serial(SerialBikeSensor::open(path, baud_rate)?))
}

#[cfg(not(feature = "hardware-serial"))]
fn open_bike_sensor(_path: &str, _baud_rate: u32) -> Result<AnyBikeSensor> {
    anyhow::bail!("built without serial support (enable the hardware-serial feature)")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C"),
        () = terminate => info!("Received SIGTERM"),
    }
}
