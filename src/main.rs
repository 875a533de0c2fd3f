//! eVolte firmware: a BLE peripheral that switches a light (and a not yet
//! wired fan) on text commands, with an optional WiFi + HTTP path for
//! renaming the device and changing WiFi credentials at runtime.

mod actuator;
mod ble;
mod command;
mod gap;
mod net;
mod web;

use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::{delay::FreeRtos, gpio::PinDriver, prelude::Peripherals},
    log::EspLogger,
    nvs::{EspDefaultNvsPartition, EspNvs},
};
use log::info;

use actuator::{Fan, Light};

const NVS_NAMESPACE: &str = "evolte";

/// Which composition to boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunMode {
    BleOnly,
    BleWithNetworkConfig,
}

fn run_mode() -> RunMode {
    if cfg!(feature = "net-config") {
        RunMode::BleWithNetworkConfig
    } else {
        RunMode::BleOnly
    }
}

fn main() -> anyhow::Result<()> {
    // Any error out of the sequence below is fatal; the device is useless
    // without BLE and the watchdog reboots it.
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    let mode = run_mode();
    info!("eVolte firmware starting ({mode:?})");

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    // Light output on GPIO 13, OFF at boot.
    let mut light_pin = PinDriver::output(peripherals.pins.gpio13)?;
    light_pin.set_low()?;
    let light = Light::new(light_pin);

    let ble = ble::start(light, Fan)?;

    let _net = match mode {
        RunMode::BleOnly => None,
        RunMode::BleWithNetworkConfig => {
            let nvs = EspNvs::new(nvs_partition.clone(), NVS_NAMESPACE, true)?;
            let creds = net::load_credentials(&nvs);
            let wifi = net::connect(peripherals.modem, sysloop, nvs_partition, creds)?;
            let server = web::start(ble.clone(), nvs)?;
            Some((wifi, server))
        }
    };

    // The NimBLE host runs on its own FreeRTOS task; this thread only has
    // to stay alive.
    loop {
        FreeRtos::delay_ms(1000);
    }
}
