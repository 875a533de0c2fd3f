//! esp32-nimble wiring: GATT service registration, GAP callbacks and the
//! advertising controller.
//!
//! The NimBLE host performs its own two-phase service registration and sync
//! handling internally; callbacks installed here run on its FreeRTOS task
//! and must stay short, which the bounded parse + pin set + log work is.

use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use esp32_nimble::{
    utilities::{mutex::Mutex as BleMutex, BleUuid},
    BLEAdvertisementData, BLEAdvertising, BLEDevice, NimbleProperties,
};
use log::{debug, error, info, warn};

use crate::{
    actuator::{self, Switch},
    command::{self, Command, CMD_BUF_LEN},
    gap::{Action, GapEvent, Session},
};

const SERVICE_UUID: BleUuid = BleUuid::Uuid16(0x0180);
const READ_CHR_UUID: BleUuid = BleUuid::Uuid16(0xFEF4);
const WRITE_CHR_UUID: BleUuid = BleUuid::Uuid16(0xDEAD);

/// Fixed payload served on the read characteristic.
const READ_PAYLOAD: &[u8] = b"Data from the server";

/// Handle onto the running BLE peripheral: restart advertising, rename the
/// device. Cloneable so the HTTP path can own one.
#[derive(Clone)]
pub struct BleHandle {
    advertising: &'static BleMutex<BLEAdvertising>,
    session: Arc<Mutex<Session>>,
}

impl BleHandle {
    /// Restart advertising with the current session name. Safe to call while
    /// already advertising; the stack is stopped and restarted.
    pub fn advertise(&self) {
        if let Ok(mut session) = self.session.lock() {
            session.advertising_started();
            restart_advertising(self.advertising, session.name());
        }
    }

    /// Rename the device and re-advertise, as one transaction: the session
    /// lock is held across both so no advertisement ever carries a stale
    /// name.
    pub fn set_device_name(&self, name: &str) -> anyhow::Result<()> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow!("GAP session lock poisoned"))?;
        session.set_name(name);
        BLEDevice::set_device_name(session.name())?;
        session.advertising_started();
        restart_advertising(self.advertising, session.name());
        info!("device renamed to '{}', advertising restarted", session.name());
        Ok(())
    }
}

/// Bring up the BLE peripheral: device, GAP callbacks, the single service
/// with its two characteristics, and the first advertisement.
pub fn start(
    light: impl Switch + 'static,
    fan: impl Switch + 'static,
) -> anyhow::Result<BleHandle> {
    let session = Arc::new(Mutex::new(Session::new()));

    let device = BLEDevice::take();
    BLEDevice::set_device_name(crate::gap::DEFAULT_NAME)?;
    let advertising = device.get_advertising();

    let server = device.get_server();
    // Re-advertising is owned by the session state machine, not the stack.
    server.advertise_on_disconnect(false);

    {
        let session = session.clone();
        server.on_connect(move |_server, desc| {
            info!("client connected: {:?}", desc);
            if let Ok(mut session) = session.lock() {
                // esp32-nimble only surfaces successful connects; failed
                // attempts come back as a disconnect.
                session.handle_event(GapEvent::Connected { status: 0 });
                debug!("link state: {:?}", session.state());
            }
        });
    }

    {
        let session = session.clone();
        server.on_disconnect(move |_desc, reason| {
            info!("client disconnected ({:?})", reason);
            if let Ok(mut session) = session.lock() {
                if session.handle_event(GapEvent::Disconnected) == Action::Advertise {
                    restart_advertising(advertising, session.name());
                }
            }
        });
    }

    let service = server.create_service(SERVICE_UUID);

    let read_chr = service
        .lock()
        .create_characteristic(READ_CHR_UUID, NimbleProperties::READ);
    read_chr.lock().set_value(READ_PAYLOAD);

    let write_chr = service
        .lock()
        .create_characteristic(WRITE_CHR_UUID, NimbleProperties::WRITE);
    {
        let actuators = Mutex::new((light, fan));
        write_chr.lock().on_write(move |args| {
            let data = args.recv_data();
            match command::parse(data) {
                Command::Unknown => {
                    // Accepted but ignored; the peer still sees success.
                    warn!(
                        "unknown command ({} bytes): {:?}",
                        data.len(),
                        String::from_utf8_lossy(&data[..data.len().min(CMD_BUF_LEN - 1)])
                    );
                }
                cmd => {
                    if let Ok(mut guard) = actuators.lock() {
                        let (light, fan) = &mut *guard;
                        actuator::apply(cmd, light, fan);
                    }
                }
            }
        });
    }

    let handle = BleHandle {
        advertising,
        session,
    };
    handle.advertise();
    info!("BLE ready, advertising as '{}'", crate::gap::DEFAULT_NAME);

    Ok(handle)
}

/// Stop, rebuild the advertisement fields from `name`, start again.
/// Connectable undirected + general discoverable with no expiration are the
/// stack defaults. A failed start is retried once: staying neither
/// advertising nor connected would strand the device.
fn restart_advertising(advertising: &BleMutex<BLEAdvertising>, name: &str) {
    let mut adv = advertising.lock();
    // "Not advertising" is fine here.
    let _ = adv.stop();
    if let Err(e) = adv.set_data(BLEAdvertisementData::new().name(name)) {
        warn!("failed to rebuild advertisement data: {e:?}");
    }
    if let Err(e) = adv.start() {
        warn!("advertising start failed ({e:?}), retrying once");
        if let Err(e) = adv.start() {
            error!("advertising restart failed: {e:?}");
        }
    }
}
