//! WiFi station bring-up and credential storage for the network-config run
//! mode.

use anyhow::anyhow;
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::modem::Modem,
    nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault},
    wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi},
};
use log::info;

/// Credentials for a freshly flashed device; the HTTP form stores
/// replacements in NVS.
const DEFAULT_SSID: &str = "SUNSHINECDG";
const DEFAULT_PASS: &str = "sunshine_cdg2015";

const KEY_WIFI_SSID: &str = "wifi_ssid";
const KEY_WIFI_PASS: &str = "wifi_pass";

/// Load credentials stored by the form, if any.
pub fn load_credentials(nvs: &EspNvs<NvsDefault>) -> Option<(String, String)> {
    let mut ssid_buf = [0u8; 64];
    let mut pass_buf = [0u8; 128];

    let ssid = nvs.get_str(KEY_WIFI_SSID, &mut ssid_buf).ok()??;
    let pass = nvs.get_str(KEY_WIFI_PASS, &mut pass_buf).ok()??;

    if ssid.is_empty() {
        return None;
    }
    Some((ssid.to_string(), pass.to_string()))
}

/// Persist credentials; they apply on the next boot.
pub fn save_credentials(
    nvs: &mut EspNvs<NvsDefault>,
    ssid: &str,
    pass: &str,
) -> anyhow::Result<()> {
    nvs.set_str(KEY_WIFI_SSID, ssid)?;
    nvs.set_str(KEY_WIFI_PASS, pass)?;
    info!("WiFi credentials saved for SSID '{ssid}'");
    Ok(())
}

/// Join the configured network as a station and block until the netif is up.
pub fn connect(
    modem: Modem,
    sysloop: EspSystemEventLoop,
    nvs: EspDefaultNvsPartition,
    creds: Option<(String, String)>,
) -> anyhow::Result<BlockingWifi<EspWifi<'static>>> {
    let (ssid, pass) =
        creds.unwrap_or_else(|| (DEFAULT_SSID.to_string(), DEFAULT_PASS.to_string()));

    let mut wifi = BlockingWifi::wrap(
        EspWifi::new(modem, sysloop.clone(), Some(nvs))?,
        sysloop,
    )?;

    let config = Configuration::Client(ClientConfiguration {
        ssid: ssid
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("SSID too long"))?,
        password: pass
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("password too long"))?,
        auth_method: AuthMethod::WPA2Personal,
        ..Default::default()
    });

    wifi.set_configuration(&config)?;
    wifi.start()?;

    info!("connecting to '{ssid}'...");
    wifi.connect()?;
    wifi.wait_netif_up()?;

    info!("WiFi up, IP: {:?}", wifi.wifi().sta_netif().get_ip_info()?);
    Ok(wifi)
}
