//! HTTP configuration form: rename the BLE device, store WiFi credentials.

use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use esp_idf_svc::{
    http::{
        server::{Configuration as HttpConfig, EspHttpServer},
        Method,
    },
    io::{Read, Write},
    nvs::{EspNvs, NvsDefault},
};
use log::info;

use crate::{ble::BleHandle, net};

const INDEX_HTML: &str = include_str!("index.html");

/// Longest body either form can legitimately send.
const MAX_BODY_LEN: usize = 256;

/// Start the configuration server. The returned server must be kept alive.
pub fn start(ble: BleHandle, nvs: EspNvs<NvsDefault>) -> anyhow::Result<EspHttpServer<'static>> {
    let mut server = EspHttpServer::new(&HttpConfig::default())?;
    let nvs = Arc::new(Mutex::new(nvs));

    server.fn_handler("/", Method::Get, |req| -> anyhow::Result<()> {
        req.into_ok_response()?.write_all(INDEX_HTML.as_bytes())?;
        Ok(())
    })?;

    server.fn_handler::<anyhow::Error, _>("/set_name", Method::Post, move |mut req| {
        let body = read_body(&mut req)?;
        let body = core::str::from_utf8(&body).map_err(|_| anyhow!("name is not UTF-8"))?;
        // Either the browser form ("name=...") or a bare body, the way the
        // companion app posts it.
        let name = form_field(body, "name").unwrap_or_else(|| body.trim().to_string());
        if name.is_empty() {
            req.into_response(400, Some("Bad Request"), &[])?
                .write_all(b"empty name")?;
            return Ok(());
        }

        info!("HTTP rename to '{name}'");
        ble.set_device_name(&name)?;
        req.into_ok_response()?.write_all(b"BLE name updated")?;
        Ok(())
    })?;

    server.fn_handler::<anyhow::Error, _>("/set_wifi", Method::Post, move |mut req| {
        let body = read_body(&mut req)?;
        let body = core::str::from_utf8(&body).map_err(|_| anyhow!("form is not UTF-8"))?;
        let (ssid, pass) = match (form_field(body, "ssid"), form_field(body, "pass")) {
            (Some(ssid), Some(pass)) if !ssid.is_empty() => (ssid, pass),
            _ => {
                req.into_response(400, Some("Bad Request"), &[])?
                    .write_all(b"missing ssid or pass")?;
                return Ok(());
            }
        };

        let mut nvs = nvs
            .lock()
            .map_err(|_| anyhow!("NVS lock poisoned"))?;
        net::save_credentials(&mut nvs, &ssid, &pass)?;
        req.into_ok_response()?
            .write_all(b"WiFi credentials saved; restart to apply")?;
        Ok(())
    })?;

    info!("HTTP configuration form ready");
    Ok(server)
}

fn read_body(
    req: &mut esp_idf_svc::http::server::Request<
        &mut esp_idf_svc::http::server::EspHttpConnection<'_>,
    >,
) -> anyhow::Result<Vec<u8>> {
    let len = req.content_len().unwrap_or(0) as usize;
    if len == 0 || len > MAX_BODY_LEN {
        return Err(anyhow!("bad request body length: {len}"));
    }
    let mut body = vec![0_u8; len];
    req.read_exact(&mut body)?;
    Ok(body)
}

/// Pull one field out of an urlencoded form body.
fn form_field(body: &str, key: &str) -> Option<String> {
    body.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == key).then(|| urldecode(v))
    })
}

fn urldecode(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                if let Some(hex) = value.get(i + 1..i + 3) {
                    if let Ok(byte) = u8::from_str_radix(hex, 16) {
                        out.push(byte);
                        i += 3;
                        continue;
                    }
                }
                out.push(b'%');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_field_extracts_and_decodes() {
        let body = "name=Kitchen+Light&other=x";
        assert_eq!(form_field(body, "name").as_deref(), Some("Kitchen Light"));
        assert_eq!(form_field(body, "other").as_deref(), Some("x"));
        assert_eq!(form_field(body, "missing"), None);
    }

    #[test]
    fn percent_escapes_are_decoded() {
        assert_eq!(urldecode("a%20b%26c"), "a b&c");
        assert_eq!(urldecode("100%"), "100%");
        assert_eq!(urldecode("%zz"), "%zz");
    }

    #[test]
    fn wifi_form_round_trip() {
        let body = "ssid=MyNet&pass=s3cret%21";
        assert_eq!(form_field(body, "ssid").as_deref(), Some("MyNet"));
        assert_eq!(form_field(body, "pass").as_deref(), Some("s3cret!"));
    }
}
