//! Samsung Frame TV art-mode websocket client.
//!
//! Speaks the `com.samsung.art-app` channel on port 8001: requests go out as
//! `art_app_request` envelopes, replies come back as `d2d_service_message`
//! events whose `data` field is a JSON string. Image bytes travel over a
//! side-channel TCP socket announced in the `ready_to_use` event.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::{parse_catalog, ArtError, ArtItem, ArtSession, Result};

/// Port of the cleartext websocket API.
const WS_PORT: u16 = 8001;

/// Client name announced to the TV (base64 of `weatherart`).
const CLIENT_NAME: &str = "weatherart";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An open art-mode session.
pub struct FrameTv {
    channel: Mutex<WsStream>,
    timeout: Duration,
}

impl FrameTv {
    /// Check the TV over REST, then open the art-app websocket channel.
    pub async fn connect(ip: &str, timeout_s: u64) -> Result<Self> {
        let timeout = Duration::from_secs(timeout_s);

        let info = device_info(ip, timeout).await?;
        let name = info
            .pointer("/device/name")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown");
        log::info!("Connection successful! TV Name: {name}");

        let encoded_name =
            base64::Engine::encode(&base64::engine::general_purpose::STANDARD, CLIENT_NAME);
        let url = format!("ws://{ip}:{WS_PORT}/api/v2/channels/com.samsung.art-app?name={encoded_name}");
        let (mut ws, _) = tokio::time::timeout(timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| ArtError::Device(format!("timed out connecting to {ip}")))??;

        // The TV greets with ms.channel.connect before accepting requests.
        wait_for_outer_event(&mut ws, "ms.channel.connect", Some(timeout)).await?;

        Ok(Self {
            channel: Mutex::new(ws),
            timeout,
        })
    }
}

#[async_trait]
impl ArtSession for FrameTv {
    async fn available(&self, category: Option<&str>) -> Result<Vec<ArtItem>> {
        let mut payload = json!({ "request": "get_content_list" });
        if let Some(category) = category {
            payload["category"] = json!(category);
        }
        let mut ws = self.channel.lock().await;
        let data = art_request(&mut ws, payload, &["content_list"], Some(self.timeout)).await?;

        // content_list arrives as a JSON string, not an inline array.
        let raw = match data.get("content_list") {
            Some(Value::String(text)) => serde_json::from_str(text)?,
            Some(other) => other.clone(),
            None => Value::Null,
        };
        Ok(parse_catalog(&raw))
    }

    async fn upload(&self, path: &Path, matte: &str) -> Result<String> {
        let bytes = tokio::fs::read(path).await?;
        let file_type = match path.extension().and_then(|e| e.to_str()) {
            Some("jpg") | Some("jpeg") => "jpg",
            _ => "png",
        };

        let payload = json!({
            "request": "send_image",
            "file_type": file_type,
            "conn_info": {
                "d2d_mode": "socket",
                "connection_id": rand::random::<u32>(),
                "id": uuid::Uuid::new_v4().to_string(),
            },
            "image_date": chrono::Local::now().format("%Y:%m:%d %H:%M:%S").to_string(),
            "matte_id": matte,
            "file_size": bytes.len(),
        });

        // Hold the channel for the whole conversation: ready_to_use, the
        // side-channel transfer, then the image_added acknowledgement.
        let mut ws = self.channel.lock().await;
        let ready = art_request(&mut ws, payload, &["ready_to_use"], Some(self.timeout)).await?;
        let conn_info: Value = match ready.get("conn_info") {
            Some(Value::String(text)) => serde_json::from_str(text)?,
            Some(other) => other.clone(),
            None => return Err(ArtError::Device("ready_to_use without conn_info".into())),
        };

        send_image_bytes(&conn_info, file_type, &bytes, self.timeout).await?;

        // The image_added event has no bound: the TV may simply never send
        // it. The caller guards this with its own upload timeout.
        let added = wait_for_art_event(&mut ws, &["image_added"], None).await?;
        added
            .get("content_id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| ArtError::Device("image_added without content_id".into()))
    }

    async fn select_image(&self, content_id: &str, category: Option<&str>) -> Result<()> {
        let mut payload = json!({
            "request": "select_image",
            "content_id": content_id,
            "show": true,
        });
        if let Some(category) = category {
            payload["category_id"] = json!(category);
        }
        let mut ws = self.channel.lock().await;
        art_request(&mut ws, payload, &["select_image"], Some(self.timeout)).await?;
        Ok(())
    }

    async fn delete(&self, content_id: &str) -> Result<()> {
        self.delete_list(std::slice::from_ref(&content_id.to_string()))
            .await
    }

    async fn delete_list(&self, content_ids: &[String]) -> Result<()> {
        let list: Vec<Value> = content_ids
            .iter()
            .map(|id| json!({ "content_id": id }))
            .collect();
        let payload = json!({
            "request": "delete_image_list",
            "content_id_list": list,
        });
        let mut ws = self.channel.lock().await;
        art_request(&mut ws, payload, &["delete_image_list"], Some(self.timeout)).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        // try_lock: an abandoned upload may hold the channel indefinitely,
        // and close is best-effort by contract.
        match self.channel.try_lock() {
            Ok(mut ws) => {
                ws.close(None).await?;
                Ok(())
            }
            Err(_) => Err(ArtError::Device("art channel busy, not closed".into())),
        }
    }
}

/// REST device info request, also the connectivity check.
async fn device_info(ip: &str, timeout: Duration) -> Result<Value> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let info = client
        .get(format!("http://{ip}:{WS_PORT}/api/v2/"))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(info)
}

/// Send one art-app request and wait for the expected reply event.
async fn art_request(
    ws: &mut WsStream,
    mut payload: Value,
    expect: &[&str],
    timeout: Option<Duration>,
) -> Result<Value> {
    payload["id"] = json!(uuid::Uuid::new_v4().to_string());
    payload["request_id"] = payload["id"].clone();
    let envelope = json!({
        "method": "ms.channel.emit",
        "params": {
            "event": "art_app_request",
            "to": "host",
            "data": payload.to_string(),
        }
    });
    ws.send(Message::text(envelope.to_string())).await?;
    wait_for_art_event(ws, expect, timeout).await
}

/// Read until a `d2d_service_message` whose inner event matches `expect`.
///
/// An inner `error` event is surfaced as a device error. `timeout` bounds
/// each read; `None` waits indefinitely (upload acknowledgement).
async fn wait_for_art_event(
    ws: &mut WsStream,
    expect: &[&str],
    timeout: Option<Duration>,
) -> Result<Value> {
    loop {
        let outer = next_json(ws, timeout).await?;
        if outer.get("event").and_then(|v| v.as_str()) != Some("d2d_service_message") {
            continue;
        }
        let data: Value = match outer.get("data") {
            Some(Value::String(text)) => serde_json::from_str(text)?,
            Some(other) => other.clone(),
            None => continue,
        };
        match data.get("event").and_then(|v| v.as_str()) {
            Some("error") => {
                let message = data
                    .get("error_code")
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "unspecified art-app error".to_string());
                return Err(ArtError::Device(message));
            }
            Some(event) if expect.contains(&event) => return Ok(data),
            _ => continue,
        }
    }
}

/// Read until a matching top-level channel event (connection handshake).
async fn wait_for_outer_event(
    ws: &mut WsStream,
    expect: &str,
    timeout: Option<Duration>,
) -> Result<Value> {
    loop {
        let outer = next_json(ws, timeout).await?;
        if outer.get("event").and_then(|v| v.as_str()) == Some(expect) {
            return Ok(outer);
        }
    }
}

/// Next text frame parsed as JSON; non-text frames are skipped.
async fn next_json(ws: &mut WsStream, timeout: Option<Duration>) -> Result<Value> {
    loop {
        let read = ws.next();
        let message = match timeout {
            Some(bound) => tokio::time::timeout(bound, read)
                .await
                .map_err(|_| ArtError::Device("timed out waiting for TV response".into()))?,
            None => read.await,
        };
        let message = message.ok_or_else(|| ArtError::Device("art channel closed".into()))??;
        if let Message::Text(text) = message {
            return Ok(serde_json::from_str(text.as_str())?);
        }
    }
}

/// Push the image bytes over the side-channel socket from `ready_to_use`.
/// TCP port for the image transfer, from the `ready_to_use` conn_info.
///
/// The TV sends it as a number or a decimal string depending on firmware.
fn conn_port(conn_info: &Value) -> Result<u16> {
    let port = conn_info
        .get("port")
        .and_then(|v| v.as_u64())
        .or_else(|| {
            conn_info
                .get("port")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse().ok())
        })
        .ok_or_else(|| ArtError::Device("conn_info without port".into()))?;
    u16::try_from(port).map_err(|_| ArtError::Device(format!("conn_info port out of range: {port}")))
}

async fn send_image_bytes(
    conn_info: &Value,
    file_type: &str,
    bytes: &[u8],
    timeout: Duration,
) -> Result<()> {
    let ip = conn_info
        .get("ip")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ArtError::Device("conn_info without ip".into()))?;
    let port = conn_port(conn_info)?;
    let sec_key = conn_info.get("key").and_then(|v| v.as_str()).unwrap_or("");

    let header = json!({
        "num": 0,
        "total": 1,
        "fileLength": bytes.len(),
        "fileName": "dummy",
        "fileType": file_type,
        "secKey": sec_key,
        "version": "0.0.1",
    })
    .to_string();

    let mut socket = tokio::time::timeout(timeout, TcpStream::connect((ip, port)))
        .await
        .map_err(|_| ArtError::Device("timed out opening image transfer socket".into()))??;
    socket
        .write_all(&(header.len() as u32).to_be_bytes())
        .await?;
    socket.write_all(header.as_bytes()).await?;
    socket.write_all(bytes).await?;
    socket.flush().await?;
    socket.shutdown().await?;
    Ok(())
}
