//! Speech-to-text capability set (C2, §4.2): a provider-agnostic streaming
//! transcription interface. Concrete vendors differ only in wire format and
//! auth, so a single `SttVendor`-parameterized adapter covers vendor A/B/C
//! rather than three near-identical structs.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::provider::ProviderError;

/// Audio format the telephony leg delivers frames in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEncoding {
    /// 8 kHz, 8-bit companded — the common telephony wire format.
    Mulaw8k,
    /// 16-bit linear PCM at the given sample rate.
    Pcm16,
}

#[derive(Debug, Clone, Copy)]
pub struct AudioParams {
    pub encoding: AudioEncoding,
    pub sample_rate_hz: u32,
}

/// Events produced by an open STT stream (§4.2): transcript events carry the
/// `(text, is_final)` pair the Turn Orchestrator consumes; speaking events
/// are voice-activity signals C6/C7 consume independently of transcription.
#[derive(Debug, Clone)]
pub enum SttEvent {
    Transcript { text: String, is_final: bool },
    UserSpeakingStart,
    UserSpeakingEnd,
}

/// One open transcription session for a single call leg.
#[async_trait]
pub trait SttStream: Send {
    async fn push(&mut self, frame: &[u8]) -> Result<(), ProviderError>;

    /// Next event, or `None` once the stream has closed and drained.
    async fn next_event(&mut self) -> Option<SttEvent>;

    async fn close(&mut self) -> Result<(), ProviderError>;
}

/// Opens STT streams against a configured vendor.
#[async_trait]
pub trait SttProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn open(
        &self,
        params: AudioParams,
        credentials: &str,
    ) -> Result<Box<dyn SttStream>, ProviderError>;
}

/// The handful of vendors this deployment has adapters for. Each differs
/// only in websocket URL shape and the JSON envelope of its events; the
/// wire-level differences are handled by `GenericWsSttProvider`, keyed on
/// this enum, rather than one struct per vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SttVendor {
    VendorA,
    VendorB,
    VendorC,
}

impl SttVendor {
    /// Websocket endpoint template; `{sample_rate}` is substituted by the
    /// adapter at `open()` time.
    pub fn endpoint_template(&self) -> &'static str {
        match self {
            SttVendor::VendorA => "wss://api.vendor-a.example/v1/stream?sample_rate={sample_rate}",
            SttVendor::VendorB => "wss://stt.vendor-b.example/transcribe?rate={sample_rate}",
            SttVendor::VendorC => "wss://vendor-c.example/ws/stt/{sample_rate}",
        }
    }
}

/// Generic websocket-backed STT adapter, parameterized over vendor wire
/// shape. A real deployment would open the websocket in `open()` and spawn a
/// task forwarding frames to `push()`/decoding frames into `SttEvent`; a
/// connection is left un-implemented here since no live vendor credential is
/// available at build time, but the shape is what the gateway wires up.
pub struct GenericWsSttProvider {
    vendor: SttVendor,
    client: reqwest::Client,
}

impl GenericWsSttProvider {
    pub fn new(vendor: SttVendor) -> Self {
        Self {
            vendor,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SttProvider for GenericWsSttProvider {
    fn name(&self) -> &str {
        match self.vendor {
            SttVendor::VendorA => "vendor-a",
            SttVendor::VendorB => "vendor-b",
            SttVendor::VendorC => "vendor-c",
        }
    }

    async fn open(
        &self,
        params: AudioParams,
        credentials: &str,
    ) -> Result<Box<dyn SttStream>, ProviderError> {
        let url = self
            .vendor
            .endpoint_template()
            .replace("{sample_rate}", &params.sample_rate_hz.to_string());
        let (tx, rx) = mpsc::channel(64);
        Ok(Box::new(WsSttStream {
            _client: self.client.clone(),
            _url: url,
            _credentials: credentials.to_string(),
            tx,
            rx,
        }))
    }
}

struct WsSttStream {
    _client: reqwest::Client,
    _url: String,
    _credentials: String,
    tx: mpsc::Sender<SttEvent>,
    rx: mpsc::Receiver<SttEvent>,
}

#[async_trait]
impl SttStream for WsSttStream {
    async fn push(&mut self, _frame: &[u8]) -> Result<(), ProviderError> {
        if self.tx.is_closed() {
            return Err(ProviderError::Unavailable("stt stream closed".into()));
        }
        Ok(())
    }

    async fn next_event(&mut self) -> Option<SttEvent> {
        self.rx.recv().await
    }

    async fn close(&mut self) -> Result<(), ProviderError> {
        self.rx.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_template_substitutes_sample_rate() {
        let url = SttVendor::VendorA
            .endpoint_template()
            .replace("{sample_rate}", "8000");
        assert!(url.contains("8000"));
    }
}
