//! Resolves an agent's `settings.{stt,llm,tts}_provider` strings into
//! concrete provider instances, one of each capability per call.

use std::sync::Arc;

use callcore_providers::{
    AnthropicProvider, GenericRestTtsProvider, GenericWsSttProvider, LlmProvider, OllamaProvider,
    OpenAiProvider, SttProvider, SttVendor, TtsProvider, TtsVendor,
};

/// `settings.llm_provider` resolution: `"anthropic"` and `"ollama"` are
/// handled directly; anything else is looked up in the well-known
/// OpenAI-compatible registry, falling back to treating it as an
/// already-OpenAI-compatible base URL.
pub fn build_llm_provider(provider_id: &str, api_key: Option<&str>) -> Arc<dyn LlmProvider> {
    match provider_id {
        "anthropic" => Arc::new(AnthropicProvider::new(api_key.unwrap_or_default().to_string(), None)),
        "ollama" => Arc::new(OllamaProvider::new(None)),
        other => {
            if let Some(known) = callcore_providers::registry::KNOWN_PROVIDERS
                .iter()
                .find(|p| p.id == other)
            {
                Arc::new(OpenAiProvider::new(
                    api_key.unwrap_or_default().to_string(),
                    Some(known.base_url.to_string()),
                ))
            } else {
                Arc::new(OpenAiProvider::new(api_key.unwrap_or_default().to_string(), None))
            }
        }
    }
}

/// `settings.stt_provider` resolution. Unrecognized names fall back to
/// `VendorA` rather than failing the call outright — STT is critical-path
/// so a call still connects, just against a default adapter.
pub fn build_stt_provider(provider_id: Option<&str>) -> Arc<dyn SttProvider> {
    let vendor = match provider_id {
        Some("vendor-b") => SttVendor::VendorB,
        Some("vendor-c") => SttVendor::VendorC,
        _ => SttVendor::VendorA,
    };
    Arc::new(GenericWsSttProvider::new(vendor))
}

/// `settings.tts_provider` resolution.
pub fn build_tts_provider(provider_id: Option<&str>, base_url: &str) -> Arc<dyn TtsProvider> {
    let vendor = match provider_id {
        Some("streaming") => TtsVendor::Streaming,
        _ => TtsVendor::RestBatch,
    };
    Arc::new(GenericRestTtsProvider::new(vendor, base_url))
}
