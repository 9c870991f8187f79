/// Connection settings for the Gemini provider. The key may be empty; the
/// provider still constructs and every call fails upstream with the
/// provider's own authentication error, which keeps a missing credential a
/// runtime condition instead of a startup crash.
#[derive(Debug, Clone)]
pub struct GeminiProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
}

impl GeminiProviderConfig {
    pub fn new<S: Into<String>>(host: S, api_key: S, model: S) -> Self {
        Self {
            host: host.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}
