pub mod api_client;
pub mod cache;
pub mod orchestrator;

use async_trait::async_trait;

use crate::core::errors::TranslationResult;

pub use api_client::HttpTranslator;
pub use cache::{CachedTranslation, TranslationCache};
pub use orchestrator::{OrchestratorSettings, TranslationOrchestrator};

/// External machine-translation backend.
///
/// Errors are not classified as transient or permanent; callers retry uniformly.
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> TranslationResult<String>;
}
