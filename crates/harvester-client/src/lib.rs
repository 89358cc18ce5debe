pub mod cleaner;
pub mod fetcher;
pub mod llm;

pub use cleaner::HtmdCleaner;
pub use fetcher::NativeClient;
pub use llm::{AnthropicExtractor, ExtractionService, OpenAiExtractor};
