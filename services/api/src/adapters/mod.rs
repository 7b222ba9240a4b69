pub mod gemini_llm;
pub mod settings_file;
pub mod webhook;

pub use gemini_llm::GeminiTextAdapter;
pub use settings_file::FileSettingsStore;
pub use webhook::WebhookDeliveryAdapter;
