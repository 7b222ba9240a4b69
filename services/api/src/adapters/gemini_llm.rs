//! services/api/src/adapters/gemini_llm.rs
//!
//! This module contains the adapter for the generative-text backend.
//! It implements the `TextGenerationService` port from the `core` crate by talking
//! to Gemini through its OpenAI-compatible chat completions endpoint.

const DRAFT_SYSTEM_INSTRUCTION: &str =
    "あなたは優秀なビジネスメール作成アシスタントです。日本語で自然かつ丁寧なメールを作成してください。";

const DRAFT_INPUT_TEMPLATE: &str = r#"あなたはプロのメールライターです。以下のプロンプトに基づいて、適切なメールの本文を**日本語で**作成してください。

制約事項:
- 件名は含めず、本文のみを出力してください。
- マークダウンのコードブロックは使用しないでください。
- プレースホルダー（例: [名前]）が必要な場合はそのまま残してください。

プロンプト: {prompt}"#;

const REFINE_SYSTEM_INSTRUCTION: &str =
    "あなたは優秀な編集者です。指定されたトーンに合わせて日本語の文章を推敲してください。マークダウンや挨拶等の余計な説明は省き、書き直した本文のみを返してください。";

const REFINE_INPUT_TEMPLATE: &str = r#"以下のメール本文を、「{tone}」トーンになるように**日本語で**書き直してください。
元のメッセージの意図や主要な内容は維持してください。

現在の本文:
{body}"#;

const DRAFT_TEMPERATURE: f32 = 0.7;
const REFINE_TEMPERATURE: f32 = 0.6;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use mailer_core::{
    domain::Tone,
    ports::{PortError, PortResult, TextGenerationService},
};
use tracing::{error, info, warn};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `TextGenerationService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct GeminiTextAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl GeminiTextAdapter {
    /// Creates a new `GeminiTextAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    /// Builds the client from the service configuration.
    ///
    /// Without an API key the adapter is still created; each call is then
    /// refused by the backend and reported as a generation error.
    pub fn from_settings(api_key: Option<&str>, api_base: &str, model: String) -> Self {
        if api_key.is_none() {
            warn!("No generation API key configured. AI drafting and refinement will fail.");
        }
        let config = OpenAIConfig::new()
            .with_api_key(api_key.unwrap_or_default())
            .with_api_base(api_base);
        Self::new(Client::with_config(config), model)
    }

    /// Sends one system + user exchange and returns the first choice's text.
    async fn complete(
        &self,
        system_instruction: &str,
        user_input: String,
        temperature: f32,
    ) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_instruction)
                .build()
                .map_err(|e| PortError::Generation(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_input)
                .build()
                .map_err(|e| PortError::Generation(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(temperature)
            .n(1)
            .build()
            .map_err(|e| PortError::Generation(e.to_string()))?;

        // Call the API and manually map the error, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Generation(e.to_string()))?;

        // An empty answer is a valid result, not an error.
        Ok(response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }
}

/// Embeds a free-form prompt into the drafting instruction.
pub fn draft_input(prompt: &str) -> String {
    DRAFT_INPUT_TEMPLATE.replace("{prompt}", prompt)
}

/// Embeds the current body and the tone's descriptive phrase into the rewrite instruction.
pub fn refine_input(body: &str, tone: Tone) -> String {
    REFINE_INPUT_TEMPLATE
        .replace("{tone}", tone.instruction())
        .replace("{body}", body)
}

//=========================================================================================
// `TextGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl TextGenerationService for GeminiTextAdapter {
    async fn generate_body(&self, prompt: &str) -> PortResult<String> {
        info!(model = %self.model, "Generating email body from prompt.");
        self.complete(DRAFT_SYSTEM_INSTRUCTION, draft_input(prompt), DRAFT_TEMPERATURE)
            .await
            .inspect_err(|e| error!("Draft generation error: {}", e))
    }

    async fn refine_body(&self, body: &str, tone: Tone) -> PortResult<String> {
        info!(model = %self.model, %tone, "Refining email body.");
        self.complete(REFINE_SYSTEM_INSTRUCTION, refine_input(body, tone), REFINE_TEMPERATURE)
            .await
            .inspect_err(|e| error!("Draft refinement error: {}", e))
    }
}
