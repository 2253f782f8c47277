//! # Language Models
//!
//! This module provides a provider-agnostic interface for text generation: the
//! Generator Driver (`quarry-llama`) implements [`LanguageModel`] against a local
//! GGUF model, and `quarry-index`'s Prompt Composer builds the [`GenerationRequest`]
//! it is given.
//!
//! ## Core Components
//!
//! - **[`LanguageModel`]** - the trait a generation backend implements
//! - **[`GenerationRequest`]** - messages plus sampling [`Parameters`] for one call
//! - **[`Event`]** - a single streamed chunk of the response
//! - **[`Message`]** - one turn in the conversation passed to the model
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use quarry_core::llm::{LanguageModel, Event, oneshot};
//! use futures_lite::StreamExt;
//!
//! async fn ask(model: impl LanguageModel) -> Result<String, Box<dyn std::error::Error>> {
//!     let request = oneshot("Answer using only the provided context.", "What is the capital of Japan?");
//!     let mut stream = model.respond(request);
//!     let mut answer = String::new();
//!
//!     while let Some(event) = stream.next().await {
//!         if let Event::Text(chunk) = event? {
//!             answer.push_str(&chunk);
//!         }
//!     }
//!     Ok(answer)
//! }
//! ```

/// Event types for streaming responses.
pub mod event;
/// Message types and conversation handling.
pub mod message;

use alloc::{string::String, sync::Arc, vec, vec::Vec};
pub use event::Event;
use futures_core::Stream;
use futures_lite::{StreamExt, pin};
pub use message::{Message, Role};

/// Sampling parameters for a single generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    /// Sampling temperature. Higher values produce more varied output.
    pub temperature: f32,
    /// Maximum number of tokens to generate.
    pub max_tokens: usize,
    /// Sequences that, once produced, terminate generation without being
    /// included in the returned text.
    pub stop: Vec<String>,
    /// Optional seed for reproducible sampling.
    pub seed: Option<u64>,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 512,
            stop: vec![String::from("Question:"), String::from("\n\n\n")],
            seed: None,
        }
    }
}

impl Parameters {
    /// Overrides the sampling temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Overrides the maximum number of tokens to generate.
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Replaces the stop sequences.
    #[must_use]
    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = stop;
        self
    }

    /// Sets the sampling seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Request passed into [`LanguageModel::respond`].
///
/// Wraps the conversation and the sampling parameters a provider needs to
/// execute a call. There is deliberately no tool-call machinery here: the
/// Generator Driver only ever produces an answer from a composed prompt.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    messages: Vec<Message>,
    parameters: Parameters,
}

impl GenerationRequest {
    /// Creates a request from the provided messages using default parameters.
    pub fn new(messages: impl Into<Vec<Message>>) -> Self {
        Self {
            messages: messages.into(),
            parameters: Parameters::default(),
        }
    }

    /// Overrides the sampling parameters used for this call.
    #[must_use]
    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Returns the current conversation messages.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the current parameter snapshot.
    #[must_use]
    pub const fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Breaks the request into owned components.
    #[must_use]
    pub fn into_parts(self) -> (Vec<Message>, Parameters) {
        (self.messages, self.parameters)
    }
}

/// Language models for text generation.
///
/// `respond` returns a stream of [`Event`]s so that callers can surface tokens
/// to a user incrementally instead of waiting for the full answer.
pub trait LanguageModel: Sized + Send + Sync {
    /// The error type returned by this language model.
    type Error: core::error::Error + Send + Sync + 'static;

    /// Generates a streaming response to a conversation.
    fn respond(
        &self,
        request: GenerationRequest,
    ) -> impl Stream<Item = Result<Event, Self::Error>> + Send;
}

macro_rules! impl_language_model {
    ($($name:ident),*) => {
        $(
            impl<T: LanguageModel> LanguageModel for $name<T> {
                type Error = T::Error;

                fn respond(
                    &self,
                    request: GenerationRequest,
                ) -> impl Stream<Item = Result<Event, Self::Error>> + Send {
                    T::respond(self, request)
                }
            }
        )*
    };
}

impl<T: LanguageModel> LanguageModel for &T {
    type Error = T::Error;

    fn respond(
        &self,
        request: GenerationRequest,
    ) -> impl Stream<Item = Result<Event, Self::Error>> + Send {
        T::respond(self, request)
    }
}

impl_language_model!(Arc);

/// Collects text from an event stream into a single string.
///
/// # Errors
///
/// Returns the first stream error encountered while collecting text chunks.
pub async fn collect_text<S, E>(stream: S) -> Result<String, E>
where
    S: Stream<Item = Result<Event, E>>,
{
    pin!(stream);
    let mut result = String::new();
    while let Some(event) = stream.next().await {
        let Event::Text(text) = event?;
        result.push_str(&text);
    }
    Ok(result)
}

/// Convenience helper that creates a single system + user [`GenerationRequest`].
pub fn oneshot(system: impl Into<String>, user: impl Into<String>) -> GenerationRequest {
    let messages = vec![Message::system(system.into()), Message::user(user.into())];
    GenerationRequest::new(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use core::fmt;

    #[derive(Debug)]
    struct MockError;

    impl fmt::Display for MockError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "mock error")
        }
    }

    impl core::error::Error for MockError {}

    struct EchoModel;

    impl LanguageModel for EchoModel {
        type Error = MockError;

        fn respond(
            &self,
            request: GenerationRequest,
        ) -> impl Stream<Item = Result<Event, Self::Error>> + Send {
            let text = request
                .messages()
                .last()
                .map(|m| m.content().to_string())
                .unwrap_or_default();
            futures_lite::stream::iter(vec![Ok(Event::text(text))])
        }
    }

    #[tokio::test]
    async fn oneshot_builds_system_and_user_messages() {
        let request = oneshot("be terse", "hello");
        assert_eq!(request.messages().len(), 2);
        assert_eq!(request.messages()[0].role(), Role::System);
        assert_eq!(request.messages()[1].role(), Role::User);
    }

    #[tokio::test]
    async fn collect_text_concatenates_chunks() {
        let model = EchoModel;
        let stream = model.respond(oneshot("system", "hi"));
        let text: Result<String, MockError> = collect_text(stream).await;
        assert_eq!(text.unwrap(), "hi");
    }

    #[tokio::test]
    async fn arc_wrapped_model_delegates() {
        let model = Arc::new(EchoModel);
        let stream = model.respond(oneshot("system", "wrapped"));
        let text: Result<String, MockError> = collect_text(stream).await;
        assert_eq!(text.unwrap(), "wrapped");
    }

    #[tokio::test]
    async fn default_parameters_carry_spec_stop_sequences() {
        let params = Parameters::default();
        assert!(params.stop.iter().any(|s| s == "Question:"));
        assert!(params.stop.iter().any(|s| s == "\n\n\n"));
    }
}
