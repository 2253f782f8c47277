use crate::error::GeneratorError;
use async_channel::{Receiver, Sender};
use futures_core::Stream;
use llama_cpp_2::{
    LlamaCppError,
    context::params::{LlamaContextParams, LlamaPoolingType},
    llama_backend::LlamaBackend,
    llama_batch::LlamaBatch,
    model::{AddBos, LlamaChatTemplate, LlamaModel, params::LlamaModelParams},
    openai::OpenAIChatTemplateParams,
    sampling::LlamaSampler,
};
use quarry_core::{
    EmbeddingModel, LanguageModel,
    llm::{Event, GenerationRequest, Message, Parameters, Role},
};
use serde::Serialize;
use std::{
    num::NonZeroU32,
    path::{Path, PathBuf},
    sync::Arc,
    sync::atomic::{AtomicBool, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};

fn init_backend() -> Result<LlamaBackend, GeneratorError> {
    match LlamaBackend::init() {
        Ok(backend) => Ok(backend),
        Err(LlamaCppError::BackendAlreadyInitialized) => Ok(LlamaBackend {}),
        Err(err) => Err(GeneratorError::Model(err.to_string())),
    }
}

/// Local llama.cpp GGUF model wrapper implementing the quarry-core generation
/// and embedding traits.
#[derive(Debug, Clone)]
pub struct Llama {
    inner: Arc<LlamaConfig>,
    model: Arc<LlamaModel>,
    backend: Arc<LlamaBackend>,
}

impl Llama {
    /// Loads a GGUF model from disk with default settings.
    pub fn from_file(model_path: impl AsRef<Path>) -> Result<Self, GeneratorError> {
        Self::builder(model_path).build()
    }

    /// Starts building a local model with custom options.
    #[must_use]
    pub fn builder(model_path: impl AsRef<Path>) -> Builder {
        Builder::new(model_path)
    }

    /// Overrides the chat template name or full template string.
    #[must_use]
    pub fn with_chat_template(mut self, template: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.inner).chat_template = Some(template.into());
        self
    }

    /// Overrides the generation context size.
    #[must_use]
    pub fn with_n_ctx(mut self, n_ctx: u32) -> Self {
        Arc::make_mut(&mut self.inner).n_ctx = Some(n_ctx);
        self
    }

    /// Generates a response, streaming tokens as they are produced and
    /// honoring an externally-owned cancellation flag.
    ///
    /// Unlike [`LanguageModel::respond`] (which creates its own flag that
    /// nothing outside this call can ever set), this is the entry point the
    /// Process Supervisor uses: it holds the `Arc<AtomicBool>` and flips it
    /// from `request_stop()`, on any thread, at any time.
    pub fn respond_cancellable(
        &self,
        request: GenerationRequest,
        stop: Arc<AtomicBool>,
    ) -> impl Stream<Item = Result<Event, GeneratorError>> + Send + 'static {
        let (tx, rx) = async_channel::unbounded();
        let model = self.model.clone();
        let backend = self.backend.clone();
        let cfg = self.inner.clone();

        std::thread::spawn(move || {
            if let Err(err) = generate(&model, &backend, &cfg, request, &stop, &tx) {
                let _ = tx.send_blocking(Err(err));
            }
        });

        rx
    }
}

impl LanguageModel for Llama {
    type Error = GeneratorError;

    fn respond(
        &self,
        request: GenerationRequest,
    ) -> impl Stream<Item = Result<Event, Self::Error>> + Send {
        self.respond_cancellable(request, Arc::new(AtomicBool::new(false)))
    }
}

impl EmbeddingModel for Llama {
    fn dim(&self) -> usize {
        self.model.n_embd() as usize
    }

    fn embed(
        &self,
        text: &str,
    ) -> impl std::future::Future<Output = quarry_core::Result<Vec<f32>>> + Send {
        let model = self.model.clone();
        let backend = self.backend.clone();
        let cfg = self.inner.clone();
        let input = text.to_owned();

        async move {
            let mut context = create_context(&model, &backend, &cfg, true)?;

            let tokens = model
                .str_to_token(&input, AddBos::Never)
                .map_err(|err| GeneratorError::Token(err.to_string()))?;
            if tokens.is_empty() {
                return Err(GeneratorError::Unsupported(
                    "cannot embed empty token sequence".to_string(),
                )
                .into());
            }

            let mut batch = LlamaBatch::new(tokens.len(), 1);
            batch
                .add_sequence(&tokens, 0, true)
                .map_err(|err| GeneratorError::Decode(err.to_string()))?;
            context
                .decode(&mut batch)
                .map_err(|err| GeneratorError::Decode(err.to_string()))?;

            if let Ok(embedding) = context.embeddings_seq_ith(0) {
                return Ok(embedding.to_vec());
            }

            let last_index = (tokens.len() - 1) as i32;
            let embedding = context
                .embeddings_ith(last_index)
                .map_err(|err| GeneratorError::Decode(err.to_string()))?;
            Ok(embedding.to_vec())
        }
    }
}

#[derive(Debug, Clone)]
struct LlamaConfig {
    model_path: PathBuf,
    chat_template: Option<String>,
    n_ctx: Option<u32>,
    n_threads: i32,
    n_threads_batch: i32,
}

/// Builder for a local llama.cpp model.
#[derive(Debug, Clone)]
pub struct Builder {
    model_path: PathBuf,
    n_gpu_layers: u32,
    use_mlock: bool,
    n_ctx: Option<u32>,
    chat_template: Option<String>,
    n_threads: i32,
    n_threads_batch: i32,
    backend: Option<Arc<LlamaBackend>>,
}

impl Builder {
    fn new(model_path: impl AsRef<Path>) -> Self {
        Self {
            model_path: model_path.as_ref().to_path_buf(),
            n_gpu_layers: 0,
            use_mlock: false,
            n_ctx: None,
            chat_template: None,
            n_threads: 4,
            n_threads_batch: 4,
            backend: None,
        }
    }

    /// Number of layers offloaded to GPU.
    #[must_use]
    pub const fn n_gpu_layers(mut self, n_gpu_layers: u32) -> Self {
        self.n_gpu_layers = n_gpu_layers;
        self
    }

    /// Keeps model pages resident in RAM when possible.
    #[must_use]
    pub const fn use_mlock(mut self, use_mlock: bool) -> Self {
        self.use_mlock = use_mlock;
        self
    }

    /// Generation/embedding context size.
    #[must_use]
    pub const fn n_ctx(mut self, n_ctx: u32) -> Self {
        self.n_ctx = Some(n_ctx);
        self
    }

    /// Overrides the model's chat template name or content.
    #[must_use]
    pub fn chat_template(mut self, template: impl Into<String>) -> Self {
        self.chat_template = Some(template.into());
        self
    }

    /// Number of decode threads.
    #[must_use]
    pub const fn n_threads(mut self, n_threads: i32) -> Self {
        self.n_threads = n_threads;
        self
    }

    /// Number of batch decode threads.
    #[must_use]
    pub const fn n_threads_batch(mut self, n_threads_batch: i32) -> Self {
        self.n_threads_batch = n_threads_batch;
        self
    }

    /// Builds the local generator, loading the model from disk.
    pub fn build(self) -> Result<Llama, GeneratorError> {
        let model_params = LlamaModelParams::default()
            .with_n_gpu_layers(self.n_gpu_layers)
            .with_use_mlock(self.use_mlock);
        let backend = if let Some(backend) = self.backend {
            backend
        } else {
            Arc::new(init_backend()?)
        };
        let model = LlamaModel::load_from_file(backend.as_ref(), &self.model_path, &model_params)
            .map_err(|err| GeneratorError::Model(err.to_string()))?;

        Ok(Llama {
            inner: Arc::new(LlamaConfig {
                model_path: self.model_path,
                chat_template: self.chat_template,
                n_ctx: self.n_ctx,
                n_threads: self.n_threads,
                n_threads_batch: self.n_threads_batch,
            }),
            model: Arc::new(model),
            backend,
        })
    }
}

/// Longest trailing window of un-emitted text kept back in case it is the
/// prefix of a stop sequence still being assembled token by token.
fn longest_stop_len(stop: &[String]) -> usize {
    stop.iter().map(String::len).max().unwrap_or(0)
}

/// Runs the blocking decode loop, pushing [`Event`]s through `tx` as soon as
/// they are safe to emit (i.e. not a prefix of a configured stop sequence).
///
/// Checked once per generated token: `stop.load` (Supervisor cancellation),
/// `is_eog_token` (model end-of-generation), the configured stop sequences,
/// and `max_tokens`. Any of the four ends the stream without an error.
fn generate(
    model: &LlamaModel,
    backend: &LlamaBackend,
    cfg: &LlamaConfig,
    request: GenerationRequest,
    stop_flag: &Arc<AtomicBool>,
    tx: &Sender<Result<Event, GeneratorError>>,
) -> Result<(), GeneratorError> {
    let (messages, parameters) = request.into_parts();

    let template = resolve_chat_template(model, cfg)?;
    let prompt = build_prompt(model, &template, &messages, &parameters)?;

    let mut context = create_context(model, backend, cfg, false)?;
    let prompt_tokens = model
        .str_to_token(&prompt, AddBos::Never)
        .map_err(|err| GeneratorError::Token(err.to_string()))?;

    if prompt_tokens.is_empty() {
        return Err(GeneratorError::Unsupported(
            "empty prompt after template rendering".to_string(),
        ));
    }

    let mut init_batch = LlamaBatch::new(prompt_tokens.len(), 1);
    init_batch
        .add_sequence(&prompt_tokens, 0, false)
        .map_err(|err| GeneratorError::Decode(err.to_string()))?;
    context
        .decode(&mut init_batch)
        .map_err(|err| GeneratorError::Decode(err.to_string()))?;

    let mut sampler = build_sampler(&parameters);
    sampler.accept_many(prompt_tokens.iter());

    let mut decoder = encoding_rs::UTF_8.new_decoder();
    let mut pos = prompt_tokens.len() as i32;
    let lookback = longest_stop_len(&parameters.stop);

    // Text produced but not yet sent downstream, held back until we know it
    // isn't the start of a configured stop sequence.
    let mut pending = String::new();

    for _ in 0..parameters.max_tokens {
        if stop_flag.load(Ordering::Relaxed) {
            break;
        }

        let token = sampler.sample(&context, -1);
        sampler.accept(token);

        if model.is_eog_token(token) {
            break;
        }

        let piece = model
            .token_to_piece(token, &mut decoder, true, None)
            .map_err(|err| GeneratorError::Token(err.to_string()))?;
        if piece.is_empty() {
            continue;
        }
        pending.push_str(&piece);

        if let Some(cut) = find_stop(&pending, &parameters.stop) {
            if cut > 0 && tx.send_blocking(Ok(Event::text(pending[..cut].to_string()))).is_err() {
                return Ok(());
            }
            return Ok(());
        }

        if lookback > 0 && pending.len() > lookback * 2 {
            let split = pending.len() - lookback;
            let safe: String = pending.drain(..split).collect();
            if tx.send_blocking(Ok(Event::text(safe))).is_err() {
                return Ok(());
            }
        }

        let mut step_batch = LlamaBatch::new(1, 1);
        step_batch
            .add(token, pos, &[0], true)
            .map_err(|err| GeneratorError::Decode(err.to_string()))?;
        context
            .decode(&mut step_batch)
            .map_err(|err| GeneratorError::Decode(err.to_string()))?;
        pos += 1;
    }

    if !pending.is_empty() {
        let _ = tx.send_blocking(Ok(Event::text(pending)));
    }

    Ok(())
}

/// Returns the byte offset before the earliest configured stop sequence
/// found in `text`, if any has fully appeared.
fn find_stop(text: &str, stop: &[String]) -> Option<usize> {
    stop.iter()
        .filter(|s| !s.is_empty())
        .filter_map(|s| text.find(s.as_str()))
        .min()
}

fn create_context<'a>(
    model: &'a LlamaModel,
    backend: &LlamaBackend,
    cfg: &LlamaConfig,
    embeddings: bool,
) -> Result<llama_cpp_2::context::LlamaContext<'a>, GeneratorError> {
    let mut params = LlamaContextParams::default();
    if let Some(n_ctx) = cfg.n_ctx {
        params = params.with_n_ctx(NonZeroU32::new(n_ctx));
    }
    params = params.with_n_threads(cfg.n_threads);
    params = params.with_n_threads_batch(cfg.n_threads_batch);

    if embeddings {
        params = params.with_embeddings(true);
        params = params.with_pooling_type(LlamaPoolingType::Last);
    }

    model
        .new_context(backend, params)
        .map_err(|err| GeneratorError::Context(err.to_string()))
}

fn resolve_chat_template(
    model: &LlamaModel,
    cfg: &LlamaConfig,
) -> Result<LlamaChatTemplate, GeneratorError> {
    if let Some(template) = &cfg.chat_template {
        return LlamaChatTemplate::new(template)
            .map_err(|err| GeneratorError::Model(err.to_string()));
    }
    match model.chat_template(None) {
        Ok(template) => Ok(template),
        Err(_) => {
            LlamaChatTemplate::new("chatml").map_err(|err| GeneratorError::Model(err.to_string()))
        }
    }
}

#[derive(Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

fn messages_to_openai(messages: &[Message]) -> Vec<OpenAIMessage> {
    messages
        .iter()
        .map(|msg| {
            let role = match msg.role() {
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::System => "system",
            };
            OpenAIMessage {
                role: role.to_string(),
                content: msg.content().to_string(),
            }
        })
        .collect()
}

fn build_prompt(
    model: &LlamaModel,
    template: &LlamaChatTemplate,
    messages: &[Message],
    _parameters: &Parameters,
) -> Result<String, GeneratorError> {
    let messages_json = serde_json::to_string(&messages_to_openai(messages))
        .map_err(|err| GeneratorError::Model(err.to_string()))?;

    let template_result = model
        .apply_chat_template_oaicompat(
            template,
            &OpenAIChatTemplateParams {
                messages_json: &messages_json,
                tools_json: None,
                tool_choice: None,
                json_schema: None,
                grammar: None,
                reasoning_format: None,
                chat_template_kwargs: None,
                add_generation_prompt: true,
                use_jinja: true,
                parallel_tool_calls: false,
                enable_thinking: false,
                add_bos: false,
                add_eos: false,
                parse_tool_calls: false,
            },
        )
        .map_err(|err| GeneratorError::Model(err.to_string()))?;

    Ok(template_result.prompt)
}

fn build_sampler(parameters: &Parameters) -> LlamaSampler {
    if parameters.temperature <= 0.0 {
        return LlamaSampler::chain_simple([LlamaSampler::greedy()]);
    }
    LlamaSampler::chain_simple([
        LlamaSampler::temp(parameters.temperature),
        LlamaSampler::dist(sampling_seed(parameters.seed)),
    ])
}

fn sampling_seed(seed: Option<u64>) -> u32 {
    if let Some(seed) = seed {
        return (seed & 0xFFFF_FFFF) as u32;
    }
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|value| value.as_nanos() as u64)
        .unwrap_or(1);
    ((now ^ (now >> 32)) & 0xFFFF_FFFF) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_stop_locates_earliest_match() {
        let stops = vec!["Question:".to_string(), "\n\n\n".to_string()];
        let text = "The answer is 42.\n\n\nQuestion: what now?";
        assert_eq!(find_stop(text, &stops), Some(18));
    }

    #[test]
    fn find_stop_ignores_absent_sequences() {
        let stops = vec!["Question:".to_string()];
        assert_eq!(find_stop("plain text", &stops), None);
    }

    #[test]
    fn longest_stop_len_picks_max() {
        let stops = vec!["a".to_string(), "abc".to_string(), "ab".to_string()];
        assert_eq!(longest_stop_len(&stops), 3);
    }

    #[test]
    fn sampling_seed_is_deterministic_when_given() {
        assert_eq!(sampling_seed(Some(7)), 7);
    }
}
