//! In-process GGUF backend via llama.cpp. Built only with `--features local`.

use std::num::NonZeroU32;
use std::pin::pin;

use log::{debug, info, trace};

use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::context::LlamaContext;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaChatMessage, LlamaModel};
use llama_cpp_2::sampling::LlamaSampler;

use crate::config::GeneratorConfig;
use crate::llm::{ChatMessage, LlmClient, LlmError};

/// A story tree is long; the context has to hold the prompt plus the whole JSON.
const N_CTX: u32 = 16384;
const MAX_TOKENS: usize = 8192;

fn local_err(what: &str, e: impl std::fmt::Display) -> LlmError {
    LlmError::Local(format!("{what}: {e}"))
}

fn build_sampler(temperature: f32) -> LlamaSampler {
    LlamaSampler::chain_simple([
        LlamaSampler::penalties(64, 1.1, 0.0, 0.0),
        LlamaSampler::top_k(40),
        LlamaSampler::top_p(0.95, 1),
        LlamaSampler::min_p(0.0, 1),
        LlamaSampler::temp(temperature),
        LlamaSampler::dist(1234),
    ])
}

pub struct LocalClient {
    #[allow(dead_code)]
    backend: &'static LlamaBackend,
    model: &'static LlamaModel,
    ctx: LlamaContext<'static>,
    temperature: f32,
}

impl LocalClient {
    /// `config.model` is the path to the `.gguf` file.
    pub fn load(config: &GeneratorConfig) -> Result<Self, LlmError> {
        let backend: &'static LlamaBackend = Box::leak(Box::new(
            LlamaBackend::init().map_err(|e| local_err("failed to init llama backend", e))?,
        ));

        info!("Loading model from: {}", config.model);

        let model_params = pin!(LlamaModelParams::default());
        let model: &'static LlamaModel = Box::leak(Box::new(
            LlamaModel::load_from_file(backend, &config.model, &model_params)
                .map_err(|e| local_err("failed to load model", e))?,
        ));

        info!("Model loaded successfully");

        let ctx_params = LlamaContextParams::default().with_n_ctx(NonZeroU32::new(N_CTX));
        let ctx = model
            .new_context(backend, ctx_params)
            .map_err(|e| local_err("failed to create inference context", e))?;

        Ok(Self {
            backend,
            model,
            ctx,
            temperature: config.temperature,
        })
    }
}

impl LlmClient for LocalClient {
    /// Tokenize messages, feed the prompt, sample until end-of-generation.
    fn complete(&mut self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        info!("=== LOCAL LLM CALL: {} messages ===", messages.len());
        for (i, msg) in messages.iter().enumerate() {
            debug!("  msg[{i}] {msg}");
        }

        self.ctx.clear_kv_cache();

        let llama_msgs: Vec<LlamaChatMessage> = messages
            .iter()
            .map(|m| LlamaChatMessage::new(m.role.as_str().to_string(), m.content.clone()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| local_err("failed to create chat messages", e))?;

        let tmpl = self
            .model
            .chat_template(None)
            .map_err(|e| local_err("model has no chat template", e))?;
        let prompt = self
            .model
            .apply_chat_template(&tmpl, &llama_msgs, true)
            .map_err(|e| local_err("failed to apply chat template", e))?;

        trace!("=== RENDERED PROMPT ===\n{prompt}\n=== END PROMPT ===");

        let tokens = self
            .model
            .str_to_token(&prompt, AddBos::Always)
            .map_err(|e| local_err("tokenization failed", e))?;
        if tokens.is_empty() {
            return Err(LlmError::Local("prompt tokenized to nothing".into()));
        }

        info!("Prompt tokenized: {} tokens", tokens.len());

        let mut batch = LlamaBatch::new(N_CTX as usize, 1);
        let last_idx = (tokens.len() - 1) as i32;
        for (i, tok) in (0i32..).zip(tokens.iter()) {
            batch
                .add(*tok, i, &[0], i == last_idx)
                .map_err(|e| local_err("batch add failed", e))?;
        }
        self.ctx
            .decode(&mut batch)
            .map_err(|e| local_err("initial decode failed", e))?;

        let mut sampler = build_sampler(self.temperature);
        let mut output = String::new();
        let mut decoder = encoding_rs::UTF_8.new_decoder();
        let mut n_cur = batch.n_tokens();

        for _ in 0..MAX_TOKENS {
            let tok = sampler.sample(&self.ctx, batch.n_tokens() - 1);
            sampler.accept(tok);

            if self.model.is_eog_token(tok) {
                debug!("Hit EOG token, stopping generation");
                break;
            }

            let piece = self
                .model
                .token_to_piece(tok, &mut decoder, true, None)
                .map_err(|e| local_err("token_to_piece failed", e))?;
            output.push_str(&piece);

            batch.clear();
            batch
                .add(tok, n_cur, &[0], true)
                .map_err(|e| local_err("batch add failed", e))?;
            self.ctx
                .decode(&mut batch)
                .map_err(|e| local_err("decode step failed", e))?;
            n_cur += 1;
        }

        info!("Local model returned {} chars", output.len());

        if output.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(output)
    }
}
