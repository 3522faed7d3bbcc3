use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;

use docqa_core::{Embedder, Embedding, Error};

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::tokenize_batch;

/// Sentence encoder over a local BERT-family checkpoint (e.g. all-MiniLM-L6-v2).
///
/// The model directory must hold `config.json`, `tokenizer.json` and either
/// `model.safetensors` or `pytorch_model.bin`. Weights are loaded on the first
/// `embed_batch` call and at most once per instance; a failed load is retried
/// on the next call.
pub struct BertEmbedder {
    model_dir: PathBuf,
    max_len: usize,
    batch_size: usize,
    id: String,
    loaded: Mutex<Option<Arc<LoadedModel>>>,
}

struct LoadedModel {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    pad_id: u32,
}

impl BertEmbedder {
    pub fn new(model_dir: impl Into<PathBuf>, max_len: usize, batch_size: usize) -> Self {
        let model_dir = model_dir.into();
        let name = model_dir
            .file_name()
            .map_or_else(|| "model".to_string(), |n| n.to_string_lossy().into_owned());
        Self {
            id: format!("bert:{name}:l{max_len}"),
            model_dir,
            max_len,
            batch_size: batch_size.max(1),
            loaded: Mutex::new(None),
        }
    }

    pub fn model_dir(&self) -> &Path { &self.model_dir }

    pub fn is_loaded(&self) -> bool {
        self.loaded.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    fn model(&self) -> Result<Arc<LoadedModel>> {
        // held across the load so concurrent first callers wait instead of loading twice
        let mut slot = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(model) = slot.as_ref() {
            return Ok(Arc::clone(model));
        }
        let model = Arc::new(LoadedModel::load(&self.model_dir)?);
        *slot = Some(Arc::clone(&model));
        Ok(model)
    }

    fn embed_all(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let model = self.model()?;
        let start = Instant::now();
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            out.extend(model.embed(batch, self.max_len)?);
        }
        tracing::debug!(texts = texts.len(), elapsed_ms = start.elapsed().as_millis(), "bert embed batch");
        Ok(out)
    }
}

impl LoadedModel {
    fn load(model_dir: &Path) -> Result<Self> {
        let device = select_device();
        tracing::info!(dir = %model_dir.display(), "loading sentence encoder");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let pad_id = tokenizer.get_padding().map_or(0, |p| p.pad_id);

        let config_path = model_dir.join("config.json");
        let config: BertConfig = serde_json::from_str(
            &std::fs::read_to_string(&config_path).with_context(|| format!("reading {}", config_path.display()))?,
        )
        .with_context(|| format!("parsing {}", config_path.display()))?;

        let safetensors = model_dir.join("model.safetensors");
        let weights: HashMap<String, Tensor> = if safetensors.exists() {
            candle_core::safetensors::load(&safetensors, &device)?
        } else {
            let bin = model_dir.join("pytorch_model.bin");
            candle_core::pickle::read_all(&bin)
                .with_context(|| format!("reading {}", bin.display()))?
                .into_iter()
                .collect()
        };
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = BertModel::load(vb, &config)?;
        tracing::info!("sentence encoder loaded");
        Ok(Self { model, tokenizer, device, pad_id })
    }

    fn embed(&self, texts: &[String], max_len: usize) -> Result<Vec<Embedding>> {
        let (input_ids, attention_mask) = tokenize_batch(&self.tokenizer, texts, max_len, self.pad_id, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let rows: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_dtype(DType::F32)?.to_vec2()?;
        Ok(rows)
    }
}

impl Embedder for BertEmbedder {
    fn id(&self) -> &str { &self.id }

    fn embed_batch(&self, texts: &[String]) -> docqa_core::Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.embed_all(texts).map_err(|e| Error::Encoding(format!("{e:#}")))
    }
}
