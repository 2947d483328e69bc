use hangar_core::error::AppError;

/// Text to fixed-length vector. Must be deterministic for a fixed model.
pub trait Embedder {
    fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, AppError>;

    /// One vector per input, in input order.
    fn embed_batch(&self, model: &str, inputs: &[&str]) -> Result<Vec<Vec<f32>>, AppError> {
        inputs.iter().map(|input| self.embed(model, input)).collect()
    }
}

pub mod ollama_embed;
