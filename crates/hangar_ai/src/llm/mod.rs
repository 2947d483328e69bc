use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use hangar_core::error::{codes, AppError};

/// Text completion service. Implementations run at minimal temperature.
pub trait Llm {
    fn generate(&self, model: &str, prompt: &str) -> Result<String, AppError>;
}

/// Vision service describing one image in the context of a question.
pub trait VisionModel {
    fn analyze_image(&self, model: &str, image: &[u8], prompt: &str) -> Result<String, AppError>;
}

/// Bounds the wall-clock time of a wrapped [`Llm`].
///
/// The inner call keeps running on its worker thread after the deadline; its
/// result is discarded.
pub struct DeadlineLlm<L> {
    inner: Arc<L>,
    deadline: Duration,
}

impl<L> DeadlineLlm<L> {
    pub fn new(inner: Arc<L>, deadline: Duration) -> Self {
        Self { inner, deadline }
    }
}

impl<L> Llm for DeadlineLlm<L>
where
    L: Llm + Send + Sync + 'static,
{
    fn generate(&self, model: &str, prompt: &str) -> Result<String, AppError> {
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let model_owned = model.to_string();
        let prompt_owned = prompt.to_string();
        thread::spawn(move || {
            let _ = tx.send(inner.generate(&model_owned, &prompt_owned));
        });

        match rx.recv_timeout(self.deadline) {
            Ok(res) => res,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(AppError::new(
                codes::GENERATION_FAILED,
                "Answer generation timed out",
            )
            .with_details(format!("model={model}; deadline_ms={}", self.deadline.as_millis()))
            .with_retryable(true)),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(AppError::new(
                codes::GENERATION_FAILED,
                "Answer generation worker exited without a result",
            )
            .with_details(format!("model={model}"))),
        }
    }
}

pub mod ollama_llm;
