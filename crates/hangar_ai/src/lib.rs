pub mod context;
pub mod embeddings;
pub mod index;
pub mod llm;
pub mod ollama;
pub mod pipeline;
pub mod prompts;
pub mod quality;
pub mod retrieve;
