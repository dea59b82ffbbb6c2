pub mod compose;
pub mod gemini;
pub mod imagegen;
pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod session;
pub mod story;
pub mod workflow;
