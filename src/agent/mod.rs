pub mod answer;
pub mod loop_;
pub mod parser;
pub mod prompt;

pub use answer::{AnswerError, AnswerSchema, FieldType};
pub use loop_::{run_task, LoopConfig, TaskPrompt};
