//! vulnscout: a ReAct tool-use loop for LLM-driven vulnerability hunting.
//!
//! A model reasons in `Thought / Action / Action Input` text, vulnscout runs
//! the named tool against a target source tree (or the network), and feeds
//! the result back as an `Observation` until the model gives a final answer.

pub mod agent;
pub mod config;
pub mod error;
pub mod flag_server;
pub mod index;
pub mod llm;
pub mod target;
pub mod tasks;
pub mod tools;
pub mod types;
