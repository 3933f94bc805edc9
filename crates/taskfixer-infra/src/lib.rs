//! Infrastructure layer for TaskFixer.
//!
//! Contains implementations of the port traits defined in `taskfixer-core`:
//! SQLite usage and account storage, the OpenAI Assistants client, the
//! DuckDuckGo search client, and the configuration loader.

pub mod config;
pub mod openai;
pub mod search;
pub mod sqlite;
