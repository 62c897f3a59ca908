pub mod critique_llm;
pub mod db;

pub use critique_llm::OpenAiCritiqueAdapter;
pub use db::DbAdapter;
