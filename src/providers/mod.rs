pub mod anthropic;
pub mod openai;
pub mod registry;
pub mod traits;

pub use traits::{AIProvider, ChatRequest, ChatResponse, Message, Role, Tool};
