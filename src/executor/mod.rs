pub mod applescript;
pub mod content;
pub mod coordinator;
pub mod document;
pub mod input;
pub mod text_input;
