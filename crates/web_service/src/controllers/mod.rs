pub mod anthropic_controller;
pub mod openai_controller;
pub mod system_controller;
