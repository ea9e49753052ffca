pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod gemini;
pub mod llm;
pub mod models;
pub mod openai;
pub mod services;
pub mod state;
pub mod youtube;
