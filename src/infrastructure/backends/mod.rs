#[cfg(test)]
pub mod fake;
pub mod ollama;
