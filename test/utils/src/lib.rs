/// Newline delimited records shaped like an Ollama `/api/chat` stream. The
/// last record is the completion marker, which carries no content.
pub fn chat_stream_fixture() -> &'static str {
    return r#"
{"model":"llama3","created_at":"2024-05-01T10:00:00Z","message":{"role":"assistant","content":"**Diagnosis:**\n"},"done":false}
{"model":"llama3","created_at":"2024-05-01T10:00:01Z","message":{"role":"assistant","content":"The starter relay "},"done":false}
{"model":"llama3","created_at":"2024-05-01T10:00:02Z","message":{"role":"assistant","content":"is failing."},"done":false}
{"model":"llama3","created_at":"2024-05-01T10:00:03Z","message":{"role":"assistant","content":""},"done":true,"total_duration":1200}
"#
    .trim();
}

/// Splits a payload into chunks of `size` bytes, ignoring line boundaries, to
/// mimic reads that cut JSON records in half.
pub fn fragment_bytes(payload: &str, size: usize) -> Vec<Vec<u8>> {
    return payload
        .as_bytes()
        .chunks(size)
        .map(|chunk| return chunk.to_vec())
        .collect();
}

pub fn fault_prompt_fixture() -> &'static str {
    return "My car makes a clicking sound but won't start";
}
