use rand::{distributions::Alphanumeric, thread_rng, Rng};

/// Random alphanumeric identifier. Used for in-progress session ids, which
/// must stay unique and non-enumerable under concurrent starts.
pub fn generate_session_id(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}
