use serde::Deserialize;

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Listen address, e.g. `"tcp://127.0.0.1:9400"`.
    pub listen: String,
    /// Bound of the receiver-to-processor event queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_queue_capacity() -> usize {
    1024
}
