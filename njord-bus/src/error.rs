#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("failed to serialize payload for topic {topic}: {source}")]
    Serialize {
        topic: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to deserialize payload from topic {topic}: {source}")]
    Deserialize {
        topic: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("subscriber for topic {0} disconnected")]
    SubscriberClosed(String),
}
