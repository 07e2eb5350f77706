use serde::{Deserialize, Serialize};

/// Where a consumer group without a committed offset starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetReset {
    #[default]
    Earliest,
    Latest,
}

impl OffsetReset {
    /// Value of the `auto.offset.reset` client property.
    pub fn as_client_value(&self) -> &'static str {
        match self {
            OffsetReset::Earliest => "earliest",
            OffsetReset::Latest => "latest",
        }
    }
}

/// How record keys and values are turned into strings and back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializationFormat {
    /// UTF-8 text, invalid bytes are rejected.
    String,
    /// UTF-8 text, invalid sequences are replaced with `U+FFFD`.
    #[default]
    LossyString,
}

/// Number of broker acknowledgments a producer waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Acks {
    None,
    Leader,
    #[default]
    All,
}

impl Acks {
    /// Value of the `acks` client property.
    pub fn as_client_value(&self) -> &'static str {
        match self {
            Acks::None => "0",
            Acks::Leader => "1",
            Acks::All => "all",
        }
    }
}
