// src/utils/id_generator.rs
use chrono::{DateTime, Utc};
use rand::Rng;

const SUFFIX_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const SUFFIX_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdType {
    Dispatch,
    Message,
}

impl IdType {
    pub fn prefix(&self) -> &'static str {
        match self {
            IdType::Dispatch => "dsp",
            IdType::Message => "msg",
        }
    }
}

/// `{prefix}-{YYMMDD}-{5 random alphanumerics}`, e.g. `dsp-261016-Q7xk2`.
/// Short enough to grep for in logs, not meant to be globally unique.
pub fn generate_id(id_type: IdType, timestamp: DateTime<Utc>) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| SUFFIX_CHARS[rng.random_range(0..SUFFIX_CHARS.len())] as char)
        .collect();
    format!("{}-{}-{}", id_type.prefix(), timestamp.format("%y%m%d"), suffix)
}

/// Correlation id attached to one dispatch run and its log lines.
pub fn generate_dispatch_id() -> String {
    generate_id(IdType::Dispatch, Utc::now())
}

pub fn generate_message_id() -> String {
    generate_id(IdType::Message, Utc::now())
}
