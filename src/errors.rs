use std::fmt;

#[derive(Debug, Clone)]
pub enum ShortpulseError {
    CacheConnection(String),
    CacheOperation(String),
    RepositoryOperation(String),
    EventStoreOperation(String),
    StatStoreOperation(String),
    QueueClosed(String),
    Validation(String),
    NotFound(String),
    Serialization(String),
    DateParse(String),
    RateLimited(String),
}

impl ShortpulseError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            ShortpulseError::CacheConnection(_) => "E001",
            ShortpulseError::CacheOperation(_) => "E002",
            ShortpulseError::RepositoryOperation(_) => "E003",
            ShortpulseError::EventStoreOperation(_) => "E004",
            ShortpulseError::StatStoreOperation(_) => "E005",
            ShortpulseError::QueueClosed(_) => "E006",
            ShortpulseError::Validation(_) => "E007",
            ShortpulseError::NotFound(_) => "E008",
            ShortpulseError::Serialization(_) => "E009",
            ShortpulseError::DateParse(_) => "E010",
            ShortpulseError::RateLimited(_) => "E011",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            ShortpulseError::CacheConnection(_) => "Cache Connection Error",
            ShortpulseError::CacheOperation(_) => "Cache Operation Error",
            ShortpulseError::RepositoryOperation(_) => "Repository Operation Error",
            ShortpulseError::EventStoreOperation(_) => "Event Store Operation Error",
            ShortpulseError::StatStoreOperation(_) => "Stat Store Operation Error",
            ShortpulseError::QueueClosed(_) => "Queue Closed",
            ShortpulseError::Validation(_) => "Validation Error",
            ShortpulseError::NotFound(_) => "Resource Not Found",
            ShortpulseError::Serialization(_) => "Serialization Error",
            ShortpulseError::DateParse(_) => "Date Parse Error",
            ShortpulseError::RateLimited(_) => "Rate Limit Exceeded",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            ShortpulseError::CacheConnection(msg)
            | ShortpulseError::CacheOperation(msg)
            | ShortpulseError::RepositoryOperation(msg)
            | ShortpulseError::EventStoreOperation(msg)
            | ShortpulseError::StatStoreOperation(msg)
            | ShortpulseError::QueueClosed(msg)
            | ShortpulseError::Validation(msg)
            | ShortpulseError::NotFound(msg)
            | ShortpulseError::Serialization(msg)
            | ShortpulseError::DateParse(msg)
            | ShortpulseError::RateLimited(msg) => msg,
        }
    }
}

impl fmt::Display for ShortpulseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error_type(), self.message())
    }
}

impl std::error::Error for ShortpulseError {}

// 便捷的构造函数
impl ShortpulseError {
    pub fn cache_connection<T: Into<String>>(msg: T) -> Self {
        ShortpulseError::CacheConnection(msg.into())
    }

    pub fn cache_operation<T: Into<String>>(msg: T) -> Self {
        ShortpulseError::CacheOperation(msg.into())
    }

    pub fn repository_operation<T: Into<String>>(msg: T) -> Self {
        ShortpulseError::RepositoryOperation(msg.into())
    }

    pub fn event_store_operation<T: Into<String>>(msg: T) -> Self {
        ShortpulseError::EventStoreOperation(msg.into())
    }

    pub fn stat_store_operation<T: Into<String>>(msg: T) -> Self {
        ShortpulseError::StatStoreOperation(msg.into())
    }

    pub fn queue_closed<T: Into<String>>(msg: T) -> Self {
        ShortpulseError::QueueClosed(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        ShortpulseError::Validation(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        ShortpulseError::NotFound(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        ShortpulseError::Serialization(msg.into())
    }

    pub fn date_parse<T: Into<String>>(msg: T) -> Self {
        ShortpulseError::DateParse(msg.into())
    }

    pub fn rate_limited<T: Into<String>>(msg: T) -> Self {
        ShortpulseError::RateLimited(msg.into())
    }
}

// 为常见的错误类型实现 From trait
impl From<redis::RedisError> for ShortpulseError {
    fn from(err: redis::RedisError) -> Self {
        ShortpulseError::CacheOperation(err.to_string())
    }
}

impl From<serde_json::Error> for ShortpulseError {
    fn from(err: serde_json::Error) -> Self {
        ShortpulseError::Serialization(err.to_string())
    }
}

impl From<chrono::ParseError> for ShortpulseError {
    fn from(err: chrono::ParseError) -> Self {
        ShortpulseError::DateParse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ShortpulseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(ShortpulseError::cache_connection("x").code(), "E001");
        assert_eq!(ShortpulseError::not_found("x").code(), "E008");
        assert_eq!(ShortpulseError::rate_limited("x").code(), "E011");
    }

    #[test]
    fn display_includes_type_and_message() {
        let err = ShortpulseError::validation("bad code");
        assert_eq!(err.to_string(), "Validation Error: bad code");
    }
}
