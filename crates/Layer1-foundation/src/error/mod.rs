//! Error types for Atrium
//!
//! 모든 에러를 중앙에서 관리

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Atrium 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 의존성 해석 관련
    // ========================================================================
    #[error("Missing dependency '{dependency}' for plugin '{plugin}' (required: {requirement})")]
    MissingDependency {
        plugin: String,
        dependency: String,
        requirement: String,
    },

    #[error("Incompatible dependency '{dependency}' for plugin '{plugin}': required {requirement}, found {found}")]
    VersionMismatch {
        plugin: String,
        dependency: String,
        requirement: String,
        found: String,
    },

    #[error("Dependency cycle detected: {}", members.join(" -> "))]
    DependencyCycle { members: Vec<String> },

    // ========================================================================
    // 플러그인 로드 관련
    // ========================================================================
    #[error("Plugin '{plugin}' failed to load: {reason}")]
    Load { plugin: String, reason: String },

    #[error("Plugin error: {0}")]
    Plugin(String),

    #[error("Unknown entry reference '{entry_ref}' for plugin '{plugin}'")]
    UnknownEntry { plugin: String, entry_ref: String },

    // ========================================================================
    // 이벤트 핸들러 관련 (격리 후 보고 전용, 전파되지 않음)
    // ========================================================================
    #[error("Handler error (owner: {owner}, topic: {topic}): {reason}")]
    Handler {
        owner: String,
        topic: String,
        reason: String,
    },

    // ========================================================================
    // 확장 등록 관련
    // ========================================================================
    #[error("View '{view_id}' is already registered by '{owner}' (rejected: '{attempted_owner}')")]
    RegistrationConflict {
        view_id: String,
        owner: String,
        attempted_owner: String,
    },

    // ========================================================================
    // 버전/입력 관련
    // ========================================================================
    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========================================================================
    // 일반
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // 기타
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// 해석 단계 에러인지 확인 (플러그인을 Failed 상태로 만드는 에러)
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            Error::MissingDependency { .. }
                | Error::VersionMismatch { .. }
                | Error::DependencyCycle { .. }
        )
    }

    /// 격리 후 보고만 하는 에러인지 확인 (라이프사이클 상태를 바꾸지 않음)
    pub fn is_contained(&self) -> bool {
        matches!(
            self,
            Error::Handler { .. } | Error::RegistrationConflict { .. }
        )
    }

    /// Load 에러 생성 헬퍼
    pub fn load(plugin: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Load {
            plugin: plugin.into(),
            reason: reason.into(),
        }
    }

    /// Handler 에러 생성 헬퍼
    pub fn handler(
        owner: impl Into<String>,
        topic: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::Handler {
            owner: owner.into(),
            topic: topic.into(),
            reason: reason.into(),
        }
    }
}

// ============================================================================
// From 구현 (추가 변환)
// ============================================================================

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Internal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_display_names_members() {
        let err = Error::DependencyCycle {
            members: vec!["a".into(), "b".into(), "c".into()],
        };
        assert!(err.to_string().contains("a -> b -> c"));
    }

    #[test]
    fn test_error_classification() {
        let resolution = Error::MissingDependency {
            plugin: "p".into(),
            dependency: "d".into(),
            requirement: "*".into(),
        };
        assert!(resolution.is_resolution());
        assert!(!resolution.is_contained());

        let contained = Error::handler("p", "t", "boom");
        assert!(contained.is_contained());
        assert!(!contained.is_resolution());
    }
}
