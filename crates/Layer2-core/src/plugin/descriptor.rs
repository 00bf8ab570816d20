//! Plugin Descriptor - 플러그인 메타데이터와 버전 요구사항
//!
//! 디스크 스캔이나 매니페스트 파싱은 호스트의 몫입니다. 코어는 이미 만들어진
//! PluginDescriptor 값을 받아 해석(resolve)과 로드에만 사용합니다.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use atrium_foundation::{Error, Result};

// ============================================================================
// 버전
// ============================================================================

/// 단순화된 semver 버전 (major.minor.patch)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PluginVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl PluginVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// "1.2.3" 형식 파싱
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(Error::InvalidVersion(s.to_string()));
        }

        let parse_part =
            |p: &str| p.parse::<u32>().map_err(|_| Error::InvalidVersion(s.to_string()));

        Ok(Self {
            major: parse_part(parts[0])?,
            minor: parse_part(parts[1])?,
            patch: parse_part(parts[2])?,
        })
    }
}

impl Default for PluginVersion {
    fn default() -> Self {
        Self::new(1, 0, 0)
    }
}

impl fmt::Display for PluginVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// 의존성 버전 요구사항
///
/// - `*`          : 모든 버전 허용
/// - `1.2.3`      : 정확히 일치
/// - `>=1.2.3`    : 해당 버전 이상
/// - `^1.2.3`     : 같은 major 내에서 해당 버전 이상
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VersionReq {
    Any,
    Exact(PluginVersion),
    AtLeast(PluginVersion),
    Compatible(PluginVersion),
}

impl VersionReq {
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s == "*" {
            return Ok(Self::Any);
        }
        if let Some(rest) = s.strip_prefix(">=") {
            return Ok(Self::AtLeast(PluginVersion::parse(rest)?));
        }
        if let Some(rest) = s.strip_prefix('^') {
            return Ok(Self::Compatible(PluginVersion::parse(rest)?));
        }
        Ok(Self::Exact(PluginVersion::parse(s)?))
    }

    /// 버전이 요구사항을 만족하는지 검사
    pub fn matches(&self, version: &PluginVersion) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(req) => version == req,
            Self::AtLeast(req) => version >= req,
            Self::Compatible(req) => version.major == req.major && version >= req,
        }
    }
}

impl fmt::Display for VersionReq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "*"),
            Self::Exact(v) => write!(f, "{}", v),
            Self::AtLeast(v) => write!(f, ">={}", v),
            Self::Compatible(v) => write!(f, "^{}", v),
        }
    }
}

impl TryFrom<String> for VersionReq {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<VersionReq> for String {
    fn from(req: VersionReq) -> Self {
        req.to_string()
    }
}

// ============================================================================
// 디스크립터
// ============================================================================

/// 플러그인 디스크립터
///
/// 호스트가 디스커버리 단계에서 만들어 PluginManager에 등록합니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// 런타임 전역 고유 ID
    pub id: String,

    /// EntryRegistry에서 팩토리를 찾는 키
    pub entry_ref: String,

    /// 플러그인 버전
    #[serde(default)]
    pub version: PluginVersion,

    /// 의존 플러그인 ID → 버전 요구사항 (결정적 순회를 위해 BTreeMap)
    #[serde(default)]
    pub dependencies: BTreeMap<String, VersionReq>,

    /// 선언된 권한 (자문적, 강제 없음)
    #[serde(default)]
    pub permissions: Vec<String>,

    /// 플러그인별 설정 블록 (JSON 오브젝트)
    #[serde(default)]
    pub config: Value,
}

impl PluginDescriptor {
    pub fn new(id: impl Into<String>, entry_ref: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entry_ref: entry_ref.into(),
            version: PluginVersion::default(),
            dependencies: BTreeMap::new(),
            permissions: Vec::new(),
            config: Value::Null,
        }
    }

    pub fn with_version(mut self, version: PluginVersion) -> Self {
        self.version = version;
        self
    }

    pub fn with_dependency(mut self, id: impl Into<String>, req: VersionReq) -> Self {
        self.dependencies.insert(id.into(), req);
        self
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.push(permission.into());
        self
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }
}
