//! Dependency Resolver - 플러그인 로드 순서 결정
//!
//! Kahn 알고리즘 기반 위상 정렬. 순수 함수로 구현되어 매니저 상태와
//! 분리되며, 실패는 플러그인 단위로 격리됩니다.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use atrium_foundation::Error;

use super::descriptor::PluginDescriptor;

/// 해석 결과
///
/// order는 의존성이 먼저 오는 로드 순서입니다. failures는 해석 단계에서
/// 탈락한 플러그인과 사유이며, cycle은 순환에 참여한 ID 목록(정렬됨)입니다.
pub struct ResolutionOutcome {
    pub order: Vec<String>,
    pub failures: Vec<(String, Error)>,
    pub cycle: Option<Vec<String>>,
}

/// 디스크립터 집합의 의존성 해석
///
/// - 미등록 의존성, 버전 불일치는 해당 플러그인만 탈락시킵니다.
/// - 순환은 참여자 전원을 탈락시키되 나머지는 정상 해석합니다.
/// - 동률일 때는 ID 사전순으로 순서를 결정해 결과를 결정적으로 만듭니다.
pub fn resolve(descriptors: &BTreeMap<String, PluginDescriptor>) -> ResolutionOutcome {
    let mut failures: Vec<(String, Error)> = Vec::new();

    // 1단계: 의존성 존재/버전 검증
    let mut candidates: BTreeSet<&str> = BTreeSet::new();
    'outer: for (id, desc) in descriptors {
        for (dep_id, req) in &desc.dependencies {
            match descriptors.get(dep_id) {
                None => {
                    failures.push((
                        id.clone(),
                        Error::MissingDependency {
                            plugin: id.clone(),
                            dependency: dep_id.clone(),
                            requirement: req.to_string(),
                        },
                    ));
                    continue 'outer;
                }
                Some(dep) if !req.matches(&dep.version) => {
                    failures.push((
                        id.clone(),
                        Error::VersionMismatch {
                            plugin: id.clone(),
                            dependency: dep_id.clone(),
                            requirement: req.to_string(),
                            found: dep.version.to_string(),
                        },
                    ));
                    continue 'outer;
                }
                Some(_) => {}
            }
        }
        candidates.insert(id.as_str());
    }

    // 2단계: 후보들 사이 간선으로 Kahn 위상 정렬
    let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for &id in &candidates {
        let desc = &descriptors[id];
        let degree = desc
            .dependencies
            .keys()
            .filter(|dep| candidates.contains(dep.as_str()))
            .count();
        in_degree.insert(id, degree);

        for dep in desc.dependencies.keys() {
            if candidates.contains(dep.as_str()) {
                dependents.entry(dep.as_str()).or_default().push(id);
            }
        }
    }

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, &d)| d == 0)
        .map(|(&id, _)| id)
        .collect();

    let mut order: Vec<String> = Vec::new();
    while let Some(&id) = ready.iter().next() {
        ready.remove(id);
        order.push(id.to_string());

        if let Some(deps) = dependents.get(id) {
            for &dependent in deps {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }
    }

    // 3단계: 정렬에 실패한 잔여 노드 = 순환 참여자
    let cycle = if order.len() < candidates.len() {
        let members: Vec<String> = candidates
            .iter()
            .filter(|id| !order.contains(&id.to_string()))
            .map(|id| id.to_string())
            .collect();

        for member in &members {
            failures.push((
                member.clone(),
                Error::DependencyCycle {
                    members: members.clone(),
                },
            ));
        }
        Some(members)
    } else {
        None
    };

    debug!(
        resolved = order.len(),
        failed = failures.len(),
        "Dependency resolution complete"
    );

    ResolutionOutcome {
        order,
        failures,
        cycle,
    }
}
