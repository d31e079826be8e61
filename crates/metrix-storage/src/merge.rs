//! 메모리 맵 병합 규칙.
//!
//! 메모리/파일 백엔드가 공유한다. 호출자는 맵에 대한 배타 잠금을 쥔 상태여야 한다.

use metrix_core::error::CoreError;
use metrix_core::models::metric::Metric;
use std::collections::HashMap;

/// 메트릭 하나 병합 후 저장된 결과 반환
pub(crate) fn apply_one(
    map: &mut HashMap<String, Metric>,
    incoming: &Metric,
) -> Result<Metric, CoreError> {
    match map.get_mut(&incoming.id) {
        Some(stored) => {
            stored.merge(incoming)?;
            Ok(stored.clone())
        }
        None => {
            map.insert(incoming.id.clone(), incoming.clone());
            Ok(incoming.clone())
        }
    }
}

/// 배치 병합 (전부 성공하거나 전부 실패)
///
/// 변경분을 별도 맵에 먼저 쌓은 뒤 모두 성공했을 때만 반영한다.
pub(crate) fn apply_batch(
    map: &mut HashMap<String, Metric>,
    incoming: &[Metric],
) -> Result<(), CoreError> {
    let mut staged: HashMap<String, Metric> = HashMap::new();

    for metric in incoming {
        if let Some(entry) = staged.get_mut(&metric.id) {
            entry.merge(metric)?;
            continue;
        }
        let mut entry = match map.get(&metric.id) {
            Some(stored) => stored.clone(),
            None => {
                staged.insert(metric.id.clone(), metric.clone());
                continue;
            }
        };
        entry.merge(metric)?;
        staged.insert(metric.id.clone(), entry);
    }

    map.extend(staged);
    Ok(())
}
