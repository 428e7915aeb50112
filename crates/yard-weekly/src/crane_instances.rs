//! 吊機排程實例產生
//!
//! 每個堆場時段（班次）產生一個 [`CraneInstance`]：各區塊在該班次的工作量
//! 依子時段權重以最大餘數法分配，分配後總和與班次工作量完全一致。

use tracing::debug;
use yard_core::{CraneInstance, CraneSettings, CraneSolveSettings, Period, Result, YardError};
use yard_model::YardPlan;

/// 以最大餘數法把 `total` 依 `weights` 分配；餘數相同時先給較早的子時段
pub fn apportion(total: u32, weights: &[u32]) -> Result<Vec<u32>> {
    let weight_sum: u64 = weights.iter().map(|w| u64::from(*w)).sum();
    if weight_sum == 0 {
        return Err(YardError::InvalidParameter("子時段權重不可全為 0".to_string()));
    }

    let total = u64::from(total);
    let mut shares: Vec<u64> = Vec::with_capacity(weights.len());
    let mut remainders: Vec<(u64, usize)> = Vec::with_capacity(weights.len());
    for (h, w) in weights.iter().enumerate() {
        let exact = total * u64::from(*w);
        shares.push(exact / weight_sum);
        remainders.push((exact % weight_sum, h));
    }

    let assigned: u64 = shares.iter().sum();
    let mut left = total - assigned;
    remainders.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    for (_, h) in remainders {
        if left == 0 {
            break;
        }
        shares[h] += 1;
        left -= 1;
    }

    // 每份不超過 total，而 total 來自 u32
    Ok(shares.into_iter().map(|s| s as u32).collect())
}

/// 依堆場計劃產生每個班次的吊機實例
pub fn crane_instances(
    plan: &YardPlan,
    fleet: &CraneSettings,
    solve: &CraneSolveSettings,
) -> Result<Vec<CraneInstance>> {
    let weights = match &solve.hourly_profile {
        Some(profile) => {
            if profile.len() != solve.hourly_periods as usize {
                return Err(YardError::InvalidParameter(format!(
                    "子時段權重長度 {} 與子時段數 {} 不符",
                    profile.len(),
                    solve.hourly_periods
                )));
            }
            profile.clone()
        }
        None => vec![1; solve.hourly_periods as usize],
    };

    let mut instances = Vec::with_capacity(plan.periods as usize);
    for shift in plan.period_range() {
        let mut instance = CraneInstance::new(
            plan.week,
            shift,
            plan.block_ids.clone(),
            solve.hourly_periods,
            fleet,
        )?;
        for b in plan.block_indices() {
            let hourly = apportion(plan.workload_at(b, shift), &weights)?;
            for (h, volume) in hourly.into_iter().enumerate() {
                if volume > 0 {
                    instance
                        .required_volume
                        .set((b, Period(h as u32 + 1)), volume);
                }
            }
        }
        debug!(
            "{} 班次 {}: 需求總量 {}",
            plan.week,
            shift,
            instance.total_volume()
        );
        instances.push(instance);
    }
    Ok(instances)
}
