use std::cmp::Ordering;

/// Upper bound on refinement passes in [`normalize_weights_for_f32`].
const MAX_NORMALIZE_ITERATIONS: usize = 10;

// ─── Weight normalization ─────────────────────────────────────────────────────

fn to_f32_precision(value: f64) -> f64 {
    value as f32 as f64
}

fn quantized_error(weights: &[f64; 4]) -> f64 {
    let sum: f64 = weights.iter().map(|weight| to_f32_precision(*weight)).sum();
    (sum - 1.0).abs()
}

/// Normalize four skin weights so that, once stored as `f32`, they sum to
/// 1.0 as closely as the format allows.
///
/// Weights already summing to 1.0 within `f64::EPSILON` are returned as is,
/// as is all-zero input. Otherwise the input is the starting candidate. The
/// plain normalization quantized to `f32` is tried first, then up to ten
/// passes divide the quantized weights by their quantized sum. A candidate
/// replaces the current one only when it strictly reduces the error, and
/// the first rejected pass ends the search.
///
/// The result is never worse than the input or the plain normalization
/// quantized to `f32`. Exact 1.0 is not reachable in general: each of the
/// four stored weights may be off by half an `f32` ulp, so the stored sum is
/// within `f32::EPSILON` of 1.0.
pub fn normalize_weights_for_f32(weights: [f64; 4]) -> [f64; 4] {
    let sum: f64 = weights.iter().sum();
    if (sum - 1.0).abs() < f64::EPSILON || sum <= 0.0 || !sum.is_finite() {
        return weights;
    }

    let mut best = weights;
    let mut best_error = quantized_error(&best);

    let naive = weights.map(|weight| to_f32_precision(weight / sum));
    let naive_error = quantized_error(&naive);
    if naive_error < best_error {
        best = naive;
        best_error = naive_error;
    }

    for _ in 0..MAX_NORMALIZE_ITERATIONS {
        if best_error == 0.0 {
            break;
        }
        let current_sum: f64 = best.iter().map(|weight| to_f32_precision(*weight)).sum();
        if current_sum <= 0.0 {
            break;
        }
        let candidate =
            best.map(|weight| to_f32_precision(to_f32_precision(weight) / current_sum));
        let candidate_error = quantized_error(&candidate);
        if candidate_error < best_error {
            best = candidate;
            best_error = candidate_error;
        } else {
            break;
        }
    }

    best
}

// ─── Per-vertex joint preparation ─────────────────────────────────────────────

/// Joint slots and weights ready for `JOINTS_0` / `WEIGHTS_0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct JointWeights {
    pub(crate) joints: [u16; 4],
    pub(crate) weights: [f32; 4],
}

/// Lossy adjustments applied while preparing one vertex.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct WeightAdjustments {
    pub(crate) truncated: bool,
    pub(crate) fallback: bool,
}

/// Turn host `(vertex group, weight)` pairs into four joint slots.
///
/// Groups without a joint are ignored, duplicate joints are merged, zero
/// weights are dropped, the strongest four are kept in descending order and
/// the result is normalized for `f32` storage. A vertex left with no weight
/// is bound to `fallback_joint` with weight 1.
pub(crate) fn prepare_vertex_weights(
    pairs: &[(usize, f32)],
    group_joints: &[Option<u16>],
    fallback_joint: u16,
) -> (JointWeights, WeightAdjustments) {
    let mut merged: Vec<(u16, f64)> = Vec::with_capacity(pairs.len());
    for &(group, weight) in pairs {
        if !weight.is_finite() || weight <= 0.0 {
            continue;
        }
        let Some(joint) = group_joints.get(group).copied().flatten() else {
            continue;
        };
        match merged.iter_mut().find(|(existing, _)| *existing == joint) {
            Some((_, total)) => *total += weight as f64,
            None => merged.push((joint, weight as f64)),
        }
    }

    merged.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)));

    let mut adjustments = WeightAdjustments::default();
    if merged.len() > 4 {
        adjustments.truncated = true;
        merged.truncate(4);
    }
    if merged.is_empty() {
        adjustments.fallback = true;
        merged.push((fallback_joint, 1.0));
    }

    let mut joints = [0u16; 4];
    let mut raw = [0.0f64; 4];
    for (lane, (joint, weight)) in merged.iter().enumerate() {
        joints[lane] = *joint;
        raw[lane] = *weight;
    }
    let normalized = normalize_weights_for_f32(raw);

    (
        JointWeights {
            joints,
            weights: normalized.map(|weight| weight as f32),
        },
        adjustments,
    )
}
