use fleetcore_errors::EngineError;
use fleetcore_errors::InvalidParameter;
use fleetcore_models::Cluster;
use serde::Deserialize;
use serde::Serialize;

/// How a `CLUSTER_RESIZE` action's `number` is interpreted against the
/// cluster's current `desired_capacity`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdjustmentType {
    ExactCapacity,
    ChangeInCapacity,
    ChangeInPercentage,
}

/// A `CLUSTER_RESIZE` action's inputs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResizeRequest {
    pub adjustment_type: AdjustmentType,
    pub number: f64,
    /// Floor on the absolute step size for `ChangeInPercentage`; defaults to 1.
    pub min_step: Option<i64>,
    /// `true` to fail rather than silently truncate against size bounds.
    pub strict: bool,
    /// Overrides the cluster's own bound when present.
    pub min_size: Option<i64>,
    /// Overrides the cluster's own bound when present; `-1` is unbounded.
    pub max_size: Option<i64>,
}

/// The new `(desired_capacity, min_size, max_size)` a resize settles on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResizeOutcome {
    pub desired_capacity: i64,
    pub min_size: i64,
    pub max_size: i64,
}

/// Computes the raw (untruncated) target capacity per §4.5.1.
fn raw_target(desired: i64, request: &ResizeRequest) -> i64 {
    match request.adjustment_type {
        AdjustmentType::ExactCapacity => request.number as i64,
        AdjustmentType::ChangeInCapacity => desired + request.number as i64,
        AdjustmentType::ChangeInPercentage => {
            let percentage = request.number;
            let raw = desired as f64 * (1.0 + percentage / 100.0);
            let min_step = request.min_step.unwrap_or(1).abs().max(1);
            let step = ((raw - desired as f64).abs().ceil() as i64).max(min_step);
            if percentage >= 0.0 {
                desired + step
            } else {
                desired - step
            }
        }
    }
}

/// Computes the resize outcome for `cluster`, truncating the raw target to
/// the effective `[min, max]` bounds. Fails when `request.strict` is set and
/// truncation would otherwise occur.
pub fn resize(cluster: &Cluster, request: &ResizeRequest) -> Result<ResizeOutcome, EngineError> {
    let raw = raw_target(cluster.desired_capacity, request);

    let (min, min_is_override) = match request.min_size {
        Some(min) => (min, true),
        None => (cluster.min_size, false),
    };
    let (max, max_is_override) = match request.max_size {
        Some(max) => (max, true),
        None => (cluster.max_size, false),
    };
    let effective_max = if max == -1 { i64::MAX } else { max };

    if raw < min {
        if request.strict {
            let owner = if min_is_override { "specified" } else { "cluster's" };
            return Err(InvalidParameter::new(
                "number",
                format!("The target capacity ({raw}) is less than the {owner} min_size ({min})."),
            )
            .into());
        }
        return Ok(ResizeOutcome {
            desired_capacity: min,
            min_size: min,
            max_size: max,
        });
    }

    if raw > effective_max {
        if request.strict {
            let owner = if max_is_override { "specified" } else { "cluster's" };
            return Err(InvalidParameter::new(
                "number",
                format!("The target capacity ({raw}) is greater than the {owner} max_size ({max})."),
            )
            .into());
        }
        return Ok(ResizeOutcome {
            desired_capacity: effective_max,
            min_size: min,
            max_size: max,
        });
    }

    Ok(ResizeOutcome {
        desired_capacity: raw,
        min_size: min,
        max_size: max,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetcore_models::UNBOUNDED_MAX_SIZE;

    fn cluster(min: i64, max: i64, desired: i64) -> Cluster {
        Cluster::new("c1", "n", "p1", "u", "proj", min, max, desired).unwrap()
    }

    #[test]
    fn exact_capacity_sets_target_directly() {
        let cluster = cluster(0, 10, 3);
        let request = ResizeRequest {
            adjustment_type: AdjustmentType::ExactCapacity,
            number: 7.0,
            min_step: None,
            strict: true,
            min_size: None,
            max_size: None,
        };
        let outcome = resize(&cluster, &request).unwrap();
        assert_eq!(outcome.desired_capacity, 7);
    }

    #[test]
    fn change_in_capacity_is_additive() {
        let cluster = cluster(0, 10, 3);
        let request = ResizeRequest {
            adjustment_type: AdjustmentType::ChangeInCapacity,
            number: 2.0,
            min_step: None,
            strict: true,
            min_size: None,
            max_size: None,
        };
        let outcome = resize(&cluster, &request).unwrap();
        assert_eq!(outcome.desired_capacity, 5);
    }

    #[test]
    fn change_in_percentage_rounds_up_and_respects_min_step() {
        let cluster = cluster(0, 100, 10);
        let request = ResizeRequest {
            adjustment_type: AdjustmentType::ChangeInPercentage,
            number: 25.0,
            min_step: Some(1),
            strict: true,
            min_size: None,
            max_size: None,
        };
        // raw = 10 * 1.25 = 12.5, step = ceil(2.5) = 3
        let outcome = resize(&cluster, &request).unwrap();
        assert_eq!(outcome.desired_capacity, 13);
    }

    #[test]
    fn change_in_percentage_negative_shrinks() {
        let cluster = cluster(0, 100, 10);
        let request = ResizeRequest {
            adjustment_type: AdjustmentType::ChangeInPercentage,
            number: -25.0,
            min_step: Some(1),
            strict: true,
            min_size: None,
            max_size: None,
        };
        let outcome = resize(&cluster, &request).unwrap();
        assert_eq!(outcome.desired_capacity, 7);
    }

    #[test]
    fn change_in_percentage_min_step_floors_small_moves() {
        let cluster = cluster(0, 100, 10);
        let request = ResizeRequest {
            adjustment_type: AdjustmentType::ChangeInPercentage,
            number: 1.0,
            min_step: Some(2),
            strict: true,
            min_size: None,
            max_size: None,
        };
        // raw = 10.1, step = max(ceil(0.1), 2) = 2
        let outcome = resize(&cluster, &request).unwrap();
        assert_eq!(outcome.desired_capacity, 12);
    }

    #[test]
    fn strict_failure_below_cluster_min_uses_exact_wording() {
        let cluster = cluster(5, 10, 5);
        let request = ResizeRequest {
            adjustment_type: AdjustmentType::ChangeInCapacity,
            number: -3.0,
            min_step: None,
            strict: true,
            min_size: None,
            max_size: None,
        };
        let error = resize(&cluster, &request).unwrap_err();
        match error {
            EngineError::InvalidParameter(e) => {
                assert_eq!(e.reason, "The target capacity (2) is less than the cluster's min_size (5).");
            }
            other => panic!("expected InvalidParameter, got {other:?}"),
        }
    }

    #[test]
    fn strict_failure_below_overridden_min_uses_specified_wording() {
        let cluster = cluster(0, 10, 5);
        let request = ResizeRequest {
            adjustment_type: AdjustmentType::ChangeInCapacity,
            number: -3.0,
            min_step: None,
            strict: true,
            min_size: Some(3),
            max_size: None,
        };
        let error = resize(&cluster, &request).unwrap_err();
        match error {
            EngineError::InvalidParameter(e) => {
                assert_eq!(e.reason, "The target capacity (2) is less than the specified min_size (3).");
            }
            other => panic!("expected InvalidParameter, got {other:?}"),
        }
    }

    #[test]
    fn non_strict_truncates_silently() {
        let cluster = cluster(5, 10, 5);
        let request = ResizeRequest {
            adjustment_type: AdjustmentType::ChangeInCapacity,
            number: -3.0,
            min_step: None,
            strict: false,
            min_size: None,
            max_size: None,
        };
        let outcome = resize(&cluster, &request).unwrap();
        assert_eq!(outcome.desired_capacity, 5);
    }

    #[test]
    fn unbounded_max_allows_any_growth() {
        let cluster = cluster(0, UNBOUNDED_MAX_SIZE, 3);
        let request = ResizeRequest {
            adjustment_type: AdjustmentType::ExactCapacity,
            number: 10_000.0,
            min_step: None,
            strict: true,
            min_size: None,
            max_size: None,
        };
        let outcome = resize(&cluster, &request).unwrap();
        assert_eq!(outcome.desired_capacity, 10_000);
    }
}
