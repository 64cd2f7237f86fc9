use fleetcore_errors::BadRequest;
use fleetcore_errors::EngineError;
use std::time::Duration;

/// A single wave of child actions to create, waiting on the previous wave.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Wave {
    pub size: u32,
}

/// Splits `count` items into waves of at most `batch_size`, per §4.5.2.
///
/// `batch_size = -1` produces a single wave; `batch_size = 0` is a policy
/// error. `pause_time` is not applied here — the engine sleeps between
/// waves itself, since that sleep must be cancel-aware.
pub fn plan_waves(count: u32, batch_size: i64) -> Result<Vec<Wave>, EngineError> {
    if count == 0 {
        return Ok(Vec::new());
    }
    if batch_size == 0 {
        return Err(BadRequest::new("batch_size of 0 cannot make progress").into());
    }
    if batch_size < 0 {
        return Ok(vec![Wave { size: count }]);
    }

    let batch_size = batch_size as u32;
    let mut waves = Vec::new();
    let mut remaining = count;
    while remaining > 0 {
        let size = remaining.min(batch_size);
        waves.push(Wave { size });
        remaining -= size;
    }
    Ok(waves)
}

/// The pause applied between waves, cancel-aware at the call site.
pub fn pause_between_waves(pause_time: u64) -> Duration {
    Duration::from_secs(pause_time)
}
