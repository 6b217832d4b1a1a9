// self
use crate::obs::{PhaseKind, PhaseOutcome};

/// Records a phase outcome via the global metrics recorder (when enabled).
pub fn record_phase_outcome(kind: PhaseKind, outcome: PhaseOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"oidc_strategy_phase_total",
			"phase" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn record_phase_outcome_noop_without_metrics() {
		record_phase_outcome(PhaseKind::Callback, PhaseOutcome::Failure);
	}
}
