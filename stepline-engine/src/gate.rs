//! Dependency gate
//!
//! A component depends on every component before it. It may run only when
//! all of them have been executed.

use stepline_core::domain::component::PipelineComponent;

use crate::error::{EngineError, Result};

/// Whether the component at `index` may run
pub fn can_run(components: &[PipelineComponent], index: usize) -> bool {
    first_blocker(components, index).is_none()
}

/// Position of the first unexecuted component before `index`, if any
pub fn first_blocker(components: &[PipelineComponent], index: usize) -> Option<usize> {
    components
        .iter()
        .take(index)
        .position(|component| !component.executed)
}

/// Fails with [`EngineError::DependencyViolation`] when `index` may not run
pub fn check(components: &[PipelineComponent], index: usize) -> Result<()> {
    match first_blocker(components, index) {
        Some(blocking) => Err(EngineError::DependencyViolation { index, blocking }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepline_core::domain::component::ResourceRequest;

    fn sequence(flags: &[bool]) -> Vec<PipelineComponent> {
        flags
            .iter()
            .enumerate()
            .map(|(i, executed)| {
                let mut c = PipelineComponent::new(
                    format!("step {}", i),
                    "",
                    &format!("{:03}-step", i + 1),
                    ResourceRequest::default(),
                );
                c.executed = *executed;
                c
            })
            .collect()
    }

    #[test]
    fn test_first_component_can_always_run() {
        assert!(can_run(&sequence(&[false, false]), 0));
        assert!(can_run(&[], 0));
    }

    #[test]
    fn test_blocked_by_earlier_unexecuted() {
        let components = sequence(&[true, false, false]);
        assert!(can_run(&components, 1));
        assert!(!can_run(&components, 2));
        assert_eq!(first_blocker(&components, 2), Some(1));
    }

    #[test]
    fn test_reports_first_blocker() {
        let components = sequence(&[false, true, false, true]);
        assert_eq!(first_blocker(&components, 3), Some(0));
        assert!(matches!(
            check(&components, 3),
            Err(EngineError::DependencyViolation {
                index: 3,
                blocking: 0
            })
        ));
    }

    #[test]
    fn test_own_flag_is_irrelevant() {
        let components = sequence(&[true, true, false]);
        assert!(can_run(&components, 2));
        assert!(check(&components, 2).is_ok());
    }

    #[test]
    fn test_matches_predicate_for_all_small_sequences() {
        for bits in 0u32..(1 << 5) {
            let flags: Vec<bool> = (0..5).map(|i| bits & (1 << i) != 0).collect();
            let components = sequence(&flags);
            for index in 0..=flags.len() {
                let expected = flags[..index].iter().all(|executed| *executed);
                assert_eq!(can_run(&components, index), expected, "{:?} @ {}", flags, index);
            }
        }
    }
}
