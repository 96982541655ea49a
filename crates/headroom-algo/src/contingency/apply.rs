use super::Contingency;
use headroom_core::{Case, EdgeKind, HeadroomError, HeadroomResult};
use std::ops::Deref;
use tracing::trace;

/// Scoped outage. Dropping the guard puts every touched element back to the
/// status it had before [`apply_contingency`], whatever the exit path.
#[derive(Debug)]
pub struct OutageGuard<'a> {
    case: &'a mut Case,
    restore: Vec<(EdgeKind, usize, bool)>,
    index: usize,
}

impl OutageGuard<'_> {
    /// False when every referenced element was already out of service.
    pub fn changed(&self) -> bool {
        self.restore.iter().any(|&(_, _, previous)| previous)
    }

    /// Number of elements switched out by this guard.
    pub fn switched(&self) -> usize {
        self.restore.iter().filter(|&&(_, _, previous)| previous).count()
    }

    /// Restore now instead of at end of scope.
    pub fn release(self) {}
}

impl Deref for OutageGuard<'_> {
    type Target = Case;

    fn deref(&self) -> &Case {
        &*self.case
    }
}

impl Drop for OutageGuard<'_> {
    fn drop(&mut self) {
        for &(kind, idx, previous) in self.restore.iter().rev() {
            self.case.set_edge_in_service(kind, idx, previous);
        }
        trace!(scenario = self.index, "contingency released");
    }
}

/// Take every element of `contingency` out of service.
///
/// All references are resolved before the case is touched; a missing element
/// fails with [`HeadroomError::InvalidTopologyReference`] and leaves the case
/// unchanged.
pub fn apply_contingency<'a>(
    case: &'a mut Case,
    contingency: &Contingency,
) -> HeadroomResult<OutageGuard<'a>> {
    let mut targets = Vec::new();
    for outage in &contingency.outages {
        let positions = outage.locate(case);
        if positions.is_empty() {
            return Err(HeadroomError::InvalidTopologyReference {
                scenario: contingency.index,
                element: outage.describe(),
            });
        }
        let kind = outage.kind();
        targets.extend(positions.into_iter().map(|idx| (kind, idx)));
    }

    let mut restore = Vec::with_capacity(targets.len());
    for (kind, idx) in targets {
        let previous = case.set_edge_in_service(kind, idx, false);
        restore.push((kind, idx, previous));
    }
    trace!(
        scenario = contingency.index,
        label = %contingency.label,
        elements = restore.len(),
        "contingency applied"
    );

    Ok(OutageGuard {
        case,
        restore,
        index: contingency.index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contingency::{BranchOutage, ContingencyScenario, Outage, OutageGroup, TrafoOutage};
    use headroom_core::{Branch, Bus, BusId, BusKind, Transformer};

    fn case() -> Case {
        let mut case = Case::new("guard", 100.0);
        case.add_bus(Bus::new(BusId::new(1)).with_kind(BusKind::Swing))
            .unwrap();
        case.add_bus(Bus::new(BusId::new(2))).unwrap();
        case.add_bus(Bus::new(BusId::new(3))).unwrap();
        case.add_branch(Branch::new(BusId::new(1), BusId::new(2), 0.1))
            .unwrap();
        case.add_branch(Branch::new(BusId::new(1), BusId::new(2), 0.1).with_circuit("2"))
            .unwrap();
        case.add_transformer(Transformer::new(BusId::new(2), BusId::new(3), 0.05))
            .unwrap();
        case
    }

    fn single(outage: impl Into<Outage>) -> Contingency {
        let outage = outage.into();
        Contingency {
            index: 0,
            label: outage.describe(),
            outages: vec![outage],
        }
    }

    #[test]
    fn guard_restores_on_drop() {
        let mut case = case();
        let before = case.snapshot();
        {
            let guard = apply_contingency(
                &mut case,
                &single(BranchOutage::new(BusId::new(1), BusId::new(2))),
            )
            .unwrap();
            assert!(guard.changed());
            assert_eq!(guard.switched(), 2);
            assert!(guard.branches().iter().all(|b| !b.in_service));
        }
        assert_eq!(case.snapshot(), before);
    }

    #[test]
    fn explicit_release_restores() {
        let mut case = case();
        let guard = apply_contingency(
            &mut case,
            &single(TrafoOutage::new(BusId::new(3), BusId::new(2))),
        )
        .unwrap();
        assert!(!guard.transformers()[0].in_service);
        guard.release();
        assert!(case.transformers()[0].in_service);
    }

    #[test]
    fn already_out_elements_stay_out() {
        let mut case = case();
        case.set_branch_in_service(1, false);
        {
            let guard = apply_contingency(
                &mut case,
                &single(BranchOutage::new(BusId::new(1), BusId::new(2)).with_circuit("2")),
            )
            .unwrap();
            assert!(!guard.changed());
        }
        assert!(!case.branches()[1].in_service);
        assert!(case.branches()[0].in_service);
    }

    #[test]
    fn overlapping_group_restores_original_status() {
        let mut case = case();
        let before = case.snapshot();
        let scenario = ContingencyScenario {
            groups: vec![OutageGroup {
                label: None,
                outages: vec![
                    BranchOutage::new(BusId::new(1), BusId::new(2)).into(),
                    BranchOutage::new(BusId::new(1), BusId::new(2))
                        .with_circuit("1")
                        .into(),
                ],
            }],
            ..Default::default()
        };
        let contingency = &scenario.contingencies()[0];
        drop(apply_contingency(&mut case, contingency).unwrap());
        assert_eq!(case.snapshot(), before);
    }

    #[test]
    fn missing_element_leaves_case_untouched() {
        let mut case = case();
        let before = case.snapshot();
        let contingency = Contingency {
            index: 4,
            label: "bad".into(),
            outages: vec![
                BranchOutage::new(BusId::new(1), BusId::new(2)).into(),
                TrafoOutage::new(BusId::new(1), BusId::new(3)).into(),
            ],
        };
        let err = apply_contingency(&mut case, &contingency).unwrap_err();
        assert!(matches!(
            err,
            HeadroomError::InvalidTopologyReference { scenario: 4, .. }
        ));
        assert_eq!(case.snapshot(), before);
    }

    #[test]
    fn guard_restores_during_unwind() {
        let mut case = case();
        let before = case.snapshot();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = apply_contingency(
                &mut case,
                &single(BranchOutage::new(BusId::new(1), BusId::new(2))),
            )
            .unwrap();
            panic!("solver blew up");
        }));
        assert!(result.is_err());
        assert_eq!(case.snapshot(), before);
    }
}
