//! Stage computation from declared access sets.
//!
//! The scheduler groups the systems taking part in a phase into **stages**.
//! Systems within a stage have no conflicts and may run in parallel. Stages
//! execute sequentially with a barrier between them.

use sim_component::Access;

/// A system as seen by the scheduler.
#[derive(Debug, Clone)]
pub struct RegisteredSystem {
    /// The system name (e.g. `"velocity_seed"`).
    pub name: String,
    /// The system's declared access.
    pub access: Access,
}

/// A group of systems that can run in parallel (no conflicts).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stage {
    /// Indices into the scheduled system list, ascending.
    pub system_indices: Vec<usize>,
}

/// Computes execution stages from systems in registration order.
///
/// Each system goes into the stage right after the last stage holding an
/// earlier system it conflicts with (or the first stage if there is none):
///
/// ```text
/// stage(i) = 1 + max { stage(j) : j < i, conflicts(i, j) }   (0 if empty)
/// ```
///
/// Any two conflicting systems therefore keep their registration order, so
/// running stage by stage is equivalent to running every system in sequence.
#[must_use]
pub fn compute_stages(systems: &[RegisteredSystem]) -> Vec<Stage> {
    let mut stages: Vec<Stage> = Vec::new();
    let mut placement: Vec<usize> = Vec::with_capacity(systems.len());

    for (sys_idx, system) in systems.iter().enumerate() {
        let target = systems[..sys_idx]
            .iter()
            .zip(&placement)
            .filter(|(earlier, _)| system.access.conflicts_with(&earlier.access))
            .map(|(_, &stage)| stage + 1)
            .max()
            .unwrap_or(0);

        if target == stages.len() {
            stages.push(Stage::default());
        }
        stages[target].system_indices.push(sys_idx);
        placement.push(target);
    }

    stages
}

#[cfg(test)]
mod tests {
    use sim_component::{ComponentAccess, ComponentTypeId};

    use super::*;

    fn make_system(name: &str, reads: &[u64], writes: &[u64]) -> RegisteredSystem {
        let mut access = ComponentAccess::new();
        for &r in reads {
            access = access.read_id(ComponentTypeId(r));
        }
        for &w in writes {
            access = access.write_id(ComponentTypeId(w));
        }
        RegisteredSystem {
            name: name.to_string(),
            access: access.into(),
        }
    }

    fn exclusive(name: &str) -> RegisteredSystem {
        RegisteredSystem {
            name: name.to_string(),
            access: Access::Exclusive,
        }
    }

    #[test]
    fn test_no_systems_no_stages() {
        assert!(compute_stages(&[]).is_empty());
    }

    #[test]
    fn test_non_conflicting_systems_same_stage() {
        // seed: reads Seed(1), writes Velocity(2)
        // probe: reads Pose(3), writes Contact(4)
        let systems = vec![make_system("seed", &[1], &[2]), make_system("probe", &[3], &[4])];
        let stages = compute_stages(&systems);
        assert_eq!(stages.len(), 1, "non-conflicting systems should share a stage");
        assert_eq!(stages[0].system_indices, vec![0, 1]);
    }

    #[test]
    fn test_conflicting_systems_keep_order() {
        // seed writes Velocity(2); integrate reads Velocity(2), writes Pose(3)
        let systems = vec![make_system("seed", &[1], &[2]), make_system("integrate", &[2], &[3])];
        let stages = compute_stages(&systems);
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].system_indices, vec![0]);
        assert_eq!(stages[1].system_indices, vec![1]);
    }

    #[test]
    fn test_later_system_does_not_jump_ahead_of_conflict() {
        // a writes 1; b reads 1; c writes 2 and is read by b.
        // c must not land in a stage before b, even though stage 0 is free of
        // conflicts for it.
        let systems = vec![
            make_system("a", &[], &[1]),
            make_system("b", &[1, 2], &[]),
            make_system("c", &[], &[2]),
        ];
        let stages = compute_stages(&systems);
        assert_eq!(stages[0].system_indices, vec![0]);
        assert_eq!(stages[1].system_indices, vec![1]);
        assert_eq!(stages[2].system_indices, vec![2]);
    }

    #[test]
    fn test_exclusive_systems_run_alone() {
        let systems = vec![
            make_system("seed", &[1], &[2]),
            exclusive("legacy"),
            make_system("probe", &[3], &[4]),
        ];
        let stages = compute_stages(&systems);
        assert_eq!(stages.len(), 3);
        assert_eq!(stages[1].system_indices, vec![1]);
    }

    #[test]
    fn test_readers_share_a_stage_after_writer() {
        let systems = vec![
            make_system("seed", &[], &[2]),
            make_system("log", &[2], &[]),
            make_system("integrate", &[2], &[3]),
        ];
        let stages = compute_stages(&systems);
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[1].system_indices, vec![1, 2]);
    }
}
