use chrono::Utc;
use perfomix_server::evaluations::{build_evaluation_rows, compute_overall_score, status};
use perfomix_server::matrices::{resolve_status, validate_weightages, WeightedParameterInput};
use perfomix_server::notifications::{priority, reminder_priority, NotificationTemplate};
use uuid::Uuid;

fn weighted(weights: &[i32]) -> Vec<WeightedParameterInput> {
    weights
        .iter()
        .map(|w| WeightedParameterInput {
            parameter_id: Uuid::new_v4(),
            weightage: *w,
        })
        .collect()
}

#[test]
fn matrix_activation_requires_full_weightage() {
    // A 60/40 split activates; a 60/30 split is capped at draft.
    let full = weighted(&[60, 40]);
    let sum = validate_weightages(&full).unwrap();
    assert_eq!(resolve_status(Some("active"), sum).unwrap(), "active");

    let partial = weighted(&[60, 30]);
    let sum = validate_weightages(&partial).unwrap();
    assert_eq!(resolve_status(Some("active"), sum).unwrap(), "draft");

    assert!(validate_weightages(&weighted(&[60, 50])).is_err());
}

#[test]
fn activation_expansion_matches_member_times_parameter() {
    let assignment_id = Uuid::new_v4();
    let manager_id = Uuid::new_v4();
    let members: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
    let parameters: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();

    let (evals, details, statuses) =
        build_evaluation_rows(assignment_id, manager_id, &members, &parameters, Utc::now());

    assert_eq!(evals.len(), members.len());
    assert_eq!(details.len(), members.len() * parameters.len());
    assert_eq!(statuses.len(), members.len() * parameters.len());

    // Every seeded row starts pending and unscored.
    assert!(evals
        .iter()
        .all(|e| e.status == status::PENDING && e.overall_score.is_none()));
    assert!(details.iter().all(|d| d.score.is_none()));

    // Each evaluation owns exactly one detail row per parameter.
    for eval in &evals {
        let owned: Vec<_> = details
            .iter()
            .filter(|d| d.evaluation_id == eval.id)
            .collect();
        assert_eq!(owned.len(), parameters.len());
    }
}

#[test]
fn overall_score_worked_example() {
    // Matrix: A(60%), B(40%); scores A=80, B=50 => 0.6*80 + 0.4*50 = 68.
    let overall = compute_overall_score(&[(80.0, 60), (50.0, 40)]);
    assert!((overall - 68.0).abs() < 1e-9);
}

#[test]
fn reminder_tiers_follow_days_remaining() {
    assert_eq!(reminder_priority(7), Some(priority::NORMAL));
    assert_eq!(reminder_priority(3), Some(priority::HIGH));
    assert_eq!(reminder_priority(1), Some(priority::URGENT));
    for days in [0, 2, 4, 5, 6, 8, 30] {
        assert_eq!(reminder_priority(days), None);
    }

    let cycle_id = Uuid::new_v4();
    let tpl = NotificationTemplate::deadline_reminder("Q1", cycle_id, 1, 2, priority::URGENT);
    assert_eq!(tpl.priority, priority::URGENT);
    assert_eq!(tpl.metadata["cycle_id"], serde_json::json!(cycle_id));
}
