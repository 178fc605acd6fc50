use std::sync::Arc;

use super::common::{
    admin, build_service, complete_edits, reviewer, subject, template_id, TestService,
};
use crate::workflows::appraisal::domain::{
    ActorContext, AssessmentId, AssessmentStatus, LayerEdits, Role, UserId,
};
use crate::workflows::appraisal::machine::EngineError;
use crate::workflows::appraisal::release::ReleaseCoordinator;
use crate::workflows::appraisal::service::OpenAssessment;

fn gated_assessment(service: &TestService, subject_actor: &ActorContext) -> AssessmentId {
    let opened = service
        .open(
            subject_actor,
            OpenAssessment {
                period: "2026-H1".to_string(),
                template_id: Some(template_id()),
            },
        )
        .expect("draft opens");
    service
        .save_self(&opened.id, subject_actor, complete_edits(3))
        .expect("self layer saves");
    service
        .submit(&opened.id, subject_actor)
        .expect("submission succeeds");
    service
        .advance(&opened.id, &reviewer(Role::Supervisor), complete_edits(3))
        .expect("supervisor review succeeds");
    service
        .advance(&opened.id, &reviewer(Role::Manager), complete_edits(3))
        .expect("manager review succeeds");
    service
        .advance(&opened.id, &admin(), LayerEdits::default())
        .expect("admin approval succeeds");
    opened.id
}

fn staff_actor(index: usize) -> ActorContext {
    ActorContext {
        id: UserId(format!("u-staff-{index}")),
        roles: vec![Role::Staff],
        department_id: Some(super::common::department_id()),
    }
}

#[test]
fn batch_release_counts_only_newly_released_rows() {
    let (service, _, _, _) = build_service();
    let coordinator = ReleaseCoordinator::new(Arc::clone(&service));

    let mut gated = Vec::new();
    for index in 0..5 {
        gated.push(gated_assessment(&service, &staff_actor(index)));
    }

    // One more, already through the gate.
    let released_early = gated_assessment(&service, &subject());
    service
        .release(&released_early, &admin())
        .expect("manual release succeeds");

    let report = coordinator
        .release_all(&admin())
        .expect("batch release succeeds");
    assert_eq!(report.released_count, 5);

    for id in &gated {
        let assessment = service.get(id).expect("assessment loads");
        assert_eq!(assessment.status, AssessmentStatus::Released);
    }

    // Second pass finds nothing left at the gate.
    let report = coordinator
        .release_all(&admin())
        .expect("batch release succeeds");
    assert_eq!(report.released_count, 0);
}

#[test]
fn batch_release_requires_the_admin_role() {
    let (service, _, _, _) = build_service();
    let coordinator = ReleaseCoordinator::new(Arc::clone(&service));

    let error = coordinator
        .release_all(&reviewer(Role::Manager))
        .expect_err("non-admin rejected");
    assert!(matches!(error, EngineError::Unauthorized { .. }));
}

#[test]
fn single_release_requires_the_gated_state() {
    let (service, _, _, _) = build_service();
    let coordinator = ReleaseCoordinator::new(Arc::clone(&service));

    let opened = service
        .open(
            &subject(),
            OpenAssessment {
                period: "2026-H1".to_string(),
                template_id: None,
            },
        )
        .expect("draft opens");

    let error = coordinator
        .release_one(&opened.id, &admin())
        .expect_err("draft cannot be released");
    assert!(matches!(error, EngineError::InvalidTransition { .. }));
}
