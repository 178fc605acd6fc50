//! In-memory reference implementations of the three store traits. They carry
//! the same contracts a relational backend must honor: atomic template
//! creation, contiguous step renumbering with cascade, and the guarded
//! assessment write that serializes concurrent transitions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::blueprint::{
    DepartmentRole, DepartmentRoleId, StepDraft, StepId, WorkflowConfigError, WorkflowStep,
    WorkflowStore,
};
use super::catalog::{CatalogError, CatalogStore, RubricTemplate, TemplateDraft, TemplateId};
use super::domain::{
    validate_department_link, Assessment, AssessmentId, Department, DepartmentId, Role,
};
use super::repository::{
    AssessmentFilter, AssessmentRepository, RepositoryError, TransitionGuard,
};

#[derive(Default, Clone)]
pub struct MemoryCatalogStore {
    templates: Arc<Mutex<HashMap<TemplateId, RubricTemplate>>>,
}

impl CatalogStore for MemoryCatalogStore {
    fn create_template(&self, draft: TemplateDraft) -> Result<RubricTemplate, CatalogError> {
        // Validation happens before the lock so nothing partial is written.
        draft.validate()?;

        let mut guard = self.templates.lock().expect("catalog mutex poisoned");
        if guard.contains_key(&draft.id) {
            return Err(CatalogError::Conflict);
        }

        let template = RubricTemplate {
            id: draft.id.clone(),
            name: draft.name,
            version: 1,
            domains: draft.domains,
        };
        guard.insert(draft.id, template.clone());
        Ok(template)
    }

    fn fetch_template(&self, id: &TemplateId) -> Result<Option<RubricTemplate>, CatalogError> {
        let guard = self.templates.lock().expect("catalog mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn list_templates(&self) -> Result<Vec<RubricTemplate>, CatalogError> {
        let guard = self.templates.lock().expect("catalog mutex poisoned");
        let mut templates: Vec<RubricTemplate> = guard.values().cloned().collect();
        templates.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(templates)
    }
}

#[derive(Default)]
pub struct MemoryWorkflowStore {
    departments: Mutex<HashMap<DepartmentId, Department>>,
    roles: Mutex<HashMap<DepartmentRoleId, DepartmentRole>>,
    steps: Mutex<HashMap<StepId, WorkflowStep>>,
    step_sequence: AtomicU64,
}

impl MemoryWorkflowStore {
    fn next_step_id(&self) -> StepId {
        let id = self.step_sequence.fetch_add(1, Ordering::Relaxed);
        StepId(format!("step-{id:06}"))
    }

    fn ordered_steps(
        steps: &HashMap<StepId, WorkflowStep>,
        department_role_id: &DepartmentRoleId,
    ) -> Vec<WorkflowStep> {
        let mut owned: Vec<WorkflowStep> = steps
            .values()
            .filter(|step| step.department_role_id == *department_role_id)
            .cloned()
            .collect();
        owned.sort_by_key(|step| step.step_order);
        owned
    }

    fn renumber(steps: &mut HashMap<StepId, WorkflowStep>, department_role_id: &DepartmentRoleId) {
        let ordered = Self::ordered_steps(steps, department_role_id);
        for (position, step) in ordered.into_iter().enumerate() {
            if let Some(stored) = steps.get_mut(&step.id) {
                stored.step_order = position as u32 + 1;
            }
        }
    }
}

impl WorkflowStore for MemoryWorkflowStore {
    fn upsert_department(&self, department: Department) -> Result<(), WorkflowConfigError> {
        let mut guard = self.departments.lock().expect("workflow mutex poisoned");
        validate_department_link(&department, |id| guard.get(id).cloned())?;
        guard.insert(department.id.clone(), department);
        Ok(())
    }

    fn create_department_role(
        &self,
        department_role: DepartmentRole,
    ) -> Result<DepartmentRole, WorkflowConfigError> {
        let mut guard = self.roles.lock().expect("workflow mutex poisoned");
        let duplicate = guard.values().any(|existing| {
            existing.department_id == department_role.department_id
                && existing.role == department_role.role
        });
        if duplicate || guard.contains_key(&department_role.id) {
            return Err(WorkflowConfigError::Conflict);
        }
        guard.insert(department_role.id.clone(), department_role.clone());
        Ok(department_role)
    }

    fn update_department_role(
        &self,
        department_role: DepartmentRole,
    ) -> Result<(), WorkflowConfigError> {
        let mut guard = self.roles.lock().expect("workflow mutex poisoned");
        if !guard.contains_key(&department_role.id) {
            return Err(WorkflowConfigError::RoleNotFound);
        }
        guard.insert(department_role.id.clone(), department_role);
        Ok(())
    }

    fn delete_department_role(&self, id: &DepartmentRoleId) -> Result<(), WorkflowConfigError> {
        let mut roles = self.roles.lock().expect("workflow mutex poisoned");
        if roles.remove(id).is_none() {
            return Err(WorkflowConfigError::RoleNotFound);
        }
        // Cascade: steps cannot outlive their department role.
        let mut steps = self.steps.lock().expect("workflow mutex poisoned");
        steps.retain(|_, step| step.department_role_id != *id);
        Ok(())
    }

    fn fetch_department_role(
        &self,
        id: &DepartmentRoleId,
    ) -> Result<Option<DepartmentRole>, WorkflowConfigError> {
        let guard = self.roles.lock().expect("workflow mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn resolve(
        &self,
        department_id: Option<&DepartmentId>,
        role: Role,
    ) -> Result<Option<DepartmentRole>, WorkflowConfigError> {
        let guard = self.roles.lock().expect("workflow mutex poisoned");

        if let Some(department_id) = department_id {
            let scoped = guard.values().find(|candidate| {
                candidate.role == role
                    && candidate.department_id.as_ref() == Some(department_id)
            });
            if let Some(found) = scoped {
                return Ok(Some(found.clone()));
            }
        }

        Ok(guard
            .values()
            .find(|candidate| candidate.role == role && candidate.department_id.is_none())
            .cloned())
    }

    fn create_step(
        &self,
        department_role_id: &DepartmentRoleId,
        draft: StepDraft,
    ) -> Result<WorkflowStep, WorkflowConfigError> {
        {
            let roles = self.roles.lock().expect("workflow mutex poisoned");
            if !roles.contains_key(department_role_id) {
                return Err(WorkflowConfigError::RoleNotFound);
            }
        }

        let mut steps = self.steps.lock().expect("workflow mutex poisoned");
        let existing = Self::ordered_steps(&steps, department_role_id);
        let append_at = existing.len() as u32 + 1;
        let order = draft.step_order.unwrap_or(append_at);
        if order == 0 || order > append_at {
            return Err(WorkflowConfigError::InvalidStepOrder(order));
        }

        // Shift later steps down to keep orders contiguous.
        for step in steps.values_mut() {
            if step.department_role_id == *department_role_id && step.step_order >= order {
                step.step_order += 1;
            }
        }

        let step = WorkflowStep {
            id: self.next_step_id(),
            department_role_id: department_role_id.clone(),
            step_order: order,
            approver_role: draft.approver_role,
            kind: draft.kind,
        };
        steps.insert(step.id.clone(), step.clone());
        Ok(step)
    }

    fn update_step(&self, step: WorkflowStep) -> Result<(), WorkflowConfigError> {
        let mut steps = self.steps.lock().expect("workflow mutex poisoned");
        let Some(current) = steps.get(&step.id).cloned() else {
            return Err(WorkflowConfigError::StepNotFound);
        };

        let count = Self::ordered_steps(&steps, &current.department_role_id).len() as u32;
        if step.step_order == 0 || step.step_order > count {
            return Err(WorkflowConfigError::InvalidStepOrder(step.step_order));
        }

        // Reposition by removing, closing the gap, then re-inserting at the
        // target order.
        steps.remove(&current.id);
        for other in steps.values_mut() {
            if other.department_role_id == current.department_role_id
                && other.step_order > current.step_order
            {
                other.step_order -= 1;
            }
        }
        for other in steps.values_mut() {
            if other.department_role_id == current.department_role_id
                && other.step_order >= step.step_order
            {
                other.step_order += 1;
            }
        }
        steps.insert(
            step.id.clone(),
            WorkflowStep {
                department_role_id: current.department_role_id.clone(),
                ..step
            },
        );
        Self::renumber(&mut steps, &current.department_role_id);
        Ok(())
    }

    fn delete_step(&self, id: &StepId) -> Result<(), WorkflowConfigError> {
        let mut steps = self.steps.lock().expect("workflow mutex poisoned");
        let Some(removed) = steps.remove(id) else {
            return Err(WorkflowConfigError::StepNotFound);
        };
        Self::renumber(&mut steps, &removed.department_role_id);
        Ok(())
    }

    fn steps_for(
        &self,
        department_role_id: &DepartmentRoleId,
    ) -> Result<Vec<WorkflowStep>, WorkflowConfigError> {
        let steps = self.steps.lock().expect("workflow mutex poisoned");
        Ok(Self::ordered_steps(&steps, department_role_id))
    }
}

#[derive(Default, Clone)]
pub struct MemoryAssessmentRepository {
    records: Arc<Mutex<HashMap<AssessmentId, Assessment>>>,
}

impl AssessmentRepository for MemoryAssessmentRepository {
    fn insert(&self, assessment: Assessment) -> Result<Assessment, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&assessment.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(assessment.id.clone(), assessment.clone());
        Ok(assessment)
    }

    fn fetch(&self, id: &AssessmentId) -> Result<Option<Assessment>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn update_guarded(
        &self,
        assessment: Assessment,
        expected: &TransitionGuard,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let stored = guard
            .get(&assessment.id)
            .ok_or(RepositoryError::NotFound)?;
        if stored.status != expected.status
            || stored.current_step_index != expected.current_step_index
        {
            return Err(RepositoryError::Superseded);
        }
        guard.insert(assessment.id.clone(), assessment);
        Ok(())
    }

    fn list(&self, filter: &AssessmentFilter) -> Result<Vec<Assessment>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut matching: Vec<Assessment> = guard
            .values()
            .filter(|assessment| filter.matches(assessment))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matching)
    }
}
