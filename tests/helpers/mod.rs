//! In-memory fakes of the store, backend and scheduler seams.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use bulk_course_gen::models::bulk::{BulkGenerationRequest, TaskView};
use bulk_course_gen::models::course::{AssignmentNotice, NewCourse, NewEnrollment};
use bulk_course_gen::models::employee::{EmployeeProfile, EmployeeSummary};
use bulk_course_gen::models::job::{
    BulkJob, BulkTask, DifficultyLevel, GroupType, JobProgress, JobStatus, NewBulkJob, TaskResult,
    TaskStatus,
};
use bulk_course_gen::services::generation::{
    GeneratedContent, GenerationBackend, GenerationError, GenerationRequest,
};
use bulk_course_gen::services::processor::JobProcessor;
use bulk_course_gen::services::queue::{JobScheduler, QueueError};
use bulk_course_gen::services::store::{CourseCatalog, EmployeeDirectory, JobStore, StoreError};
use bulk_course_gen::services::submission::SubmissionService;

pub const PER_TASK_MINUTES: f64 = 0.5;

pub struct EmployeeRecord {
    pub profile: EmployeeProfile,
    pub department_id: Uuid,
    pub position_id: Uuid,
    pub active: bool,
}

/// Switches that make individual store operations fail.
#[derive(Default)]
pub struct Failures {
    pub create_tasks: bool,
    pub delete_job: bool,
    pub pending_tasks: bool,
    pub profile_for: HashSet<Uuid>,
    pub enroll_for: HashSet<Uuid>,
    pub notify: bool,
    /// Employees whose task cannot be marked completed.
    pub complete_task_for: HashSet<Uuid>,
    /// Employees whose task cannot be marked failed.
    pub fail_task_for: HashSet<Uuid>,
    pub sync_counts: bool,
}

#[derive(Default)]
pub struct State {
    pub jobs: HashMap<Uuid, BulkJob>,
    pub tasks: Vec<BulkTask>,
    pub employees: Vec<EmployeeRecord>,
    pub courses: Vec<(Uuid, NewCourse)>,
    pub enrollments: Vec<(Uuid, NewEnrollment)>,
    pub notices: Vec<AssignmentNotice>,
    /// Current owner of each processing job.
    pub claims: HashMap<Uuid, Uuid>,
    /// Every counter write, in order: (job, completed, failed).
    pub count_history: Vec<(Uuid, i32, i32)>,
    pub failures: Failures,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

fn unavailable() -> StoreError {
    StoreError::Database(sqlx::Error::PoolTimedOut)
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn seed_employee(&self, name: &str, department_id: Uuid, active: bool) -> Uuid {
        let id = Uuid::new_v4();
        self.with_state(|s| {
            s.employees.push(EmployeeRecord {
                profile: EmployeeProfile {
                    id,
                    name: name.to_string(),
                    email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
                    department: Some("Engineering".to_string()),
                    position: Some("Engineer".to_string()),
                    experience: None,
                    skills: vec!["Rust".to_string(), "SQL".to_string()],
                },
                department_id,
                position_id: Uuid::new_v4(),
                active,
            })
        });
        id
    }

    pub fn job(&self, job_id: Uuid) -> BulkJob {
        self.with_state(|s| s.jobs.get(&job_id).cloned().expect("job exists"))
    }

    pub fn job_count(&self) -> usize {
        self.with_state(|s| s.jobs.len())
    }

    pub fn tasks_for(&self, job_id: Uuid) -> Vec<BulkTask> {
        self.with_state(|s| {
            let mut tasks: Vec<BulkTask> =
                s.tasks.iter().filter(|t| t.job_id == job_id).cloned().collect();
            tasks.sort_by_key(|t| (t.sequence, t.id));
            tasks
        })
    }

    pub fn task_for_employee(&self, job_id: Uuid, employee_id: Uuid) -> BulkTask {
        self.tasks_for(job_id)
            .into_iter()
            .find(|t| t.employee_id == employee_id)
            .expect("task exists")
    }

    /// Force a job into `processing` with the given heartbeat.
    pub fn mark_processing(&self, job_id: Uuid, heartbeat: DateTime<Utc>) {
        self.with_state(|s| {
            let job = s.jobs.get_mut(&job_id).expect("job exists");
            job.status = JobStatus::Processing;
            job.updated_at = heartbeat;
        });
    }

    /// Age the heartbeat of a processing job, keeping its owner.
    pub fn age_heartbeat(&self, job_id: Uuid, heartbeat: DateTime<Utc>) {
        self.with_state(|s| {
            s.jobs.get_mut(&job_id).expect("job exists").updated_at = heartbeat;
        });
    }

    fn owns(s: &State, job_id: Uuid, claim_id: Uuid) -> bool {
        s.claims.get(&job_id) == Some(&claim_id)
            && s.jobs.get(&job_id).map(|j| j.status) == Some(JobStatus::Processing)
    }

    fn employee_of(s: &State, task_id: Uuid) -> Option<Uuid> {
        s.tasks.iter().find(|t| t.id == task_id).map(|t| t.employee_id)
    }

    pub fn set_task_status(&self, task_id: Uuid, status: TaskStatus) {
        self.with_state(|s| {
            let task = s.tasks.iter_mut().find(|t| t.id == task_id).expect("task exists");
            task.status = status;
        });
    }
}

#[async_trait]
impl JobStore for InMemoryStore {
    async fn create_job(&self, job: &NewBulkJob) -> Result<BulkJob, StoreError> {
        let now = Utc::now();
        let record = BulkJob {
            id: Uuid::new_v4(),
            group_type: job.group_type,
            group_id: job.group_id,
            title: job.title.clone(),
            description: job.description.clone(),
            difficulty_level: job.difficulty_level,
            send_notifications: job.send_notifications,
            status: JobStatus::Pending,
            total_count: job.total_count,
            completed_count: 0,
            failed_count: 0,
            created_by: job.created_by,
            created_at: now,
            started_at: None,
            updated_at: now,
            completed_at: None,
        };
        self.with_state(|s| s.jobs.insert(record.id, record.clone()));
        Ok(record)
    }

    async fn create_tasks(&self, job_id: Uuid, employee_ids: &[Uuid]) -> Result<u64, StoreError> {
        self.with_state(|s| {
            if s.failures.create_tasks {
                return Err(unavailable());
            }
            let now = Utc::now();
            for (i, employee_id) in employee_ids.iter().enumerate() {
                s.tasks.push(BulkTask {
                    id: Uuid::new_v4(),
                    job_id,
                    employee_id: *employee_id,
                    sequence: i as i32 + 1,
                    status: TaskStatus::Pending,
                    content_id: None,
                    course_id: None,
                    error_message: None,
                    created_at: now,
                    completed_at: None,
                });
            }
            Ok(employee_ids.len() as u64)
        })
    }

    async fn delete_job(&self, job_id: Uuid) -> Result<(), StoreError> {
        self.with_state(|s| {
            if s.failures.delete_job {
                return Err(unavailable());
            }
            s.jobs.remove(&job_id);
            s.tasks.retain(|t| t.job_id != job_id);
            Ok(())
        })
    }

    async fn find_job_for_creator(
        &self,
        job_id: Uuid,
        creator: Uuid,
    ) -> Result<Option<BulkJob>, StoreError> {
        Ok(self.with_state(|s| {
            s.jobs
                .get(&job_id)
                .filter(|j| j.created_by == creator)
                .cloned()
        }))
    }

    async fn claim_job(
        &self,
        job_id: Uuid,
        claim_id: Uuid,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<BulkJob>, StoreError> {
        Ok(self.with_state(|s| {
            let job = s.jobs.get_mut(&job_id)?;
            let claimable = job.status == JobStatus::Pending
                || (job.status == JobStatus::Processing && job.updated_at < stale_before);
            if !claimable {
                return None;
            }
            let now = Utc::now();
            job.status = JobStatus::Processing;
            job.started_at.get_or_insert(now);
            job.updated_at = now;
            let claimed = job.clone();
            s.claims.insert(job_id, claim_id);
            Some(claimed)
        }))
    }

    async fn touch_job(&self, job_id: Uuid, claim_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.with_state(|s| {
            if !Self::owns(s, job_id, claim_id) {
                return false;
            }
            if let Some(job) = s.jobs.get_mut(&job_id) {
                job.updated_at = Utc::now();
            }
            true
        }))
    }

    async fn pending_tasks(&self, job_id: Uuid) -> Result<Vec<BulkTask>, StoreError> {
        if self.with_state(|s| s.failures.pending_tasks) {
            return Err(unavailable());
        }
        Ok(self
            .tasks_for(job_id)
            .into_iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .collect())
    }

    async fn interrupted_tasks(&self, job_id: Uuid) -> Result<Vec<BulkTask>, StoreError> {
        Ok(self
            .tasks_for(job_id)
            .into_iter()
            .filter(|t| t.status == TaskStatus::Processing)
            .collect())
    }

    async fn start_task(
        &self,
        job_id: Uuid,
        claim_id: Uuid,
        task_id: Uuid,
    ) -> Result<bool, StoreError> {
        Ok(self.with_state(|s| {
            if !Self::owns(s, job_id, claim_id) {
                return false;
            }
            if let Some(job) = s.jobs.get_mut(&job_id) {
                job.updated_at = Utc::now();
            }
            let Some(task) = s
                .tasks
                .iter_mut()
                .find(|t| t.id == task_id && t.job_id == job_id)
            else {
                return false;
            };
            if task.status != TaskStatus::Pending {
                return false;
            }
            task.status = TaskStatus::Processing;
            true
        }))
    }

    async fn complete_task(&self, task_id: Uuid, result: &TaskResult) -> Result<bool, StoreError> {
        self.with_state(|s| {
            let employee = Self::employee_of(s, task_id);
            if employee.is_some_and(|e| s.failures.complete_task_for.contains(&e)) {
                return Err(unavailable());
            }
            let Some(task) = s.tasks.iter_mut().find(|t| t.id == task_id) else {
                return Ok(false);
            };
            if task.status != TaskStatus::Processing {
                return Ok(false);
            }
            task.status = TaskStatus::Completed;
            task.content_id = Some(result.content_id.clone());
            task.course_id = Some(result.course_id);
            task.completed_at = Some(Utc::now());
            Ok(true)
        })
    }

    async fn fail_task(&self, task_id: Uuid, error: &str) -> Result<bool, StoreError> {
        self.with_state(|s| {
            let employee = Self::employee_of(s, task_id);
            if employee.is_some_and(|e| s.failures.fail_task_for.contains(&e)) {
                return Err(unavailable());
            }
            let Some(task) = s.tasks.iter_mut().find(|t| t.id == task_id) else {
                return Ok(false);
            };
            if task.status != TaskStatus::Processing {
                return Ok(false);
            }
            task.status = TaskStatus::Failed;
            task.error_message = Some(error.to_string());
            task.completed_at = Some(Utc::now());
            Ok(true)
        })
    }

    async fn sync_job_counts(
        &self,
        job_id: Uuid,
        claim_id: Uuid,
    ) -> Result<Option<JobProgress>, StoreError> {
        self.with_state(|s| {
            if s.failures.sync_counts {
                return Err(unavailable());
            }
            if !Self::owns(s, job_id, claim_id) {
                return Ok(None);
            }
            let mut progress = JobProgress::default();
            for task in s.tasks.iter().filter(|t| t.job_id == job_id) {
                match task.status {
                    TaskStatus::Completed => progress.completed += 1,
                    TaskStatus::Failed => progress.failed += 1,
                    TaskStatus::Pending | TaskStatus::Processing => {}
                }
            }
            if let Some(job) = s.jobs.get_mut(&job_id) {
                job.completed_count = progress.completed;
                job.failed_count = progress.failed;
                job.updated_at = Utc::now();
            }
            s.count_history
                .push((job_id, progress.completed, progress.failed));
            Ok(Some(progress))
        })
    }

    async fn finish_job(
        &self,
        job_id: Uuid,
        claim_id: Uuid,
        status: JobStatus,
    ) -> Result<bool, StoreError> {
        Ok(self.with_state(|s| {
            if !Self::owns(s, job_id, claim_id) {
                return false;
            }
            if let Some(job) = s.jobs.get_mut(&job_id) {
                job.status = status;
                job.completed_at = Some(Utc::now());
            }
            true
        }))
    }

    async fn list_tasks(&self, job_id: Uuid) -> Result<Vec<TaskView>, StoreError> {
        let tasks = self.tasks_for(job_id);
        Ok(self.with_state(|s| {
            tasks
                .into_iter()
                .map(|task| {
                    let employee = s
                        .employees
                        .iter()
                        .find(|e| e.profile.id == task.employee_id)
                        .map(|e| EmployeeSummary {
                            id: e.profile.id,
                            name: e.profile.name.clone(),
                            email: e.profile.email.clone(),
                        });
                    TaskView { task, employee }
                })
                .collect()
        }))
    }
}

#[async_trait]
impl EmployeeDirectory for InMemoryStore {
    async fn active_employees_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, StoreError> {
        Ok(self.with_state(|s| {
            s.employees
                .iter()
                .filter(|e| e.active && ids.contains(&e.profile.id))
                .map(|e| e.profile.id)
                .collect()
        }))
    }

    async fn active_employees_in_group(
        &self,
        group_type: GroupType,
        group_id: Uuid,
    ) -> Result<Vec<Uuid>, StoreError> {
        Ok(self.with_state(|s| {
            s.employees
                .iter()
                .filter(|e| e.active)
                .filter(|e| match group_type {
                    GroupType::Department => e.department_id == group_id,
                    GroupType::Position => e.position_id == group_id,
                })
                .map(|e| e.profile.id)
                .collect()
        }))
    }

    async fn employee_profile(
        &self,
        employee_id: Uuid,
    ) -> Result<Option<EmployeeProfile>, StoreError> {
        self.with_state(|s| {
            if s.failures.profile_for.contains(&employee_id) {
                return Err(unavailable());
            }
            Ok(s
                .employees
                .iter()
                .find(|e| e.profile.id == employee_id)
                .map(|e| e.profile.clone()))
        })
    }
}

#[async_trait]
impl CourseCatalog for InMemoryStore {
    async fn create_course(&self, course: &NewCourse) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        self.with_state(|s| s.courses.push((id, course.clone())));
        Ok(id)
    }

    async fn enroll(&self, enrollment: &NewEnrollment) -> Result<Uuid, StoreError> {
        self.with_state(|s| {
            if s.failures.enroll_for.contains(&enrollment.employee_id) {
                return Err(unavailable());
            }
            let id = Uuid::new_v4();
            s.enrollments.push((id, enrollment.clone()));
            Ok(id)
        })
    }

    async fn notify_assignment(&self, notice: &AssignmentNotice) -> Result<(), StoreError> {
        self.with_state(|s| {
            if s.failures.notify {
                return Err(unavailable());
            }
            s.notices.push(notice.clone());
            Ok(())
        })
    }

    async fn withdraw_course(&self, course_id: Uuid) -> Result<(), StoreError> {
        self.with_state(|s| {
            s.notices.retain(|n| n.course_id != course_id);
            s.enrollments.retain(|(_, e)| e.course_id != course_id);
            s.courses.retain(|(id, _)| *id != course_id);
        });
        Ok(())
    }
}

/// Pauses the backend inside one employee's call until released.
pub struct Gate {
    pub employee_id: Uuid,
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

/// Generation backend that fails, panics or blocks for chosen employees.
#[derive(Default)]
pub struct ScriptedBackend {
    pub failing: Mutex<HashSet<Uuid>>,
    pub panic_for: Mutex<Option<Uuid>>,
    pub gate: Mutex<Option<Gate>>,
    pub calls: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_for(ids: &[Uuid]) -> Arc<Self> {
        let backend = Self::default();
        backend.failing.lock().unwrap().extend(ids.iter().copied());
        Arc::new(backend)
    }

    pub fn calls(&self) -> Vec<GenerationRequest> {
        self.calls.lock().unwrap().clone()
    }

    /// Block generation for `employee_id`. Returns the (entered, release)
    /// pair: `entered` fires once the call starts, `release` lets it finish.
    pub fn block_on(&self, employee_id: Uuid) -> (Arc<Notify>, Arc<Notify>) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Gate {
            employee_id,
            entered: entered.clone(),
            release: release.clone(),
        });
        (entered, release)
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedContent, GenerationError> {
        self.calls.lock().unwrap().push(request.clone());

        let gate = self
            .gate
            .lock()
            .unwrap()
            .as_ref()
            .filter(|g| g.employee_id == request.employee_id)
            .map(|g| (g.entered.clone(), g.release.clone()));
        if let Some((entered, release)) = gate {
            entered.notify_one();
            release.notified().await;
        }

        if *self.panic_for.lock().unwrap() == Some(request.employee_id) {
            panic!("backend exploded for {}", request.employee_id);
        }
        if self.failing.lock().unwrap().contains(&request.employee_id) {
            return Err(GenerationError::Status {
                status: 502,
                body: "upstream unavailable".to_string(),
            });
        }

        Ok(GeneratedContent {
            content_id: format!("content-{}", request.employee_id),
        })
    }
}

/// Scheduler that records job ids instead of queueing them.
#[derive(Default)]
pub struct RecordingScheduler {
    pub scheduled: Mutex<Vec<Uuid>>,
    pub fail: bool,
}

impl RecordingScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            scheduled: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    pub fn scheduled(&self) -> Vec<Uuid> {
        self.scheduled.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobScheduler for RecordingScheduler {
    async fn schedule(&self, job_id: Uuid) -> Result<(), QueueError> {
        if self.fail {
            return Err(QueueError::Redis(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "connection refused",
            ))));
        }
        self.scheduled.lock().unwrap().push(job_id);
        Ok(())
    }
}

pub fn processor(store: &Arc<InMemoryStore>, backend: &Arc<ScriptedBackend>) -> Arc<JobProcessor> {
    Arc::new(JobProcessor::new(
        store.clone(),
        store.clone(),
        store.clone(),
        backend.clone(),
        chrono::Duration::minutes(15),
    ))
}

pub fn submission_service(
    store: &Arc<InMemoryStore>,
    scheduler: &Arc<RecordingScheduler>,
) -> SubmissionService {
    SubmissionService::new(
        store.clone(),
        store.clone(),
        scheduler.clone(),
        PER_TASK_MINUTES,
    )
}

pub fn request(group_id: Uuid, title: &str, employee_ids: Option<Vec<Uuid>>) -> BulkGenerationRequest {
    BulkGenerationRequest {
        group_type: GroupType::Department,
        group_id,
        title: title.to_string(),
        description: Some("Protecting company data.".to_string()),
        difficulty_level: DifficultyLevel::Beginner,
        employee_ids,
        should_send_notifications: None,
    }
}

/// Create a pending job with one task per employee directly in the store.
pub async fn seed_job(
    store: &Arc<InMemoryStore>,
    employee_ids: &[Uuid],
    creator: Uuid,
    send_notifications: bool,
) -> Uuid {
    let job = store
        .create_job(&NewBulkJob {
            group_type: GroupType::Department,
            group_id: Uuid::new_v4(),
            title: "Security Basics".to_string(),
            description: None,
            difficulty_level: DifficultyLevel::Intermediate,
            send_notifications,
            total_count: employee_ids.len() as i32,
            created_by: creator,
        })
        .await
        .unwrap();
    store.create_tasks(job.id, employee_ids).await.unwrap();
    job.id
}
