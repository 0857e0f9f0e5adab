use super::{clean, resolve};
use crate::{
    errors::ServiceError,
    events::{Event, EventSender},
    models::{
        check_amount_limit, CalendarEvent, Customer, EventStatus, Project, ProjectStatus, Task, TaskPriority,
        TaskStatus,
    },
    store::{matches_search, Record, Repository, SharedStore},
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use slog::Logger;
use std::sync::Arc;
use tracing::instrument;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

async fn customer_name(
    customers: &Repository<Customer>,
    id: Option<Uuid>,
) -> Result<Option<String>, ServiceError> {
    match id {
        Some(id) => Ok(Some(resolve(customers, id, "customer").await?.name)),
        None => Ok(None),
    }
}

// ---- projects ----

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ProjectInput {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub customer_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget: Option<Decimal>,
    pub status: Option<ProjectStatus>,
}

impl ProjectInput {
    fn check(&self) -> Result<(), ServiceError> {
        self.validate()?;
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(ServiceError::ValidationError(
                    "end date cannot be before the start date".into(),
                ));
            }
        }
        if self.budget.map_or(false, |b| b < Decimal::ZERO) {
            return Err(ServiceError::ValidationError("budget cannot be negative".into()));
        }
        self.budget
            .map_or(Ok(()), |budget| check_amount_limit("budget", budget))
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ProjectFilter {
    pub search: Option<String>,
    pub status: Option<ProjectStatus>,
    pub customer_id: Option<Uuid>,
}

/// Project with its task counters
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProjectView {
    #[serde(flatten)]
    pub project: Project,
    pub task_count: usize,
    pub done_count: usize,
    /// done / non-cancelled tasks, 0-100 with two decimals
    pub progress: Decimal,
}

/// Share of done tasks among the non-cancelled ones
pub fn progress(tasks: &[&Task]) -> (usize, usize, Decimal) {
    let counted: Vec<_> = tasks
        .iter()
        .filter(|t| t.status != TaskStatus::Cancelled)
        .collect();
    let done = counted.iter().filter(|t| t.status == TaskStatus::Done).count();
    let percent = if counted.is_empty() {
        Decimal::ZERO
    } else {
        (Decimal::from(done) * Decimal::ONE_HUNDRED / Decimal::from(counted.len())).round_dp(2)
    };
    (tasks.len(), done, percent)
}

#[derive(Clone)]
pub struct ProjectService {
    projects: Repository<Project>,
    tasks: Repository<Task>,
    customers: Repository<Customer>,
    event_sender: Arc<EventSender>,
    logger: Logger,
}

impl ProjectService {
    pub fn new(store: SharedStore, event_sender: Arc<EventSender>, logger: Logger) -> Self {
        Self {
            projects: Repository::new(store.clone()),
            tasks: Repository::new(store.clone()),
            customers: Repository::new(store),
            event_sender,
            logger,
        }
    }

    fn view(project: Project, tasks: &[Task]) -> ProjectView {
        let own: Vec<&Task> = tasks
            .iter()
            .filter(|t| t.project_id == Some(project.id))
            .collect();
        let (task_count, done_count, progress) = progress(&own);
        ProjectView {
            project,
            task_count,
            done_count,
            progress,
        }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, filter: &ProjectFilter) -> Result<Vec<ProjectView>, ServiceError> {
        let search = filter.search.as_deref();
        let projects = self
            .projects
            .find_by(|p| {
                filter.status.map_or(true, |s| p.status == s)
                    && filter
                        .customer_id
                        .map_or(true, |id| p.customer_id == Some(id))
                    && matches_search(search, &[Some(p.name.as_str()), p.customer_name.as_deref()])
            })
            .await?;
        let tasks = self.tasks.list().await?;
        Ok(projects
            .into_iter()
            .map(|p| Self::view(p, &tasks))
            .collect())
    }

    pub async fn get(&self, id: Uuid) -> Result<ProjectView, ServiceError> {
        let project = self.projects.get(id).await?;
        let tasks = self.tasks.find_by(|t| t.project_id == Some(id)).await?;
        Ok(Self::view(project, &tasks))
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, input: ProjectInput) -> Result<ProjectView, ServiceError> {
        input.check()?;
        let customer_name = customer_name(&self.customers, input.customer_id).await?;
        let now = Utc::now();
        let project = Project {
            id: Uuid::new_v4(),
            name: input.name.trim().to_string(),
            description: clean(input.description),
            customer_id: input.customer_id,
            customer_name,
            start_date: input.start_date,
            end_date: input.end_date,
            budget: input.budget,
            status: input.status.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };
        let saved = self.projects.insert(&project).await?;
        self.event_sender
            .send_or_log(Event::created(Project::COLLECTION, saved.id))
            .await;
        slog::info!(self.logger, "project created"; "project_id" => %saved.id);
        Ok(Self::view(saved, &[]))
    }

    #[instrument(skip(self, input))]
    pub async fn update(&self, id: Uuid, input: ProjectInput) -> Result<ProjectView, ServiceError> {
        input.check()?;
        let mut project = self.projects.get(id).await?;
        project.customer_name = customer_name(&self.customers, input.customer_id).await?;
        project.customer_id = input.customer_id;
        project.name = input.name.trim().to_string();
        project.description = clean(input.description);
        project.start_date = input.start_date;
        project.end_date = input.end_date;
        project.budget = input.budget;
        project.status = input.status.unwrap_or(project.status);

        let renamed = self.projects.save(&project).await?;
        // tasks carry the project name
        for mut task in self.tasks.find_by(|t| t.project_id == Some(id)).await? {
            if task.project_name.as_deref() != Some(renamed.name.as_str()) {
                task.project_name = Some(renamed.name.clone());
                self.tasks.save(&task).await?;
            }
        }
        self.event_sender
            .send_or_log(Event::updated(Project::COLLECTION, id))
            .await;
        self.get(id).await
    }

    /// Tasks of a deleted project are kept and detached
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.projects.delete(id).await?;
        for mut task in self.tasks.find_by(|t| t.project_id == Some(id)).await? {
            task.project_id = None;
            task.project_name = None;
            self.tasks.save(&task).await?;
        }
        self.event_sender
            .send_or_log(Event::deleted(Project::COLLECTION, id))
            .await;
        slog::info!(self.logger, "project deleted"; "project_id" => %id);
        Ok(())
    }
}

// ---- tasks ----

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct TaskInput {
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,
    pub description: Option<String>,
    pub project_id: Option<Uuid>,
    #[validate(length(max = 100))]
    pub assignee: Option<String>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct TaskFilter {
    pub search: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub project_id: Option<Uuid>,
    pub assignee: Option<String>,
}

#[derive(Clone)]
pub struct TaskService {
    tasks: Repository<Task>,
    projects: Repository<Project>,
    event_sender: Arc<EventSender>,
    logger: Logger,
}

impl TaskService {
    pub fn new(store: SharedStore, event_sender: Arc<EventSender>, logger: Logger) -> Self {
        Self {
            tasks: Repository::new(store.clone()),
            projects: Repository::new(store),
            event_sender,
            logger,
        }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>, ServiceError> {
        let search = filter.search.as_deref();
        self.tasks
            .find_by(|t| {
                filter.status.map_or(true, |s| t.status == s)
                    && filter.priority.map_or(true, |p| t.priority == p)
                    && filter.project_id.map_or(true, |id| t.project_id == Some(id))
                    && filter.assignee.as_deref().map_or(true, |a| {
                        t.assignee
                            .as_deref()
                            .map_or(false, |ta| ta.eq_ignore_ascii_case(a))
                    })
                    && matches_search(
                        search,
                        &[
                            Some(t.title.as_str()),
                            t.project_name.as_deref(),
                            t.assignee.as_deref(),
                        ],
                    )
            })
            .await
    }

    pub async fn get(&self, id: Uuid) -> Result<Task, ServiceError> {
        self.tasks.get(id).await
    }

    /// Moves `completed_at` along with the done status
    fn set_status(task: &mut Task, status: TaskStatus) {
        if status == TaskStatus::Done && task.completed_at.is_none() {
            task.completed_at = Some(Utc::now());
        } else if status != TaskStatus::Done {
            task.completed_at = None;
        }
        task.status = status;
    }

    async fn project_name(&self, id: Option<Uuid>) -> Result<Option<String>, ServiceError> {
        match id {
            Some(id) => Ok(Some(resolve(&self.projects, id, "project").await?.name)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, input: TaskInput) -> Result<Task, ServiceError> {
        input.validate()?;
        let project_name = self.project_name(input.project_id).await?;
        let now = Utc::now();
        let mut task = Task {
            id: Uuid::new_v4(),
            title: input.title.trim().to_string(),
            description: clean(input.description),
            project_id: input.project_id,
            project_name,
            assignee: clean(input.assignee),
            priority: input.priority.unwrap_or_default(),
            status: TaskStatus::Todo,
            due_date: input.due_date,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        Self::set_status(&mut task, input.status.unwrap_or_default());

        let saved = self.tasks.insert(&task).await?;
        self.event_sender
            .send_or_log(Event::created(Task::COLLECTION, saved.id))
            .await;
        slog::debug!(self.logger, "task created"; "task_id" => %saved.id);
        Ok(saved)
    }

    #[instrument(skip(self, input))]
    pub async fn update(&self, id: Uuid, input: TaskInput) -> Result<Task, ServiceError> {
        input.validate()?;
        let mut task = self.tasks.get(id).await?;
        task.project_name = self.project_name(input.project_id).await?;
        task.project_id = input.project_id;
        task.title = input.title.trim().to_string();
        task.description = clean(input.description);
        task.assignee = clean(input.assignee);
        task.priority = input.priority.unwrap_or(task.priority);
        task.due_date = input.due_date;
        let status = input.status.unwrap_or(task.status);
        Self::set_status(&mut task, status);

        let saved = self.tasks.save(&task).await?;
        self.event_sender
            .send_or_log(Event::updated(Task::COLLECTION, id))
            .await;
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.tasks.delete(id).await?;
        self.event_sender
            .send_or_log(Event::deleted(Task::COLLECTION, id))
            .await;
        Ok(())
    }
}

// ---- calendar ----

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CalendarEventInput {
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    #[serde(default)]
    pub all_day: bool,
    pub customer_id: Option<Uuid>,
    pub status: Option<EventStatus>,
}

impl CalendarEventInput {
    fn check(&self) -> Result<(), ServiceError> {
        self.validate()?;
        if self.end_at < self.start_at {
            return Err(ServiceError::ValidationError(
                "an event cannot end before it starts".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct CalendarFilter {
    /// Events ending at or after this instant
    pub from: Option<DateTime<Utc>>,
    /// Events starting before this instant
    pub to: Option<DateTime<Utc>>,
    pub status: Option<EventStatus>,
    pub customer_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct CalendarService {
    events: Repository<CalendarEvent>,
    customers: Repository<Customer>,
    event_sender: Arc<EventSender>,
    logger: Logger,
}

impl CalendarService {
    pub fn new(store: SharedStore, event_sender: Arc<EventSender>, logger: Logger) -> Self {
        Self {
            events: Repository::new(store.clone()),
            customers: Repository::new(store),
            event_sender,
            logger,
        }
    }

    /// Events in the window, earliest first
    #[instrument(skip(self))]
    pub async fn list(&self, filter: &CalendarFilter) -> Result<Vec<CalendarEvent>, ServiceError> {
        if let (Some(from), Some(to)) = (filter.from, filter.to) {
            if to < from {
                return Err(ServiceError::ValidationError(
                    "`to` cannot be before `from`".into(),
                ));
            }
        }
        let mut events = self
            .events
            .find_by(|e| {
                e.overlaps(filter.from, filter.to)
                    && filter.status.map_or(true, |s| e.status == s)
                    && filter
                        .customer_id
                        .map_or(true, |id| e.customer_id == Some(id))
            })
            .await?;
        events.sort_by_key(|e| e.start_at);
        Ok(events)
    }

    pub async fn get(&self, id: Uuid) -> Result<CalendarEvent, ServiceError> {
        self.events.get(id).await
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, input: CalendarEventInput) -> Result<CalendarEvent, ServiceError> {
        input.check()?;
        let customer_name = customer_name(&self.customers, input.customer_id).await?;
        let now = Utc::now();
        let event = CalendarEvent {
            id: Uuid::new_v4(),
            title: input.title.trim().to_string(),
            description: clean(input.description),
            location: clean(input.location),
            start_at: input.start_at,
            end_at: input.end_at,
            all_day: input.all_day,
            customer_id: input.customer_id,
            customer_name,
            status: input.status.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };
        let saved = self.events.insert(&event).await?;
        self.event_sender
            .send_or_log(Event::created(CalendarEvent::COLLECTION, saved.id))
            .await;
        slog::debug!(self.logger, "calendar event created"; "event_id" => %saved.id);
        Ok(saved)
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: Uuid,
        input: CalendarEventInput,
    ) -> Result<CalendarEvent, ServiceError> {
        input.check()?;
        let mut event = self.events.get(id).await?;
        event.customer_name = customer_name(&self.customers, input.customer_id).await?;
        event.customer_id = input.customer_id;
        event.title = input.title.trim().to_string();
        event.description = clean(input.description);
        event.location = clean(input.location);
        event.start_at = input.start_at;
        event.end_at = input.end_at;
        event.all_day = input.all_day;
        event.status = input.status.unwrap_or(event.status);

        let saved = self.events.save(&event).await?;
        self.event_sender
            .send_or_log(Event::updated(CalendarEvent::COLLECTION, id))
            .await;
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.events.delete(id).await?;
        self.event_sender
            .send_or_log(Event::deleted(CalendarEvent::COLLECTION, id))
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::services;
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn project(name: &str) -> ProjectInput {
        ProjectInput {
            name: name.into(),
            description: None,
            customer_id: None,
            start_date: None,
            end_date: None,
            budget: None,
            status: None,
        }
    }

    fn task(title: &str, project_id: Option<Uuid>, status: Option<TaskStatus>) -> TaskInput {
        TaskInput {
            title: title.into(),
            description: None,
            project_id,
            assignee: None,
            priority: None,
            status,
            due_date: None,
        }
    }

    #[tokio::test]
    async fn progress_ignores_cancelled_tasks() {
        let all = services();
        let p = all.projects.create(project("Website")).await.unwrap();
        assert_eq!(p.progress, dec!(0));

        all.tasks.create(task("a", Some(p.project.id), Some(TaskStatus::Done))).await.unwrap();
        all.tasks.create(task("b", Some(p.project.id), None)).await.unwrap();
        all.tasks.create(task("c", Some(p.project.id), None)).await.unwrap();
        all.tasks
            .create(task("d", Some(p.project.id), Some(TaskStatus::Cancelled)))
            .await
            .unwrap();

        let view = all.projects.get(p.project.id).await.unwrap();
        assert_eq!(view.task_count, 4);
        assert_eq!(view.done_count, 1);
        assert_eq!(view.progress, dec!(33.33));
    }

    #[tokio::test]
    async fn task_completion_timestamp_follows_status() {
        let all = services();
        let t = all.tasks.create(task("t", None, None)).await.unwrap();
        assert!(t.completed_at.is_none());

        let done = all
            .tasks
            .update(t.id, task("t", None, Some(TaskStatus::Done)))
            .await
            .unwrap();
        assert!(done.completed_at.is_some());

        let reopened = all
            .tasks
            .update(t.id, task("t", None, Some(TaskStatus::InProgress)))
            .await
            .unwrap();
        assert!(reopened.completed_at.is_none());
    }

    #[tokio::test]
    async fn task_project_name_is_denormalized() {
        let all = services();
        let p = all.projects.create(project("Website")).await.unwrap();
        let t = all.tasks.create(task("t", Some(p.project.id), None)).await.unwrap();
        assert_eq!(t.project_name.as_deref(), Some("Website"));

        all.projects
            .update(p.project.id, project("Web portal"))
            .await
            .unwrap();
        assert_eq!(
            all.tasks.get(t.id).await.unwrap().project_name.as_deref(),
            Some("Web portal")
        );

        assert_matches!(
            all.tasks.create(task("x", Some(Uuid::new_v4()), None)).await,
            Err(ServiceError::ValidationError(_))
        );
    }

    fn event(start: DateTime<Utc>, hours: i64) -> CalendarEventInput {
        CalendarEventInput {
            title: "Visit".into(),
            description: None,
            location: None,
            start_at: start,
            end_at: start + Duration::hours(hours),
            all_day: false,
            customer_id: None,
            status: None,
        }
    }

    #[tokio::test]
    async fn events_cannot_end_before_start() {
        let svc = services().calendar;
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        assert_matches!(
            svc.create(event(start, -1)).await,
            Err(ServiceError::ValidationError(_))
        );
        assert!(svc.create(event(start, 0)).await.is_ok());
    }

    #[tokio::test]
    async fn range_query_returns_overlapping_events_in_order() {
        let svc = services().calendar;
        let day = |d| Utc.with_ymd_and_hms(2024, 3, d, 9, 0, 0).unwrap();
        svc.create(event(day(5), 1)).await.unwrap();
        svc.create(event(day(1), 1)).await.unwrap();
        svc.create(event(day(20), 1)).await.unwrap();

        let found = svc
            .list(&CalendarFilter {
                from: Some(day(1)),
                to: Some(day(10)),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert!(found[0].start_at < found[1].start_at);
    }
}
