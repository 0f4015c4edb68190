//! The action catalog: every operation a decision may select.
//!
//! Each variant wraps a strictly-typed request shape. The enum is
//! internally tagged by `"tool"`, so a decision can only ever name a single
//! action, and unknown fields inside a payload are rejected at parse time.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

fn default_limit() -> u32 {
    10
}

// ── Shared value types ────────────────────────────────────────────────────

/// The closed set of outcome labels for the terminal action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Correct, confident answer with results.
    OkAnswer,
    /// No matching results, but the search itself was valid.
    OkNotFound,
    /// Refused for security or privacy reasons.
    DeniedSecurity,
    /// The request is ambiguous and needs clarification.
    NoneClarificationNeeded,
    /// Out of scope or not supported by the API.
    NoneUnsupported,
    /// Something broke while fulfilling the request.
    ErrorInternal,
}

impl Outcome {
    /// All six labels, in the order they are presented to the model.
    pub const ALL: [Outcome; 6] = [
        Outcome::OkAnswer,
        Outcome::OkNotFound,
        Outcome::DeniedSecurity,
        Outcome::NoneClarificationNeeded,
        Outcome::NoneUnsupported,
        Outcome::ErrorInternal,
    ];

    /// The wire label (e.g. `ok_answer`).
    pub fn label(&self) -> &'static str {
        match self {
            Self::OkAnswer => "ok_answer",
            Self::OkNotFound => "ok_not_found",
            Self::DeniedSecurity => "denied_security",
            Self::NoneClarificationNeeded => "none_clarification_needed",
            Self::NoneUnsupported => "none_unsupported",
            Self::ErrorInternal => "error_internal",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// What kind of entity a response link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Employee,
    Customer,
    Project,
    Wiki,
    Location,
}

/// A reference to a business entity attached to the final response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Link {
    pub kind: LinkKind,
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Idea,
    Exploring,
    Active,
    Paused,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TimeEntryStatus {
    Draft,
    Submitted,
    Approved,
    Invoiced,
    Voided,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TeamRole {
    Lead,
    Engineer,
    Designer,
    Qa,
    Ops,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TeamMember {
    pub employee: String,
    /// Fraction of the employee's time allocated to the project (0.0–1.0).
    pub time_slice: f64,
    pub role: TeamRole,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SkillLevel {
    pub name: String,
    pub level: u8,
}

// ── Request shapes ────────────────────────────────────────────────────────

/// Offset/limit paging shared by the plain list operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Page {
    #[serde(default)]
    pub offset: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

/// Payload of actions that take no arguments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct NoArgs {}

/// Lookup of one entity by its identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ById {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SearchProjects {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub status: Option<ProjectStatus>,
    #[serde(default)]
    pub team_member: Option<String>,
    #[serde(default)]
    pub offset: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SearchEmployees {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub manager: Option<String>,
    #[serde(default)]
    pub offset: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SearchCustomers {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub deal_phase: Option<String>,
    #[serde(default)]
    pub account_manager: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub offset: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SearchTimeEntries {
    #[serde(default)]
    pub employee: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    /// Inclusive lower bound, `YYYY-MM-DD`.
    #[serde(default)]
    pub date_from: Option<String>,
    /// Inclusive upper bound, `YYYY-MM-DD`.
    #[serde(default)]
    pub date_to: Option<String>,
    #[serde(default)]
    pub work_category: Option<String>,
    #[serde(default)]
    pub billable: Option<bool>,
    #[serde(default)]
    pub status: Option<TimeEntryStatus>,
    #[serde(default)]
    pub offset: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct LogTimeEntry {
    pub employee: String,
    pub project: String,
    #[serde(default)]
    pub customer: Option<String>,
    /// `YYYY-MM-DD`
    pub date: String,
    pub hours: f64,
    pub work_category: String,
    pub notes: String,
    pub billable: bool,
    pub status: TimeEntryStatus,
    pub logged_by: String,
}

/// Full replacement of an existing time entry. Every field must be
/// resent, including the ones that do not change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateTimeEntry {
    pub id: String,
    pub date: String,
    pub hours: f64,
    pub work_category: String,
    pub notes: String,
    pub billable: bool,
    pub status: TimeEntryStatus,
    pub changed_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateProjectTeam {
    pub id: String,
    pub team: Vec<TeamMember>,
    #[serde(default)]
    pub changed_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateProjectStatus {
    pub id: String,
    pub status: ProjectStatus,
    #[serde(default)]
    pub changed_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateEmployeeInfo {
    pub employee: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub salary: Option<u64>,
    #[serde(default)]
    pub skills: Option<Vec<SkillLevel>>,
    #[serde(default)]
    pub wills: Option<Vec<SkillLevel>>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub changed_by: Option<String>,
}

/// Aggregated hours over a date range, used by both summary operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TimeSummary {
    pub date_from: String,
    pub date_to: String,
    #[serde(default)]
    pub projects: Vec<String>,
    #[serde(default)]
    pub employees: Vec<String>,
    #[serde(default)]
    pub customers: Vec<String>,
    #[serde(default)]
    pub billable: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct LoadWikiPage {
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SearchWiki {
    pub query_regex: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateWikiPage {
    pub file: String,
    pub content: String,
    #[serde(default)]
    pub changed_by: Option<String>,
}

/// The terminal action: ends the task with an outcome, a message, and
/// links to every entity the answer refers to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ProvideAgentResponse {
    pub message: String,
    pub outcome: Outcome,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl ProvideAgentResponse {
    /// An `error_internal` response with no links.
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            outcome: Outcome::ErrorInternal,
            links: Vec::new(),
        }
    }
}

// ── The catalog ───────────────────────────────────────────────────────────

/// One action from the fixed catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum Action {
    ProvideAgentResponse(ProvideAgentResponse),
    ListProjects(Page),
    ListEmployees(Page),
    ListCustomers(Page),
    GetCustomer(ById),
    GetEmployee(ById),
    GetProject(ById),
    GetTimeEntry(ById),
    SearchProjects(SearchProjects),
    SearchEmployees(SearchEmployees),
    SearchCustomers(SearchCustomers),
    SearchTimeEntries(SearchTimeEntries),
    LogTimeEntry(LogTimeEntry),
    UpdateTimeEntry(UpdateTimeEntry),
    UpdateProjectTeam(UpdateProjectTeam),
    UpdateProjectStatus(UpdateProjectStatus),
    UpdateEmployeeInfo(UpdateEmployeeInfo),
    TimeSummaryByProject(TimeSummary),
    TimeSummaryByEmployee(TimeSummary),
    ListWikiPages(NoArgs),
    LoadWikiPage(LoadWikiPage),
    SearchWiki(SearchWiki),
    UpdateWikiPage(UpdateWikiPage),
}

impl Action {
    /// The `tool` tag of this action (e.g. `get_project`).
    pub fn name(&self) -> &'static str {
        match self {
            Self::ProvideAgentResponse(_) => "provide_agent_response",
            Self::ListProjects(_) => "list_projects",
            Self::ListEmployees(_) => "list_employees",
            Self::ListCustomers(_) => "list_customers",
            Self::GetCustomer(_) => "get_customer",
            Self::GetEmployee(_) => "get_employee",
            Self::GetProject(_) => "get_project",
            Self::GetTimeEntry(_) => "get_time_entry",
            Self::SearchProjects(_) => "search_projects",
            Self::SearchEmployees(_) => "search_employees",
            Self::SearchCustomers(_) => "search_customers",
            Self::SearchTimeEntries(_) => "search_time_entries",
            Self::LogTimeEntry(_) => "log_time_entry",
            Self::UpdateTimeEntry(_) => "update_time_entry",
            Self::UpdateProjectTeam(_) => "update_project_team",
            Self::UpdateProjectStatus(_) => "update_project_status",
            Self::UpdateEmployeeInfo(_) => "update_employee_info",
            Self::TimeSummaryByProject(_) => "time_summary_by_project",
            Self::TimeSummaryByEmployee(_) => "time_summary_by_employee",
            Self::ListWikiPages(_) => "list_wiki_pages",
            Self::LoadWikiPage(_) => "load_wiki_page",
            Self::SearchWiki(_) => "search_wiki",
            Self::UpdateWikiPage(_) => "update_wiki_page",
        }
    }

    /// The business API route this action is posted to.
    pub fn route(&self) -> &'static str {
        match self {
            Self::ProvideAgentResponse(_) => "/respond",
            Self::ListProjects(_) => "/projects/list",
            Self::ListEmployees(_) => "/employees/list",
            Self::ListCustomers(_) => "/customers/list",
            Self::GetCustomer(_) => "/customers/get",
            Self::GetEmployee(_) => "/employees/get",
            Self::GetProject(_) => "/projects/get",
            Self::GetTimeEntry(_) => "/time/get",
            Self::SearchProjects(_) => "/projects/search",
            Self::SearchEmployees(_) => "/employees/search",
            Self::SearchCustomers(_) => "/customers/search",
            Self::SearchTimeEntries(_) => "/time/search",
            Self::LogTimeEntry(_) => "/time/log",
            Self::UpdateTimeEntry(_) => "/time/update",
            Self::UpdateProjectTeam(_) => "/projects/team/update",
            Self::UpdateProjectStatus(_) => "/projects/status/update",
            Self::UpdateEmployeeInfo(_) => "/employees/update",
            Self::TimeSummaryByProject(_) => "/time/summary/by-project",
            Self::TimeSummaryByEmployee(_) => "/time/summary/by-employee",
            Self::ListWikiPages(_) => "/wiki/list",
            Self::LoadWikiPage(_) => "/wiki/load",
            Self::SearchWiki(_) => "/wiki/search",
            Self::UpdateWikiPage(_) => "/wiki/update",
        }
    }

    /// Whether this action mutates business state.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Self::LogTimeEntry(_)
                | Self::UpdateTimeEntry(_)
                | Self::UpdateProjectTeam(_)
                | Self::UpdateProjectStatus(_)
                | Self::UpdateEmployeeInfo(_)
                | Self::UpdateWikiPage(_)
        )
    }

    /// Whether this is the terminal `provide_agent_response` action.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ProvideAgentResponse(_))
    }

    /// The terminal payload, if this is the terminal action.
    pub fn as_final_response(&self) -> Option<&ProvideAgentResponse> {
        match self {
            Self::ProvideAgentResponse(resp) => Some(resp),
            _ => None,
        }
    }

    /// Request body for the business API (the tag is not part of it).
    pub fn payload(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        if let Some(map) = value.as_object_mut() {
            map.remove("tool");
        }
        value
    }

    /// Arguments rendered for the transcript: the full tagged action as JSON.
    pub fn arguments_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_labels_match_wire_format() {
        for outcome in Outcome::ALL {
            let json = serde_json::to_string(&outcome).unwrap();
            assert_eq!(json, format!("\"{}\"", outcome.label()));
        }
    }

    #[test]
    fn unknown_outcome_is_rejected() {
        let result: Result<Outcome, _> = serde_json::from_str("\"ok_maybe\"");
        assert!(result.is_err());
    }

    #[test]
    fn tagged_action_parses() {
        let action: Action =
            serde_json::from_str(r#"{"tool":"get_project","id":"proj_acme"}"#).unwrap();
        assert_eq!(action.name(), "get_project");
        assert_eq!(action.route(), "/projects/get");
        assert!(!action.is_write());
        assert!(!action.is_terminal());
    }

    #[test]
    fn unit_variant_parses() {
        let action: Action = serde_json::from_str(r#"{"tool":"list_wiki_pages"}"#).unwrap();
        assert_eq!(action, Action::ListWikiPages(NoArgs {}));
        assert_eq!(action.payload(), serde_json::json!({}));
    }

    #[test]
    fn argumentless_action_rejects_extra_keys() {
        let result: Result<Action, _> =
            serde_json::from_str(r#"{"tool":"list_wiki_pages","limit":5,"evil":true}"#);
        assert!(result.is_err());
    }

    #[test]
    fn payload_with_unknown_field_is_rejected() {
        let result: Result<Action, _> =
            serde_json::from_str(r#"{"tool":"get_project","id":"p1","force":true}"#);
        assert!(result.is_err());
    }

    #[test]
    fn payload_missing_required_field_is_rejected() {
        let result: Result<Action, _> = serde_json::from_str(r#"{"tool":"get_employee"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_tool_is_rejected() {
        let result: Result<Action, _> =
            serde_json::from_str(r#"{"tool":"delete_everything","id":"x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn paging_defaults_apply() {
        let action: Action = serde_json::from_str(r#"{"tool":"list_projects"}"#).unwrap();
        assert_eq!(action, Action::ListProjects(Page { offset: 0, limit: 10 }));
    }

    #[test]
    fn payload_strips_tag() {
        let action = Action::GetEmployee(ById { id: "jane".into() });
        assert_eq!(action.payload(), serde_json::json!({"id": "jane"}));
        assert!(action.arguments_json().contains("\"tool\":\"get_employee\""));
    }

    #[test]
    fn write_actions_are_flagged() {
        let action = Action::UpdateProjectStatus(UpdateProjectStatus {
            id: "proj_1".into(),
            status: ProjectStatus::Paused,
            changed_by: None,
        });
        assert!(action.is_write());
    }

    #[test]
    fn terminal_action_exposes_response() {
        let action = Action::ProvideAgentResponse(ProvideAgentResponse::internal_error("boom"));
        assert!(action.is_terminal());
        let resp = action.as_final_response().unwrap();
        assert_eq!(resp.outcome, Outcome::ErrorInternal);
        assert!(resp.links.is_empty());
    }
}
