use std::fmt;

use chrono::{
  DateTime,
  Utc
};
use serde::{
  Deserialize,
  Serialize
};

macro_rules! wire_id {
  ($name:ident) => {
    #[derive(
      Debug,
      Clone,
      Copy,
      Serialize,
      Deserialize,
      PartialEq,
      Eq,
      PartialOrd,
      Ord,
      Hash,
    )]
    #[serde(transparent)]
    pub struct $name(pub u64);

    impl fmt::Display for $name {
      fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>
      ) -> fmt::Result {
        write!(f, "{}", self.0)
      }
    }
  };
}

wire_id!(ProjectId);
wire_id!(PageId);
wire_id!(SectionId);
wire_id!(TaskId);
wire_id!(UserId);

/// Lifecycle status of a whole project.
#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
  Default,
)]
pub enum ProjectStatus {
  #[default]
  #[serde(rename = "MVP")]
  Mvp,
  #[serde(rename = "In Development")]
  InDevelopment,
  #[serde(rename = "In Deployment")]
  InDeployment
}

impl ProjectStatus {
  pub const ALL: [ProjectStatus; 3] = [
    ProjectStatus::Mvp,
    ProjectStatus::InDevelopment,
    ProjectStatus::InDeployment
  ];

  pub fn label(
    self
  ) -> &'static str {
    match self {
      | Self::Mvp => "MVP",
      | Self::InDevelopment => {
        "In Development"
      }
      | Self::InDeployment => {
        "In Deployment"
      }
    }
  }
}

impl fmt::Display for ProjectStatus {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.label())
  }
}

/// One of the three fixed workflow
/// stages every page is split into.
#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
)]
pub enum Stage {
  #[serde(rename = "MVP")]
  Mvp,
  #[serde(rename = "DEV")]
  Dev,
  #[serde(rename = "DEPLOY")]
  Deploy
}

impl Stage {
  pub const ALL: [Stage; 3] = [
    Stage::Mvp,
    Stage::Dev,
    Stage::Deploy
  ];

  pub fn code(
    self
  ) -> &'static str {
    match self {
      | Self::Mvp => "MVP",
      | Self::Dev => "DEV",
      | Self::Deploy => "DEPLOY"
    }
  }

  pub fn label(
    self
  ) -> &'static str {
    match self {
      | Self::Mvp => "MVP",
      | Self::Dev => "In Development",
      | Self::Deploy => "In Deployment"
    }
  }
}

impl fmt::Display for Stage {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.label())
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct Project {
  pub id:             ProjectId,
  pub name:           String,
  #[serde(default)]
  pub description:    Option<String>,
  #[serde(default)]
  pub link:           Option<String>,
  #[serde(default)]
  pub image:          Option<String>,
  #[serde(default)]
  pub project_status: ProjectStatus,
  pub created_at:     DateTime<Utc>,
  #[serde(default)]
  pub updated_at:
    Option<DateTime<Utc>>
}

impl Project {
  /// `updated_at` when the backend sends
  /// it, else `created_at`.
  pub fn last_edited(
    &self
  ) -> DateTime<Utc> {
    self
      .updated_at
      .unwrap_or(self.created_at)
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct TaskNode {
  pub id:        TaskId,
  pub title:     String,
  #[serde(default)]
  pub completed: bool
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct SectionNode {
  pub id:    SectionId,
  pub title: Stage,
  #[serde(default)]
  pub tasks: Vec<TaskNode>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct PageNode {
  pub id:       PageId,
  pub name:     String,
  #[serde(default)]
  pub sections: Vec<SectionNode>
}

/// Full nested tree returned by the
/// project detail endpoint.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct ProjectDetail {
  pub id:             ProjectId,
  pub name:           String,
  #[serde(default)]
  pub description:    Option<String>,
  #[serde(default)]
  pub link:           Option<String>,
  #[serde(default)]
  pub image:          Option<String>,
  #[serde(default)]
  pub project_status: ProjectStatus,
  #[serde(default)]
  pub created_at:
    Option<DateTime<Utc>>,
  #[serde(default)]
  pub updated_at:
    Option<DateTime<Utc>>,
  #[serde(default)]
  pub pages:          Vec<PageNode>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct Page {
  pub id:      PageId,
  pub name:    String,
  pub project: ProjectId,
  #[serde(default)]
  pub order:   u32
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct Section {
  pub id:    SectionId,
  pub title: Stage,
  pub page:  PageId,
  #[serde(default)]
  pub order: u32
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct Task {
  pub id:         TaskId,
  pub title:      String,
  #[serde(default)]
  pub completed:  bool,
  pub section:    SectionId,
  #[serde(default)]
  pub order:      u32,
  #[serde(default)]
  pub created_at:
    Option<DateTime<Utc>>,
  #[serde(default)]
  pub updated_at:
    Option<DateTime<Utc>>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct User {
  pub id:          UserId,
  pub username:    String,
  #[serde(default)]
  pub date_joined:
    Option<DateTime<Utc>>
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct ProjectCreate {
  pub name:        String,
  #[serde(default)]
  pub description: String,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub link:        Option<String>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
  PartialEq,
)]
pub struct ProjectPatch {
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub name:           Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub description:    Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub link:           Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub project_status:
    Option<ProjectStatus>
}

impl ProjectPatch {
  pub fn status(
    status: ProjectStatus
  ) -> Self {
    Self {
      project_status: Some(status),
      ..Self::default()
    }
  }

  pub fn is_empty(&self) -> bool {
    self.name.is_none()
      && self.description.is_none()
      && self.link.is_none()
      && self.project_status.is_none()
  }
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct PageCreate {
  pub name: String
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct SectionCreate {
  pub title: Stage
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct TaskCreate {
  pub title:     String,
  pub completed: bool
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
)]
pub struct TaskPatch {
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub title:     Option<String>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub completed: Option<bool>
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct IssueReport {
  pub description: String
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct Credentials {
  pub username: String,
  pub password: String
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct TokenPair {
  pub access:  String,
  pub refresh: String
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct RefreshRequest {
  pub refresh: String
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct AccessToken {
  pub access: String
}
