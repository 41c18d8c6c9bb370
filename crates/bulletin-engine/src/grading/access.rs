use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::domain::StudentId;

/// Outcome of the external access check run before any aggregation for a viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessVerdict {
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AccessVerdict {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }

    pub fn ensure(&self) -> Result<(), AccessDenied> {
        if self.allowed {
            Ok(())
        } else {
            Err(AccessDenied {
                reason: self
                    .reason
                    .clone()
                    .unwrap_or_else(|| "access not granted".to_string()),
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("access denied: {reason}")]
pub struct AccessDenied {
    pub reason: String,
}

/// Authenticated identity passed explicitly into gated entry points.
///
/// Staff viewers are unrestricted; guardians and students carry the set of student ids the
/// authorization layer resolved for them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerContext {
    pub viewer_id: String,
    authorized_students: Option<BTreeSet<StudentId>>,
}

impl ViewerContext {
    pub fn staff(viewer_id: impl Into<String>) -> Self {
        Self {
            viewer_id: viewer_id.into(),
            authorized_students: None,
        }
    }

    pub fn restricted<I>(viewer_id: impl Into<String>, students: I) -> Self
    where
        I: IntoIterator<Item = StudentId>,
    {
        Self {
            viewer_id: viewer_id.into(),
            authorized_students: Some(students.into_iter().collect()),
        }
    }

    pub fn verdict_for(&self, student_id: &StudentId) -> AccessVerdict {
        match &self.authorized_students {
            None => AccessVerdict::allow(),
            Some(students) if students.contains(student_id) => AccessVerdict::allow(),
            Some(_) => AccessVerdict::deny(format!(
                "viewer {} is not linked to student {}",
                self.viewer_id, student_id
            )),
        }
    }
}
