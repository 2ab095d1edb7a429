// ── Scope identifiers ──
//
// A scope names the logical stream a subscription is bound to: a project,
// optionally narrowed to a single user. Immutable once constructed --
// rebinding a client to a different scope means tearing it down and
// building a new one.

use std::fmt;

/// Identifies which logical stream a subscription is bound to.
///
/// Construction rejects empty project ids, but callers commonly build
/// clients speculatively (e.g. a dashboard with no active team yet), so
/// the constructors return `Option` rather than an error.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeId {
    project: String,
    user: Option<String>,
}

impl ScopeId {
    /// Scope covering a whole project.
    pub fn new(project: impl Into<String>) -> Option<Self> {
        let project = project.into().trim().to_string();
        if project.is_empty() {
            return None;
        }
        Some(Self {
            project,
            user: None,
        })
    }

    /// Scope narrowed to a single user within a project.
    pub fn for_user(project: impl Into<String>, user: impl Into<String>) -> Option<Self> {
        let mut scope = Self::new(project)?;
        let user = user.into().trim().to_string();
        if !user.is_empty() {
            scope.user = Some(user);
        }
        Some(scope)
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Path segments for the stream endpoint, in order.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.project.as_str()).chain(self.user.as_deref())
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.user {
            Some(user) => write!(f, "{}/{user}", self.project),
            None => write!(f, "{}", self.project),
        }
    }
}
