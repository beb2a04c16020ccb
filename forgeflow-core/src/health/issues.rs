use crate::health::component::{HealthIssue, IssueReport};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tracing::debug;
use uuid::Uuid;

type IssueKey = (String, String);

/// Tracks open issues across ticks, keyed by `(component, category)`.
///
/// A condition reported again updates its issue instead of opening a new
/// one; a condition no longer reported is resolved.
#[derive(Debug, Default)]
pub struct IssueTracker {
    open: HashMap<IssueKey, HealthIssue>,
}

impl IssueTracker {
    /// Folds one component's reported issues into the tracker and returns
    /// the component's currently open issues.
    pub fn observe(
        &mut self,
        component: &str,
        reports: &[IssueReport],
        now: DateTime<Utc>,
    ) -> Vec<HealthIssue> {
        let mut seen = HashSet::new();

        for report in reports {
            let key = (component.to_string(), report.category.clone());
            seen.insert(report.category.clone());

            self.open
                .entry(key)
                .and_modify(|issue| {
                    issue.last_occurrence = now;
                    issue.occurrence_count = issue.occurrence_count.saturating_add(1);
                    issue.severity = report.severity;
                    issue.description = report.description.clone();
                })
                .or_insert_with(|| HealthIssue {
                    id: Uuid::new_v4().to_string(),
                    component: component.to_string(),
                    severity: report.severity,
                    category: report.category.clone(),
                    description: report.description.clone(),
                    first_occurrence: now,
                    last_occurrence: now,
                    occurrence_count: 1,
                    auto_recoverable: report.auto_recoverable,
                    resolved: false,
                });
        }

        let stale: Vec<IssueKey> = self
            .open
            .keys()
            .filter(|(c, category)| c == component && !seen.contains(category))
            .cloned()
            .collect();
        for key in stale {
            if let Some(issue) = self.open.remove(&key) {
                debug!(
                    event = "issue_resolved",
                    component = %issue.component,
                    category = %issue.category,
                    occurrences = issue.occurrence_count
                );
            }
        }

        let mut issues: Vec<HealthIssue> = self
            .open
            .iter()
            .filter(|((c, _), _)| c == component)
            .map(|(_, issue)| issue.clone())
            .collect();
        issues.sort_by(|a, b| b.severity.cmp(&a.severity).then(a.category.cmp(&b.category)));
        issues
    }

    /// Drops every issue of a component that is no longer registered.
    pub fn forget(&mut self, component: &str) {
        self.open.retain(|(c, _), _| c != component);
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }
}
