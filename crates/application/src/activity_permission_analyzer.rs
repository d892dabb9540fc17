use std::cmp::Ordering;
use std::collections::BTreeSet;

use rolereaper_domain::{Activity, PermissionSet, RoleDefinition, RoleGrant, TargetResource};

use crate::condition_evaluator::ConditionEvaluator;

/// Share of a permission set's actions that fall on the activity's entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelevanceScore {
    matched: usize,
    total: usize,
}

impl RelevanceScore {
    /// Scores `set` against the activity's `namespace/entity` keys.
    ///
    /// An empty set scores zero.
    #[must_use]
    pub fn of(set: &PermissionSet, activity_keys: &BTreeSet<&str>) -> Self {
        let total = set.resource_actions().len();
        if total == 0 {
            return Self {
                matched: 0,
                total: 1,
            };
        }

        let matched = set
            .resource_actions()
            .iter()
            .filter(|action| activity_keys.contains(action.namespace_entity_key()))
            .count();

        Self { matched, total }
    }

    /// Returns the score as a ratio in `[0, 1]`.
    #[must_use]
    pub fn ratio(&self) -> f64 {
        self.matched as f64 / self.total as f64
    }

    fn compare(&self, other: &Self) -> Ordering {
        (self.matched * other.total).cmp(&(other.matched * self.total))
    }
}

/// Resolves the least privileged roles that let a user perform an activity.
#[derive(Clone)]
pub struct ActivityPermissionAnalyzer {
    conditions: ConditionEvaluator,
}

impl ActivityPermissionAnalyzer {
    /// Creates an analyzer using the given condition evaluator.
    #[must_use]
    pub fn new(conditions: ConditionEvaluator) -> Self {
        Self { conditions }
    }

    /// Returns the maximally relevant granting roles, least privileged first.
    pub async fn find_least_privileged_roles<'a>(
        &self,
        user_id: &str,
        activity: &Activity,
        target: &TargetResource,
        roles: &'a [RoleDefinition],
    ) -> Vec<RoleGrant<'a>> {
        let relevant = find_relevant_roles(activity, roles);
        let granted = self
            .match_conditions(user_id, activity, target, relevant)
            .await;
        let preferred = prefer_conditional_scope(granted);
        let ranked = keep_most_relevant(activity, preferred);
        order_by_least_privilege(ranked)
    }

    async fn match_conditions<'a>(
        &self,
        user_id: &str,
        activity: &Activity,
        target: &TargetResource,
        roles: Vec<&'a RoleDefinition>,
    ) -> Vec<RoleGrant<'a>> {
        let mut granted = Vec::new();

        for role in roles {
            for set in role.permission_sets() {
                if !set.grants_any_of(activity.mapped_actions()) {
                    continue;
                }

                if self
                    .conditions
                    .is_satisfied(set.condition(), user_id, target)
                    .await
                {
                    granted.extend(RoleGrant::new(role, set.condition()));
                    break;
                }
            }
        }

        granted
    }
}

fn find_relevant_roles<'a>(
    activity: &Activity,
    roles: &'a [RoleDefinition],
) -> Vec<&'a RoleDefinition> {
    roles
        .iter()
        .filter(|role| {
            role.resource_actions().any(|granted| {
                activity
                    .mapped_actions()
                    .any(|required| required == granted.action())
            })
        })
        .collect()
}

// Checks for a conditional set anywhere on the role, not only on the set that
// produced the grant.
fn prefer_conditional_scope(granted: Vec<RoleGrant<'_>>) -> Vec<RoleGrant<'_>> {
    let (conditional, unconditional): (Vec<_>, Vec<_>) = granted
        .into_iter()
        .partition(|grant| grant.role().has_conditional_permission_set());

    if !conditional.is_empty() {
        return conditional;
    }

    unconditional
        .into_iter()
        .filter(|grant| grant.role().has_tenant_wide_permission_set())
        .collect()
}

fn keep_most_relevant<'a>(activity: &Activity, grants: Vec<RoleGrant<'a>>) -> Vec<RoleGrant<'a>> {
    let activity_keys = activity.namespace_entity_keys();
    let scored: Vec<(RoleGrant<'a>, RelevanceScore)> = grants
        .into_iter()
        .filter_map(|grant| {
            grant
                .permission_set()
                .map(|set| (grant, RelevanceScore::of(set, &activity_keys)))
        })
        .collect();

    let Some(best) = scored
        .iter()
        .map(|(_, score)| *score)
        .max_by(RelevanceScore::compare)
    else {
        return Vec::new();
    };

    scored
        .into_iter()
        .filter(|(_, score)| score.compare(&best) == Ordering::Equal)
        .map(|(grant, _)| grant)
        .collect()
}

fn order_by_least_privilege(mut grants: Vec<RoleGrant<'_>>) -> Vec<RoleGrant<'_>> {
    grants.sort_by_key(|grant| grant.role().privileged_action_count());
    grants
}
