//! Role-based authorization rules. Pure functions over (actor, resource);
//! state checks (pending vs. terminal) live in the lifecycle, not here, so
//! authorization failures and state errors stay distinct.

use crate::model::{role::Role, team::Team, user::User};

/// The authenticated caller, as the policy sees it.
#[derive(Debug, Copy, Clone)]
pub struct Actor {
    pub user_id: u64,
    pub role: Role,
    pub team_id: Option<u64>,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    fn same_team_as(&self, user: &User) -> bool {
        self.team_id.is_some() && self.team_id == user.team_id
    }
}

/// Employees see their own requests, managers their team's, admins all.
pub fn can_view_request(actor: &Actor, owner: &User) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Manager => owner.id == actor.user_id || actor.same_team_as(owner),
        Role::Employee => owner.id == actor.user_id,
    }
}

/// Anyone may request leave for themselves. Creating on behalf of another
/// user requires admin, or a manager whose own team contains the target.
pub fn can_create_for(actor: &Actor, target: &User) -> bool {
    if target.id == actor.user_id {
        return true;
    }
    match actor.role {
        Role::Admin => true,
        Role::Manager => actor.same_team_as(target),
        Role::Employee => false,
    }
}

/// Update and delete share one rule: the original requester or an admin.
pub fn can_modify_request(actor: &Actor, owner_id: u64) -> bool {
    actor.is_admin() || owner_id == actor.user_id
}

/// Approve/reject: admin, or the *designated* manager of the owner's team
/// (`team.manager_id`). Merely sharing the team is insufficient.
pub fn can_decide(actor: &Actor, owner: &User, team: Option<&Team>) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Manager => {
            actor.same_team_as(owner)
                && team.is_some_and(|t| t.manager_id == Some(actor.user_id))
        }
        Role::Employee => false,
    }
}

/// Mutation of teams, leave types, and users is admin-only.
pub fn can_manage_directory(actor: &Actor) -> bool {
    actor.is_admin()
}

/// Admins list everyone; managers list only their own team.
pub fn can_list_users(actor: &Actor) -> bool {
    matches!(actor.role, Role::Admin | Role::Manager)
}

/// Balances are private: own balances, or admin.
pub fn can_view_balances_of(actor: &Actor, target_user_id: u64) -> bool {
    actor.is_admin() || actor.user_id == target_user_id
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(user_id: u64, role: Role, team_id: Option<u64>) -> Actor {
        Actor {
            user_id,
            role,
            team_id,
        }
    }

    fn user(id: u64, role: Role, team_id: Option<u64>) -> User {
        User {
            id,
            name: format!("user-{id}"),
            email: format!("user-{id}@company.com"),
            password: String::new(),
            role,
            team_id,
        }
    }

    fn team(id: u64, manager_id: Option<u64>) -> Team {
        Team {
            id,
            name: format!("team-{id}"),
            manager_id,
            description: None,
            is_active: true,
        }
    }

    #[test]
    fn only_the_designated_manager_may_decide() {
        let employee = user(7, Role::Employee, Some(2));
        let the_team = team(2, Some(4));

        let designated = actor(4, Role::Manager, Some(2));
        let same_team_manager = actor(5, Role::Manager, Some(2));
        let other_team_manager = actor(6, Role::Manager, Some(3));
        let admin = actor(1, Role::Admin, None);

        assert!(can_decide(&designated, &employee, Some(&the_team)));
        assert!(!can_decide(&same_team_manager, &employee, Some(&the_team)));
        assert!(!can_decide(&other_team_manager, &employee, Some(&the_team)));
        assert!(can_decide(&admin, &employee, Some(&the_team)));
    }

    #[test]
    fn decide_requires_a_team_with_a_manager_of_record() {
        let employee = user(7, Role::Employee, Some(2));
        let manager = actor(4, Role::Manager, Some(2));

        assert!(!can_decide(&manager, &employee, None));
        assert!(!can_decide(&manager, &employee, Some(&team(2, None))));
    }

    #[test]
    fn employees_never_decide() {
        let employee = user(7, Role::Employee, Some(2));
        let peer = actor(8, Role::Employee, Some(2));
        assert!(!can_decide(&peer, &employee, Some(&team(2, Some(8)))));
    }

    #[test]
    fn create_on_behalf_is_scoped_to_the_managers_team() {
        let in_team = user(7, Role::Employee, Some(2));
        let outside = user(9, Role::Employee, Some(3));
        let manager = actor(4, Role::Manager, Some(2));
        let admin = actor(1, Role::Admin, None);
        let employee = actor(8, Role::Employee, Some(2));

        assert!(can_create_for(&manager, &in_team));
        assert!(!can_create_for(&manager, &outside));
        assert!(can_create_for(&admin, &outside));
        assert!(!can_create_for(&employee, &in_team));
        // Everyone may request for themselves.
        assert!(can_create_for(&employee, &user(8, Role::Employee, Some(2))));
    }

    #[test]
    fn modify_is_owner_or_admin() {
        assert!(can_modify_request(&actor(7, Role::Employee, Some(2)), 7));
        assert!(!can_modify_request(&actor(8, Role::Employee, Some(2)), 7));
        assert!(can_modify_request(&actor(1, Role::Admin, None), 7));
        // The designated manager still may not edit someone else's request.
        assert!(!can_modify_request(&actor(4, Role::Manager, Some(2)), 7));
    }

    #[test]
    fn view_scoping_follows_roles() {
        let owner = user(7, Role::Employee, Some(2));
        assert!(can_view_request(&actor(7, Role::Employee, Some(2)), &owner));
        assert!(!can_view_request(&actor(8, Role::Employee, Some(2)), &owner));
        assert!(can_view_request(&actor(4, Role::Manager, Some(2)), &owner));
        assert!(!can_view_request(&actor(6, Role::Manager, Some(3)), &owner));
        assert!(can_view_request(&actor(1, Role::Admin, None), &owner));
    }

    #[test]
    fn balances_are_private_to_owner_and_admin() {
        assert!(can_view_balances_of(&actor(7, Role::Employee, None), 7));
        assert!(!can_view_balances_of(&actor(4, Role::Manager, Some(2)), 7));
        assert!(can_view_balances_of(&actor(1, Role::Admin, None), 7));
    }
}
