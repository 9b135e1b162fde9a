//! RBAC table (§4.7.5): resource/operation derivation from the request and
//! the role -> permission union used to decide access.

use axum::http::Method;
use conclave_types::jwt::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Tasks,
    Agents,
    Execute,
    Health,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Create,
    Update,
    Delete,
    Execute,
}

impl Resource {
    /// `/api/<name>` -> resource; anything else (including `/`, `/health`)
    /// is treated as `health`, which every role may read.
    pub fn from_path(path: &str) -> Self {
        let name = path
            .strip_prefix("/api/")
            .and_then(|rest| rest.split('/').next())
            .unwrap_or("");
        match name {
            "tasks" => Resource::Tasks,
            "agents" => Resource::Agents,
            "execute" => Resource::Execute,
            "admin" => Resource::Admin,
            _ => Resource::Health,
        }
    }
}

impl Operation {
    pub fn from_method(method: &Method, resource: Resource) -> Self {
        match *method {
            Method::GET | Method::HEAD | Method::OPTIONS => Operation::Read,
            Method::POST if resource == Resource::Execute => Operation::Execute,
            Method::POST => Operation::Create,
            Method::PUT | Method::PATCH => Operation::Update,
            Method::DELETE => Operation::Delete,
            _ => Operation::Read,
        }
    }
}

/// `r`=read, `c`=create, `u`=update, `d`=delete, `x`=execute.
fn permissions(role: Role, resource: Resource) -> &'static [Operation] {
    use Operation::*;
    use Resource::*;
    match (role, resource) {
        (Role::Admin, Tasks) => &[Read, Create, Update, Delete],
        (Role::Admin, Agents) => &[Read, Create, Update, Delete],
        (Role::Admin, Execute) => &[Read, Execute],
        (Role::Admin, Health) => &[Read],
        (Role::Admin, Admin) => &[Read, Create, Update, Delete],

        (Role::Operator, Tasks) => &[Read, Create, Update],
        (Role::Operator, Agents) => &[Read, Create, Update],
        (Role::Operator, Execute) => &[Read, Execute],
        (Role::Operator, Health) => &[Read],
        (Role::Operator, Admin) => &[],

        (Role::Agent, Tasks) => &[Read, Update],
        (Role::Agent, Agents) => &[Read],
        (Role::Agent, Execute) => &[Execute],
        (Role::Agent, Health) => &[Read],
        (Role::Agent, Admin) => &[],

        (Role::Viewer, Tasks) => &[Read],
        (Role::Viewer, Agents) => &[Read],
        (Role::Viewer, Execute) => &[],
        (Role::Viewer, Health) => &[Read],
        (Role::Viewer, Admin) => &[],
    }
}

/// Union over the caller's roles of each role's permitted operations on
/// `resource`; an empty `roles` slice (shouldn't happen post-auth, but
/// defends against a malformed token) permits nothing.
pub fn is_permitted(roles: &[Role], resource: Resource, operation: Operation) -> bool {
    roles
        .iter()
        .any(|role| permissions(*role, resource).contains(&operation))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_derives_from_api_prefix() {
        assert_eq!(Resource::from_path("/api/tasks"), Resource::Tasks);
        assert_eq!(Resource::from_path("/api/agents/w1"), Resource::Agents);
        assert_eq!(Resource::from_path("/api/execute/proxy"), Resource::Execute);
        assert_eq!(Resource::from_path("/health"), Resource::Health);
        assert_eq!(Resource::from_path("/"), Resource::Health);
    }

    #[test]
    fn operation_derives_from_method() {
        assert_eq!(Operation::from_method(&Method::GET, Resource::Tasks), Operation::Read);
        assert_eq!(Operation::from_method(&Method::POST, Resource::Tasks), Operation::Create);
        assert_eq!(Operation::from_method(&Method::POST, Resource::Execute), Operation::Execute);
        assert_eq!(Operation::from_method(&Method::PATCH, Resource::Tasks), Operation::Update);
        assert_eq!(Operation::from_method(&Method::DELETE, Resource::Tasks), Operation::Delete);
    }

    #[test]
    fn viewer_cannot_execute_but_can_read() {
        assert!(is_permitted(&[Role::Viewer], Resource::Tasks, Operation::Read));
        assert!(!is_permitted(&[Role::Viewer], Resource::Execute, Operation::Execute));
    }

    #[test]
    fn role_union_grants_the_most_permissive_member() {
        let roles = [Role::Viewer, Role::Operator];
        assert!(is_permitted(&roles, Resource::Tasks, Operation::Create));
    }

    #[test]
    fn admin_has_full_access_everywhere_but_health_read_only() {
        assert!(is_permitted(&[Role::Admin], Resource::Admin, Operation::Delete));
        assert!(is_permitted(&[Role::Admin], Resource::Health, Operation::Read));
    }
}
