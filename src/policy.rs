use axum::http::Method;

use crate::{error::AppError, models::Role};

/// Resource
///
/// The REST resources that sit behind the access policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Category,
    Area,
    District,
    News,
    Comment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    List,
    Retrieve,
    Create,
    Update,
    PartialUpdate,
    Destroy,
}

impl Action {
    /// Maps a request to an action. `targets_item` is true when the matched
    /// route addresses a single record (`/{resource}/{id}/...`).
    pub fn from_request(method: &Method, targets_item: bool) -> Option<Action> {
        match *method {
            Method::GET | Method::HEAD | Method::OPTIONS if targets_item => Some(Action::Retrieve),
            Method::GET | Method::HEAD | Method::OPTIONS => Some(Action::List),
            Method::POST => Some(Action::Create),
            Method::PUT => Some(Action::Update),
            Method::PATCH => Some(Action::PartialUpdate),
            Method::DELETE => Some(Action::Destroy),
            _ => None,
        }
    }

    pub fn is_read(&self) -> bool {
        matches!(self, Action::List | Action::Retrieve)
    }
}

/// Access
///
/// Minimum caller level an action requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Anyone,
    Authenticated,
    Admin,
}

impl Access {
    pub fn allows(&self, role: Option<Role>) -> bool {
        match self {
            Access::Anyone => true,
            Access::Authenticated => role.is_some(),
            Access::Admin => role == Some(Role::Admin),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourcePolicy {
    pub read: Access,
    pub write: Access,
}

const ADMIN_ONLY: ResourcePolicy = ResourcePolicy { read: Access::Admin, write: Access::Admin };

/// Access matrix. Reads are list/retrieve; writes are everything else.
pub const POLICIES: &[(Resource, ResourcePolicy)] = &[
    (Resource::Category, ADMIN_ONLY),
    (Resource::Area, ADMIN_ONLY),
    (Resource::District, ADMIN_ONLY),
    (Resource::News, ResourcePolicy { read: Access::Anyone, write: Access::Admin }),
    (Resource::Comment, ResourcePolicy { read: Access::Anyone, write: Access::Authenticated }),
];

/// Looks up the requirement for an action. Resources missing from the table
/// require an admin.
pub fn requirement(resource: Resource, action: Action) -> Access {
    POLICIES
        .iter()
        .find(|(r, _)| *r == resource)
        .map(|(_, policy)| if action.is_read() { policy.read } else { policy.write })
        .unwrap_or(Access::Admin)
}

/// authorize
///
/// `role` is `None` for an anonymous caller. An unmet requirement is
/// "not authenticated" for anonymous callers and "forbidden" for everyone else.
pub fn authorize(role: Option<Role>, resource: Resource, action: Action) -> Result<(), AppError> {
    if requirement(resource, action).allows(role) {
        Ok(())
    } else if role.is_none() {
        Err(AppError::NotAuthenticated)
    } else {
        Err(AppError::Forbidden)
    }
}
