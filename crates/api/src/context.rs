use warehouse_auth::PrincipalId;

/// Principal context for a request (the authenticated username).
///
/// Inserted by the auth middleware; present on every protected route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal_id: PrincipalId,
}

impl PrincipalContext {
    pub fn new(principal_id: PrincipalId) -> Self {
        Self { principal_id }
    }

    pub fn username(&self) -> &str {
        self.principal_id.as_str()
    }
}
