use super::models::HubUser;

/// Resolve the configured service-account username to a Hub user.
///
/// Exact match on `userName`. `None` is a configuration-category failure: the
/// run records it and exits without contacting the tracker.
pub fn resolve_identity<'a>(users: &'a [HubUser], username: &str) -> Option<&'a HubUser> {
    users.iter().find(|u| u.user_name == username)
}
