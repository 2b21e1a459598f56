//! Predicates deciding which catalog services get a watcher.

/// Returns true if the given service name must be watched.
///
/// An empty allow-list admits every service. Comparison is case-insensitive
/// since catalogs commonly mix the casing of registered names.
pub fn should_watch_service_by_name(allow_list: &[String], service_name: &str) -> bool {
    if allow_list.is_empty() {
        return true;
    }
    allow_list
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(service_name))
}

/// Returns true if the service carries every required tag.
pub fn should_watch_service_by_tags(required_tags: &[String], tags: &[String]) -> bool {
    required_tags
        .iter()
        .all(|required| tags.iter().any(|tag| tag == required))
}
