//! Pod identity generation

use uuid::Uuid;

/// Generate a pod name of the form `{namespace}-{token}`.
///
/// The token is the first dash-delimited segment of a random v4 UUID
/// (8 hex characters).
pub fn new_pod_name(namespace: &str) -> String {
    let id = Uuid::new_v4().to_string();
    let token = id.split('-').next().unwrap_or(&id);
    format!("{}-{}", namespace, token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_pod_name_format() {
        let name = new_pod_name("fleet");
        let token = name.strip_prefix("fleet-").unwrap();

        assert_eq!(token.len(), 8);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_pod_names_are_unique() {
        let names: HashSet<_> = (0..1000).map(|_| new_pod_name("ns")).collect();
        assert_eq!(names.len(), 1000);
    }
}
