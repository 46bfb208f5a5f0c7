//! Helpers for Azure Resource Manager ids.
//!
//! An ARM id is a path:
//! `/subscriptions/{sub}/resourceGroups/{rg}/providers/{namespace}/{type}/{name}[/{child_type}/{child_name}]`.
//! Parent/child relationships are read from that path, never from display names.

/// Last path segment of a resource id, or an empty string.
pub fn resource_name(resource_id: &str) -> &str {
    resource_id
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("")
}

/// Resource group segment of a resource id, matched case-insensitively.
pub fn resource_group(resource_id: &str) -> Option<&str> {
    let mut segments = resource_id.split('/');
    while let Some(segment) = segments.next() {
        if segment.eq_ignore_ascii_case("resourceGroups") {
            return segments.next().filter(|s| !s.is_empty());
        }
    }
    None
}

/// Id of the parent resource when `resource_id` names a child in
/// `child_collection` (e.g. `subnets`, `virtualNetworkPeerings`).
///
/// `/…/virtualNetworks/vnet-a/subnets/web` with `subnets` gives
/// `/…/virtualNetworks/vnet-a`.
pub fn parent_id(resource_id: &str, child_collection: &str) -> Option<String> {
    let trimmed = resource_id.trim_end_matches('/');
    let mut parts: Vec<&str> = trimmed.split('/').collect();
    if parts.len() < 3 {
        return None;
    }
    let collection = parts[parts.len() - 2];
    if !collection.eq_ignore_ascii_case(child_collection) {
        return None;
    }
    parts.truncate(parts.len() - 2);
    let parent = parts.join("/");
    if parent.is_empty() { None } else { Some(parent) }
}

/// Canonical form used for id comparisons. ARM ids are case-insensitive but
/// collectors do not always agree on casing.
pub fn normalize_id(resource_id: &str) -> String {
    resource_id.trim().trim_end_matches('/').to_ascii_lowercase()
}
