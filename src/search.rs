use crate::dataset::Municipality;

/// Queries of one character or less do not search.
pub const MIN_QUERY_CHARS: usize = 2;

/// Substring match on name or department, case-insensitive, in dataset order.
pub fn search_municipalities<'a>(map: &'a [Municipality], term: &str) -> Vec<&'a Municipality> {
    if term.chars().count() < MIN_QUERY_CHARS {
        return Vec::new();
    }
    let s = term.to_lowercase();
    map.iter()
        .filter(|m| m.name.to_lowercase().contains(&s) || m.department.to_lowercase().contains(&s))
        .collect()
}

pub fn find_by_code<'a>(map: &'a [Municipality], code: &str) -> Option<&'a Municipality> {
    map.iter().find(|m| m.code == code)
}
