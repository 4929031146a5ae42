/// Never cache a revalidatable artifact for less than `min_max_age`, and
/// never cache indefinitely if there's a cheap way to revalidate (an entity
/// tag) even when the origin gave no freshness hint at all.
///
/// - `max_age` present and below `min_max_age` -> raised to `min_max_age`.
/// - `max_age` absent but `etag` present -> set to `min_max_age`.
/// - both absent -> stays absent (cache indefinitely).
pub fn sanitize_max_age(max_age: Option<u64>, etag: Option<&str>, min_max_age: u64) -> Option<u64> {
    match (max_age, etag) {
        (Some(age), _) if age < min_max_age => Some(min_max_age),
        (Some(age), _) => Some(age),
        (None, Some(_)) => Some(min_max_age),
        (None, None) => None,
    }
}
