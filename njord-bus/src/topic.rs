/// Matches a concrete `topic` (e.g. `md.trades.ATOMUSDT`) against a
/// subscription `pattern` that may contain a single `*` wildcard matching
/// exactly one `.`-delimited segment (e.g. `md.trades.*`).
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    let pattern_segments: Vec<&str> = pattern.split('.').collect();
    let topic_segments: Vec<&str> = topic.split('.').collect();

    if pattern_segments.len() != topic_segments.len() {
        return false;
    }

    pattern_segments
        .iter()
        .zip(topic_segments.iter())
        .all(|(p, t)| *p == "*" || p == t)
}
