/// Matches `value` against a glob-style `pattern` where `*` matches any
/// sequence of characters, including the empty sequence.
///
/// Matching is anchored at both ends and case-sensitive. There is no escape
/// syntax. An empty pattern matches every value.
pub fn matches(pattern: &str, value: &str) -> bool {
    if pattern.is_empty() || pattern == "*" {
        return true;
    }

    // `*` is ASCII, so comparing bytes never splits a multi-byte character
    // on the pattern side and literal bytes can only match at char
    // boundaries of `value`.
    let (p, v) = (pattern.as_bytes(), value.as_bytes());
    let (mut pi, mut vi) = (0, 0);
    // Position of the most recent `*` in the pattern and the value offset it
    // is currently expanded to.
    let mut backtrack = None;

    while vi < v.len() {
        match p.get(pi) {
            Some(b'*') => {
                backtrack = Some((pi, vi));
                pi += 1;
            }
            Some(c) if *c == v[vi] => {
                pi += 1;
                vi += 1;
            }
            _ => match backtrack {
                Some((star, consumed)) => {
                    pi = star + 1;
                    vi = consumed + 1;
                    backtrack = Some((star, consumed + 1));
                }
                None => return false,
            },
        }
    }

    p[pi..].iter().all(|c| *c == b'*')
}
