//! Filesystem-safe naming for screenshots and branches

/// Characters replaced in branch names (besides whitespace and control chars)
const BRANCH_RESERVED: &[char] = &['/', '\\', '#', ':', '*', '?', '"', '<', '>', '|', '.'];

/// Characters replaced in screenshot names
const NAME_RESERVED: &[char] = &['/', '\\', '#', ':', '*', '?', '"', '<', '>', '|', '%', '&', '='];

const UNKNOWN_BRANCH: &str = "unknown";
const ROOT_NAME: &str = "home";
const UNNAMED: &str = "screenshot";

fn replace_and_collapse(input: &str, reserved: &[char]) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        let mapped = if c.is_whitespace() || c.is_control() || reserved.contains(&c) {
            '-'
        } else {
            c
        };
        if mapped == '-' && out.ends_with('-') {
            continue;
        }
        out.push(mapped);
    }
    out.trim_matches('-').to_string()
}

/// Turn a branch name into a single path segment.
///
/// `feature/login#123` becomes `feature-login-123`. Runs of hyphens are
/// collapsed and leading/trailing hyphens dropped.
pub fn sanitize_branch(branch: &str) -> String {
    let out = replace_and_collapse(branch, BRANCH_RESERVED);
    if out.is_empty() {
        UNKNOWN_BRANCH.to_string()
    } else {
        out
    }
}

/// Make a caller-supplied screenshot name usable as a file stem
pub fn sanitize_name(name: &str) -> String {
    let out = replace_and_collapse(name, NAME_RESERVED);
    let out = out.trim_matches(|c| c == '-' || c == '.').to_string();
    if out.is_empty() {
        UNNAMED.to_string()
    } else {
        out
    }
}

/// Derive a screenshot name from a navigation target (URL or path).
///
/// Scheme, host, query and fragment are dropped; the remaining path segments
/// are joined with `-`. The root path maps to `home`. Applying this to its own
/// output returns the same value.
pub fn derive_name(target: &str) -> String {
    let target = target.trim();
    let target = target.split('#').next().unwrap_or_default();
    let target = target.split('?').next().unwrap_or_default();

    let path = match target.find("://") {
        Some(idx) => {
            let rest = &target[idx + 3..];
            match rest.find('/') {
                Some(slash) => &rest[slash..],
                None => "",
            }
        }
        None => target,
    };

    let joined = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if joined.is_empty() {
        return ROOT_NAME.to_string();
    }

    let name = sanitize_name(&joined);
    if name == UNNAMED && joined.chars().all(|c| c == '.' || c == '-') {
        ROOT_NAME.to_string()
    } else {
        name
    }
}
