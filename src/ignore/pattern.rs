//! Single-pattern compilation: translates one gitignore-style line into a
//! [`globset::GlobMatcher`] plus the negation/anchoring/directory-only
//! flags §4.3 assigns it.

use globset::{Glob, GlobMatcher};

use super::InvalidPatternError;

#[derive(Clone, Debug)]
pub struct CompiledPattern {
    pub negated: bool,
    pub directory_only: bool,
    pub glob: GlobMatcher,
}

pub fn compile(raw: &str) -> Result<CompiledPattern, InvalidPatternError> {
    let invalid = |reason: &'static str| InvalidPatternError { pattern: raw.to_owned(), reason };

    if raw.is_empty() {
        return Err(invalid("empty pattern"));
    }

    let negated = raw.starts_with('!');
    let mut body = if negated { &raw[1..] } else { raw }.to_owned();
    if body.is_empty() {
        return Err(invalid("lone negation with no pattern"));
    }

    let anchored_explicit = body.starts_with('/');
    if anchored_explicit {
        body.remove(0);
    }
    if body.is_empty() {
        return Err(invalid("lone /"));
    }

    let directory_only = body.ends_with('/');
    if directory_only {
        body.pop();
    }
    if body.is_empty() {
        return Err(invalid("pattern reduces to nothing"));
    }

    validate_brackets(&body).map_err(|reason| invalid(reason))?;

    let anchored = anchored_explicit || body.contains('/');
    let glob_text = if anchored { body.clone() } else { format!("**/{body}") };

    let glob = Glob::new(&glob_text)
        .map_err(|_| invalid("malformed glob syntax"))?
        .compile_matcher();

    Ok(CompiledPattern { negated, directory_only, glob })
}

/// Rejects an unterminated `[...]` bracket group (§4.3). `globset` itself
/// accepts some inputs gitignore would call malformed, so this is an
/// explicit pre-check rather than relying solely on `Glob::new`'s errors.
fn validate_brackets(body: &str) -> Result<(), &'static str> {
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            chars.next();
            continue;
        }
        if c == '[' {
            let mut closed = false;
            for c in chars.by_ref() {
                if c == ']' {
                    closed = true;
                    break;
                }
            }
            if !closed {
                return Err("unterminated bracket group");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negation_flag_set_and_stripped() {
        let p = compile("!foo").unwrap();
        assert!(p.negated);
        assert!(p.glob.is_match("foo"));
    }

    #[test]
    fn directory_only_flag_set_and_stripped() {
        let p = compile("foo/").unwrap();
        assert!(p.directory_only);
        assert!(p.glob.is_match("foo"));
    }

    #[test]
    fn unterminated_bracket_rejected() {
        assert!(compile("[abc").is_err());
    }

    #[test]
    fn terminated_bracket_accepted() {
        assert!(compile("[abc]").is_ok());
    }
}
