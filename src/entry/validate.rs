//! Structural validation for [`super::Entry`] (§3.1 invariants).

use super::Entry;
use crate::error::ValidationError;

pub fn ensure_valid(entry: &Entry, synchronizable: bool) -> Result<(), ValidationError> {
    match entry {
        Entry::Directory { contents } => validate_contents(contents, synchronizable),
        Entry::PhantomDirectory { contents } => {
            if synchronizable {
                return Err(ValidationError::Unsynchronizable("phantom directory"));
            }
            validate_contents(contents, synchronizable)
        }
        Entry::File { digest, .. } => {
            if digest.is_empty() {
                return Err(ValidationError::EmptyDigest);
            }
            Ok(())
        }
        Entry::SymbolicLink { target } => {
            if target.is_empty() {
                return Err(ValidationError::EmptyTarget);
            }
            Ok(())
        }
        Entry::Untracked => {
            if synchronizable {
                return Err(ValidationError::Unsynchronizable("untracked"));
            }
            Ok(())
        }
        Entry::Problematic { problem } => {
            if synchronizable {
                return Err(ValidationError::Unsynchronizable("problematic"));
            }
            if problem.is_empty() {
                return Err(ValidationError::EmptyProblem);
            }
            Ok(())
        }
    }
}

fn validate_contents(
    contents: &super::Contents,
    synchronizable: bool,
) -> Result<(), ValidationError> {
    for (name, child) in contents {
        if name.is_empty() || name == "." || name == ".." || name.contains('/') {
            return Err(ValidationError::InvalidName(name.clone()));
        }
        ensure_valid(child, synchronizable)?;
    }
    Ok(())
}
