//! Reaction Reconciliation Engine
//!
//! Pure, synchronous transformations over a single confession's reaction,
//! save, and comment lists. No I/O happens here; the store is responsible
//! for loading the latest observed state and writing results back
//! atomically. Two requests from the *same* user racing on the same
//! confession resolve last-write-wins, which is accepted behavior.

use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Comment, Reaction, ReactionKind, RequestedReaction};

/// Which of the four possible transitions a reaction request produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Added,
    Switched,
    Removed,
    NoOp,
}

/// Applies a reaction request to a confession's reaction list.
///
/// Transition rules, in order:
/// 1. `remove` drops any existing reaction by the user (`Removed`, or
///    `NoOp` if none existed).
/// 2. No existing reaction: append (`Added`).
/// 3. Existing reaction of the same kind: drop it, i.e. toggle off
///    (`Removed`).
/// 4. Existing reaction of a different kind: replace the kind in place,
///    preserving the entry's position (`Switched`).
///
/// Postcondition: at most one reaction per distinct user.
pub fn reconcile(
    mut reactions: Vec<Reaction>,
    user_id: &str,
    requested: RequestedReaction,
) -> (Vec<Reaction>, Transition) {
    let existing = reactions.iter().position(|r| r.user_id == user_id);

    let Some(kind) = requested.kind() else {
        // Explicit remove
        return match existing {
            Some(i) => {
                reactions.remove(i);
                (reactions, Transition::Removed)
            }
            None => (reactions, Transition::NoOp),
        };
    };

    match existing {
        None => {
            reactions.push(Reaction {
                user_id: user_id.to_string(),
                kind,
            });
            (reactions, Transition::Added)
        }
        Some(i) if reactions[i].kind == kind => {
            // Toggle off: same icon clicked twice
            reactions.remove(i);
            (reactions, Transition::Removed)
        }
        Some(i) => {
            reactions[i].kind = kind;
            (reactions, Transition::Switched)
        }
    }
}

/// Result of loading a stored reaction list through the schema-repair
/// guard.
///
/// `Repaired` means the stored shape predates the current schema (not an
/// array, or entries missing `userId`/carrying an unknown kind) and the
/// entire list was discarded. This is a lossy, one-time normalization, not
/// a merge; the emptied list persists with the next write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactionLoad {
    Intact(Vec<Reaction>),
    Repaired,
}

impl ReactionLoad {
    pub fn into_reactions(self) -> Vec<Reaction> {
        match self {
            Self::Intact(reactions) => reactions,
            Self::Repaired => Vec::new(),
        }
    }

    pub fn was_repaired(&self) -> bool {
        matches!(self, Self::Repaired)
    }
}

/// Parses a stored reaction list, discarding it wholesale when it does not
/// match the current `{userId, type}` schema.
pub fn load_reactions(raw: &str) -> ReactionLoad {
    let Ok(value) = serde_json::from_str::<Value>(raw) else {
        return ReactionLoad::Repaired;
    };

    if !value.is_array() {
        return ReactionLoad::Repaired;
    }

    match serde_json::from_value::<Vec<Reaction>>(value) {
        Ok(reactions) => ReactionLoad::Intact(reactions),
        Err(_) => ReactionLoad::Repaired,
    }
}

/// Parses a stored saved-by list. Legacy non-array shapes become the empty
/// set, mirroring the reaction guard's lossy recovery.
pub fn load_saved_by(raw: &str) -> (Vec<String>, bool) {
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(saved_by) => (saved_by, false),
        Err(_) => (Vec::new(), true),
    }
}

/// Parses a stored comment list, with the same lossy recovery as above.
pub fn load_comments(raw: &str) -> (Vec<Comment>, bool) {
    match serde_json::from_str::<Vec<Comment>>(raw) {
        Ok(comments) => (comments, false),
        Err(_) => (Vec::new(), true),
    }
}

/// Toggles a user's bookmark on a confession. Returns whether the
/// confession is saved by the user afterwards. Set semantics: a user
/// appears at most once regardless of how often they toggle.
pub fn toggle_save(saved_by: &mut Vec<String>, user_id: &str) -> bool {
    if let Some(i) = saved_by.iter().position(|id| id == user_id) {
        saved_by.remove(i);
        false
    } else {
        saved_by.push(user_id.to_string());
        true
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommentError {
    #[error("comment not found")]
    NotFound,
    #[error("not the comment author")]
    NotAuthor,
}

/// Builds a new comment with a fresh id and timestamps.
pub fn new_comment(user_id: &str, user_name: &str, user_image: &str, text: &str) -> Comment {
    let now = chrono::Utc::now();
    Comment {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        user_name: user_name.to_string(),
        user_image: user_image.to_string(),
        text: text.to_string(),
        created_at: now,
        updated_at: now,
    }
}

/// Replaces a comment's text, authorized by authorship. Only `text` and
/// `updated_at` change; the comment keeps its position in the list.
pub fn edit_comment(
    comments: &mut [Comment],
    comment_id: &str,
    user_id: &str,
    text: &str,
) -> Result<(), CommentError> {
    let comment = comments
        .iter_mut()
        .find(|c| c.id == comment_id)
        .ok_or(CommentError::NotFound)?;

    if comment.user_id != user_id {
        return Err(CommentError::NotAuthor);
    }

    comment.text = text.to_string();
    comment.updated_at = chrono::Utc::now();
    Ok(())
}

/// Removes a comment, authorized by authorship. The relative order of the
/// remaining comments is preserved.
pub fn delete_comment(
    comments: &mut Vec<Comment>,
    comment_id: &str,
    user_id: &str,
) -> Result<(), CommentError> {
    let i = comments
        .iter()
        .position(|c| c.id == comment_id)
        .ok_or(CommentError::NotFound)?;

    if comments[i].user_id != user_id {
        return Err(CommentError::NotAuthor);
    }

    comments.remove(i);
    Ok(())
}
