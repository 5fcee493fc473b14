use crate::error::{DispatchError, DispatchResult};
use crate::model::{Session, UserId};

/// Per-user conversation storage used by the dispatcher.
///
/// `update` is the only write path. Calls for the same user are serialized;
/// calls for different users never contend on a shared lock. A mutator that
/// returns `Err` leaves the stored session untouched.
pub trait SessionStore: Send + Sync + 'static {
    /// Returns a snapshot of the user's session, creating an idle one if absent.
    fn get(&self, user: &UserId) -> Session;

    /// Applies `mutator` to a draft of the session and commits it on success.
    /// Returns the committed snapshot.
    fn update(
        &self,
        user: &UserId,
        mutator: &mut dyn FnMut(&mut Session) -> DispatchResult<()>,
    ) -> DispatchResult<Session>;

    /// Forgets the user's session. Returns whether one existed.
    fn remove(&self, user: &UserId) -> bool;

    /// Number of sessions currently held.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl dyn SessionStore {
    /// Typed wrapper over [`SessionStore::update`] that lets the transition
    /// hand a value back to the caller alongside the committed snapshot.
    pub fn transition<T>(
        &self,
        user: &UserId,
        apply: impl FnOnce(&mut Session) -> DispatchResult<T>,
    ) -> DispatchResult<(T, Session)> {
        let mut apply = Some(apply);
        let mut output = None;
        let session = self.update(user, &mut |session| {
            let apply = apply
                .take()
                .ok_or_else(|| DispatchError::Internal("session mutator ran twice".into()))?;
            output = Some(apply(session)?);
            Ok(())
        })?;
        let output =
            output.ok_or_else(|| DispatchError::Internal("session mutator did not run".into()))?;
        Ok((output, session))
    }
}
