//! NATS subjects used by the bridge.
//!
//! ```text
//! {prefix}.session.{owner}.{session}.updates   worker → bridge, per session
//! {prefix}.work.{owner}.{session}              bridge → worker pool
//! {prefix}.store.session.get                   bridge → session store (request/reply)
//! ```

use crate::token::{SubjectPrefix, SubjectToken};

/// Topic the workers publish session events on. Stable for the life of the session.
pub fn session_updates(prefix: &SubjectPrefix, owner: &SubjectToken, session: &SubjectToken) -> String {
    format!("{prefix}.session.{owner}.{session}.updates")
}

pub fn work_queue(prefix: &SubjectPrefix, owner: &SubjectToken, session: &SubjectToken) -> String {
    format!("{prefix}.work.{owner}.{session}")
}

pub fn store_session_get(prefix: &SubjectPrefix) -> String {
    format!("{prefix}.store.session.get")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts() -> (SubjectPrefix, SubjectToken, SubjectToken) {
        (
            SubjectPrefix::new("chatgate").unwrap(),
            SubjectToken::new("owner", "alice").unwrap(),
            SubjectToken::new("session_id", "ses_1").unwrap(),
        )
    }

    #[test]
    fn session_updates_subject() {
        let (prefix, owner, session) = parts();
        assert_eq!(
            session_updates(&prefix, &owner, &session),
            "chatgate.session.alice.ses_1.updates"
        );
    }

    #[test]
    fn work_queue_subject() {
        let (prefix, owner, session) = parts();
        assert_eq!(work_queue(&prefix, &owner, &session), "chatgate.work.alice.ses_1");
    }

    #[test]
    fn store_subject_uses_dotted_prefix() {
        let prefix = SubjectPrefix::new("prod.chatgate").unwrap();
        assert_eq!(store_session_get(&prefix), "prod.chatgate.store.session.get");
    }
}
