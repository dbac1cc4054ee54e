use crate::store::RoomRecord;
use tandem_core::{AuthError, UserInfo};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    Admitted,
    Rejected(AuthError),
}

fn normalize(password: Option<&str>) -> Option<&str> {
    password.filter(|p| !p.is_empty())
}

/// Password gate plus membership insert, applied inside an atomic store update.
///
/// The first non-empty password supplied to an open room becomes its password.
/// Re-joining keeps the member's position and refreshes the display name.
pub fn admit(record: &mut RoomRecord, user: UserInfo, password: Option<&str>) -> JoinOutcome {
    let supplied = normalize(password);

    match (record.password.as_deref(), supplied) {
        (None, Some(new)) => record.password = Some(new.to_owned()),
        (None, None) => {}
        (Some(_), None) => return JoinOutcome::Rejected(AuthError::PasswordRequired),
        (Some(set), Some(given)) if set != given => {
            return JoinOutcome::Rejected(AuthError::AuthFailed);
        }
        (Some(_), Some(_)) => {}
    }

    match record.members.iter_mut().find(|m| m.id == user.id) {
        Some(existing) => existing.username = user.username,
        None => record.members.push(user),
    }
    JoinOutcome::Admitted
}

/// Replaces the room password; `None` or empty opens the room.
pub fn rotate_password(record: &mut RoomRecord, password: Option<&str>) {
    record.password = normalize(password).map(str::to_owned);
}
