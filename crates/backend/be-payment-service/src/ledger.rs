//! Ledger-side helpers: donor resolution and membership promotion.

use be_ledger_db::{DatabaseManager, Group, GroupRole, User};
use uuid::Uuid;

use crate::error::PaymentError;

pub fn donation_title(group: &Group) -> String {
    format!("Donation to {}", group.name)
}

/// Every donation transaction carries the "Donation" tag ahead of any
/// caller-supplied ones.
pub fn donation_tags(extra: &[String]) -> Vec<String> {
    let mut tags = Vec::with_capacity(extra.len() + 1);
    tags.push("Donation".to_string());
    tags.extend(extra.iter().cloned());
    tags
}

/// Finds the donor by email (case-insensitive) or creates them. Existing
/// rows are never overwritten; a creation race falls back to the winner.
pub async fn resolve_or_create_user(
    db: &DatabaseManager,
    email: &str,
) -> Result<User, PaymentError> {
    if let Some(user) = db.find_user_by_email().email(email).call().await? {
        return Ok(user);
    }

    match db.create_user().email(email.to_string()).call().await {
        Ok(user) => Ok(user),
        Err(e) if e.is_duplicate() => db
            .find_user_by_email()
            .email(email)
            .call()
            .await?
            .ok_or_else(|| {
                PaymentError::Internal(anyhow::anyhow!("user vanished after duplicate insert"))
            }),
        Err(e) => Err(e.into()),
    }
}

/// Raises the donor to backer unless they already hold backer or better.
/// Idempotent; repeat donations leave the role untouched. Runs after the
/// charge has settled, so failures belong to the reconciliation class.
pub async fn promote_backer(
    db: &DatabaseManager,
    group_id: Uuid,
    user_id: Uuid,
) -> be_ledger_db::DbResult<()> {
    let current = db
        .get_member_role()
        .group_id(group_id)
        .user_id(user_id)
        .call()
        .await?;

    match current {
        Some(role) if role.rank() >= GroupRole::Backer.rank() => Ok(()),
        _ => {
            db.set_member_role()
                .group_id(group_id)
                .user_id(user_id)
                .role(GroupRole::Backer)
                .call()
                .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn donation_tag_always_leads() {
        assert_eq!(donation_tags(&[]), vec!["Donation"]);
        assert_eq!(
            donation_tags(&["tag1".to_string(), "tag2".to_string()]),
            vec!["Donation", "tag1", "tag2"]
        );
    }
}
