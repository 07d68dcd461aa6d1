use crate::entities::user::UserRecord;
use crate::events::{OfferEvent, UserEvent};

/// A rendered message ready for a [`super::MailTransport`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Which side of an offer a message is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Offerer,
    Recipient,
}

/// Render the offer message for `me`, who traded with `other`.
pub fn offer_notification(
    role: Role,
    event: OfferEvent,
    me: &UserRecord,
    other: &UserRecord,
) -> Notification {
    let (subject, body) = match (role, event) {
        (Role::Offerer, OfferEvent::Created) => (
            "Offer Successfully Created",
            format!(
                "Congratulations, {}! Your offer to {} was successfully created!",
                me.name, other.name
            ),
        ),
        (Role::Offerer, OfferEvent::Accepted) => (
            "Offer Accepted",
            format!(
                "Congratulations, {}! Your offer to {} was accepted!",
                me.name, other.name
            ),
        ),
        (Role::Offerer, OfferEvent::Rejected) => (
            "Offer Rejected",
            format!("Sorry, {}. Your offer to {} was rejected.", me.name, other.name),
        ),
        (Role::Offerer, OfferEvent::Cancelled) => (
            "Offer Cancelled",
            format!(
                "Hey there, {}. Your offer to {} was cancelled.",
                me.name, other.name
            ),
        ),
        (Role::Recipient, OfferEvent::Created) => (
            "Offer Received",
            format!(
                "Congratulations, {}! You received an offer from {}.",
                me.name, other.name
            ),
        ),
        (Role::Recipient, OfferEvent::Accepted) => (
            "Offer Accepted",
            format!(
                "Congratulations, {}! You accepted an offer from {}.",
                me.name, other.name
            ),
        ),
        (Role::Recipient, OfferEvent::Rejected) => (
            "Offer Rejected",
            format!(
                "Hey there, {}. You rejected an offer from {}.",
                me.name, other.name
            ),
        ),
        (Role::Recipient, OfferEvent::Cancelled) => (
            "Offer Cancelled",
            format!(
                "Hey there, {}. The offer from {} was cancelled.",
                me.name, other.name
            ),
        ),
    };
    Notification {
        to: me.email.clone(),
        subject: subject.to_string(),
        body,
    }
}

pub fn user_notification(event: UserEvent, user: &UserRecord) -> Notification {
    let (subject, body) = match event {
        UserEvent::Created => (
            "Gametrader Account Created",
            format!("Welcome, {}! Your account was successfully created.", user.name),
        ),
        UserEvent::Updated => (
            "Gametrader Account Password Updated",
            format!(
                "Hey there, {}. Your account's password was successfully updated.",
                user.name
            ),
        ),
    };
    Notification {
        to: user.email.clone(),
        subject: subject.to_string(),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::now_primitive;

    fn user(id: i64, name: &str) -> UserRecord {
        UserRecord {
            user_id: id,
            email: format!("{}@example.com", name.to_lowercase()),
            name: name.to_string(),
            address: "somewhere".to_string(),
            password_hash: "$argon2id$".to_string(),
            created_at: now_primitive(),
        }
    }

    #[test]
    fn test_created_offer_messages() {
        let (alice, bob) = (user(1, "Alice"), user(2, "Bob"));

        let to_offerer = offer_notification(Role::Offerer, OfferEvent::Created, &alice, &bob);
        assert_eq!(to_offerer.to, "alice@example.com");
        assert_eq!(to_offerer.subject, "Offer Successfully Created");
        assert_eq!(
            to_offerer.body,
            "Congratulations, Alice! Your offer to Bob was successfully created!"
        );

        let to_recipient = offer_notification(Role::Recipient, OfferEvent::Created, &bob, &alice);
        assert_eq!(to_recipient.to, "bob@example.com");
        assert_eq!(to_recipient.subject, "Offer Received");
        assert_eq!(
            to_recipient.body,
            "Congratulations, Bob! You received an offer from Alice."
        );
    }

    #[test]
    fn test_roles_get_different_wording() {
        let (alice, bob) = (user(1, "Alice"), user(2, "Bob"));
        for event in [
            OfferEvent::Accepted,
            OfferEvent::Rejected,
            OfferEvent::Cancelled,
        ] {
            let a = offer_notification(Role::Offerer, event, &alice, &bob);
            let b = offer_notification(Role::Recipient, event, &bob, &alice);
            assert_eq!(a.subject, b.subject);
            assert_ne!(a.body, b.body);
        }
    }

    #[test]
    fn test_password_update_message() {
        let n = user_notification(UserEvent::Updated, &user(3, "Carol"));
        assert_eq!(n.to, "carol@example.com");
        assert_eq!(n.subject, "Gametrader Account Password Updated");
        assert_eq!(
            n.body,
            "Hey there, Carol. Your account's password was successfully updated."
        );
    }
}
