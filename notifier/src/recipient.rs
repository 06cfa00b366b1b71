use crate::firestore::{DocumentStore, StoreError};

/// Field on the user record holding the device's delivery token.
pub const FCM_TOKEN_FIELD: &str = "fcmToken";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Recipient {
    NotFound,
    NoToken,
    Token(String),
}

/// Resolves the delivery token of `user_id`. An empty or non-string token counts as none.
pub async fn lookup(
    store: &dyn DocumentStore,
    users_collection: &str,
    user_id: &str,
) -> Result<Recipient, StoreError> {
    let Some(user) = store.get(users_collection, user_id).await? else {
        return Ok(Recipient::NotFound);
    };

    Ok(match user.string_field(FCM_TOKEN_FIELD) {
        Some(token) if !token.is_empty() => Recipient::Token(token.to_owned()),
        _ => Recipient::NoToken,
    })
}
