//! JWT bearer tokens issued by the backend.
//!
//! Both token kinds are opaque strings to the client. Their `Debug` output
//! is redacted so they can sit inside structs that get logged.

use std::fmt;

macro_rules! secret_token {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq)]
        pub struct $name(String);

        impl $name {
            pub fn new(token: impl Into<String>) -> Self {
                Self(token.into())
            }

            /// The raw token, for `Authorization` headers, request bodies and
            /// the token store. Not for logs.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "(***)"))
            }
        }
    };
}

secret_token! {
    /// Short-lived token sent as `Authorization: Bearer ...` on API calls.
    AccessToken
}

secret_token! {
    /// Long-lived token exchanged at `auth/token/refresh/` for a new
    /// [`AccessToken`], and blacklisted on logout.
    RefreshToken
}
