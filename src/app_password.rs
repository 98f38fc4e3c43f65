use serde::Deserialize;

use crate::error::Error;

/// Validates the shape of a Bluesky app password.
///
/// A valid app password is four groups of four characters separated by
/// `-`, each character a lowercase ASCII letter or digit
/// (`abcd-efgh-1234-5678`).
#[must_use]
pub fn is_valid_app_password(s: &str) -> bool {
    let groups: Vec<&str> = s.split('-').collect();
    groups.len() == 4
        && groups.iter().all(|g| {
            g.len() == 4
                && g
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        })
}

/// Validated app password.
///
/// Holding an `AppPassword` proves the shape is correct, so a malformed
/// secret never reaches the remote platform. The value is never printed.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct AppPassword(String);

impl AppPassword {
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AppPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AppPassword(****)")
    }
}

impl std::str::FromStr for AppPassword {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_owned())
    }
}

impl TryFrom<String> for AppPassword {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if is_valid_app_password(&s) {
            Ok(Self(s))
        } else {
            Err(Error::MalformedSecret)
        }
    }
}
